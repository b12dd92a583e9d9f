use crate::*;

use std::collections::HashSet;

/// Bookkeeping for icons embedded through the old XEmbed system tray protocol.
///
/// These icons have no bus identity. They are identified by their (lowercased) window name,
/// which is also what the user's ordering and hiding preferences are stored under.
#[derive(Debug, Clone, Default)]
pub struct LegacyBridge {
    known: KnownItems,
    hide_new_items: bool,
}

impl LegacyBridge {
    pub fn new(known: KnownItems, policy: TrayPolicy) -> Self {
        Self { known, hide_new_items: policy.hide_new_items }
    }

    /// Record that an icon called `name` is being displayed. Returns whether it is hidden.
    pub fn observe(&mut self, name: &str) -> bool {
        self.known.observe(name, self.hide_new_items)
    }

    pub fn set_hidden(&mut self, name: &str, hidden: bool) {
        self.known.set_hidden(name, hidden);
    }

    pub fn is_hidden(&self, name: &str) -> bool {
        self.known.is_hidden(name)
    }

    /// Swap two adjacent names, see [`KnownItems::swap`].
    pub fn swap(&mut self, name1: &str, name2: &str) -> bool {
        self.known.swap(name1, name2)
    }

    /// Forget all names that are not in `live`. Returns whether anything changed.
    pub fn clear_unknown(&mut self, live: &HashSet<String>) -> bool {
        self.known.clear_unknown(live)
    }

    pub fn known(&self) -> &KnownItems {
        &self.known
    }

    /// Notifications produced since the last call.
    pub fn drain_events(&mut self) -> Vec<LegacyEvent> {
        self.known
            .drain_events()
            .into_iter()
            .map(|ev| match ev {
                KnownItemsEvent::Added(name) => LegacyEvent::NewLegacyItem(name),
                KnownItemsEvent::Changed => LegacyEvent::LegacyItemsChanged,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegacyEvent {
    NewLegacyItem(String),
    LegacyItemsChanged,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bridge(hide_new_items: bool) -> LegacyBridge {
        LegacyBridge::new(KnownItems::default(), TrayPolicy { hide_new_items, ..Default::default() })
    }

    #[test]
    fn test_observe_new_item_shown() {
        let mut legacy = bridge(false);
        assert!(!legacy.observe("blueman"));
        assert_eq!(legacy.known().names(), &["blueman".to_owned()]);
        assert_eq!(legacy.drain_events(), vec![LegacyEvent::NewLegacyItem("blueman".to_owned())]);
    }

    #[test]
    fn test_observe_new_item_hidden_by_policy() {
        let mut legacy = bridge(true);
        assert!(legacy.observe("blueman"));
        assert_eq!(legacy.known().hidden(), vec!["blueman".to_owned()]);
    }

    #[test]
    fn test_user_hiding() {
        let mut legacy = bridge(false);
        legacy.observe("blueman");
        legacy.drain_events();
        legacy.set_hidden("blueman", true);
        assert!(legacy.observe("blueman"));
        assert_eq!(legacy.drain_events(), vec![LegacyEvent::LegacyItemsChanged]);
    }
}
