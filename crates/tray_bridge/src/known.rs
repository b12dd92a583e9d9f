use std::collections::HashSet;

/// Notification about a change of a [`KnownItems`] list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KnownItemsEvent {
    /// A name was seen for the first time.
    Added(String),
    /// The order or hidden state of the list changed.
    Changed,
}

/// The names of all items that were ever shown, in user-defined order, plus the set of names the
/// user chose to hide.
///
/// A name can be hidden without being in the ordered list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownItems {
    order: Vec<String>,
    hidden: HashSet<String>,
    events: Vec<KnownItemsEvent>,
}

impl KnownItems {
    pub fn new(order: Vec<String>, hidden: impl IntoIterator<Item = String>) -> Self {
        Self { order, hidden: hidden.into_iter().collect(), events: Vec::new() }
    }

    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// Hidden names, sorted so they can be persisted deterministically.
    pub fn hidden(&self) -> Vec<String> {
        let mut hidden: Vec<String> = self.hidden.iter().cloned().collect();
        hidden.sort();
        hidden
    }

    pub fn contains(&self, name: &str) -> bool {
        self.order.iter().any(|n| n == name)
    }

    pub fn is_hidden(&self, name: &str) -> bool {
        self.hidden.contains(name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.order.iter().position(|n| n == name)
    }

    /// Record that an item called `name` is being shown, returning whether it is hidden.
    ///
    /// Unknown names are put at the front of the list, and hidden straight away if `hide_new` is
    /// set.
    pub fn observe(&mut self, name: &str, hide_new: bool) -> bool {
        if self.contains(name) {
            return self.is_hidden(name);
        }

        self.order.insert(0, name.to_owned());
        if hide_new {
            self.hidden.insert(name.to_owned());
        }
        self.events.push(KnownItemsEvent::Added(name.to_owned()));
        self.is_hidden(name)
    }

    pub fn set_hidden(&mut self, name: &str, hidden: bool) {
        if hidden {
            self.hidden.insert(name.to_owned());
        } else {
            self.hidden.remove(name);
        }
        self.events.push(KnownItemsEvent::Changed);
    }

    /// Swap `name1` with `name2`, which has to come right after it.
    ///
    /// This only supports moving an entry up or down by one place. Anything else is logged and
    /// ignored. Returns whether the list changed.
    pub fn swap(&mut self, name1: &str, name2: &str) -> bool {
        match self.position(name1) {
            Some(idx) if self.order.get(idx + 1).is_some_and(|next| next == name2) => {
                self.order.swap(idx, idx + 1);
                self.events.push(KnownItemsEvent::Changed);
                true
            },
            _ => {
                log::debug!("Couldn't swap items: {} and {}", name1, name2);
                false
            },
        }
    }

    /// Forget every name that isn't in `live`. Returns whether anything changed.
    pub fn clear_unknown(&mut self, live: &HashSet<String>) -> bool {
        let known_before = self.order.len();
        let hidden_before = self.hidden.len();
        self.order.retain(|name| live.contains(name));
        self.hidden.retain(|name| live.contains(name));

        let changed = known_before != self.order.len() || hidden_before != self.hidden.len();
        if changed {
            self.events.push(KnownItemsEvent::Changed);
        }
        changed
    }

    /// Take the notifications produced since the last call.
    pub fn drain_events(&mut self) -> Vec<KnownItemsEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::hashset;
    use pretty_assertions::assert_eq;

    fn known(names: &[&str]) -> KnownItems {
        KnownItems::new(names.iter().map(|s| s.to_string()).collect(), vec![])
    }

    #[test]
    fn test_new_names_go_first() {
        let mut items = known(&["nm-applet"]);
        assert!(!items.observe("blueman", false));
        assert_eq!(items.names(), &["blueman".to_owned(), "nm-applet".to_owned()]);
        assert_eq!(items.drain_events(), vec![KnownItemsEvent::Added("blueman".to_owned())]);

        // seeing it again changes nothing
        assert!(!items.observe("blueman", true));
        assert!(items.drain_events().is_empty());
    }

    #[test]
    fn test_hide_new_items() {
        let mut items = KnownItems::default();
        assert!(items.observe("blueman", true));
        assert!(items.is_hidden("blueman"));
    }

    #[test]
    fn test_swap_adjacent_only() {
        let mut items = known(&["a", "b", "c"]);
        assert!(!items.swap("a", "c"));
        assert!(!items.swap("b", "a"));
        assert!(!items.swap("c", "x"));
        assert!(items.drain_events().is_empty());

        assert!(items.swap("a", "b"));
        assert_eq!(items.names(), &["b".to_owned(), "a".to_owned(), "c".to_owned()]);
        assert_eq!(items.drain_events(), vec![KnownItemsEvent::Changed]);
    }

    #[test]
    fn test_set_hidden_always_notifies() {
        let mut items = known(&["a"]);
        items.set_hidden("ghost", true);
        items.set_hidden("a", false);
        assert!(items.is_hidden("ghost"));
        assert_eq!(items.drain_events(), vec![KnownItemsEvent::Changed, KnownItemsEvent::Changed]);
    }

    #[test]
    fn test_clear_unknown() {
        let mut items = KnownItems::new(vec!["a".to_owned(), "b".to_owned()], vec!["b".to_owned(), "z".to_owned()]);
        assert!(!items.clear_unknown(&hashset! {"a".to_owned(), "b".to_owned(), "z".to_owned()}));

        assert!(items.clear_unknown(&hashset! {"a".to_owned()}));
        assert_eq!(items.names(), &["a".to_owned()]);
        assert_eq!(items.hidden(), Vec::<String>::new());
        assert_eq!(items.drain_events(), vec![KnownItemsEvent::Changed]);
    }
}
