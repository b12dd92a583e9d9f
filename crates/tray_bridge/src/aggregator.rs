//! The single interface the display layer talks to. It merges protocol items and legacy icons
//! into one ordered list and keeps track of what the user chose to hide.

use crate::*;

use itertools::Itertools;
use std::collections::{HashMap, HashSet};

/// Identity of a displayed item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemId {
    /// A StatusNotifierItem, by its registry key.
    Protocol(String),
    /// A legacy tray icon, by the window embedding it.
    Legacy(u64),
}

/// What every displayed item offers, regardless of the protocol it came from.
pub trait TrayItem {
    /// The name the user's ordering and hiding preferences are stored under.
    fn name(&self) -> &str;
    fn icon(&self) -> DisplayIcon;
    fn tooltip(&self) -> (Option<&str>, Option<&str>);
    fn is_hidden(&self) -> bool;
    fn activate(&self, x: i32, y: i32);
}

/// Receiver of everything that should be reflected on screen.
pub trait Presenter {
    fn item_added(&mut self, id: &ItemId, item: &dyn TrayItem);
    fn item_removed(&mut self, id: &ItemId);
    fn item_changed(&mut self, id: &ItemId, item: &dyn TrayItem, change: ItemChange);
    fn hidden_changed(&mut self, _id: &ItemId, _hidden: bool) {}
    /// The known or hidden lists changed and may be persisted.
    fn lists_changed(&mut self, _known: &KnownItems, _legacy: &KnownItems) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Primary,
    Middle,
    Secondary,
}

/// What a click on an item should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickAction {
    /// Pop up the item's own menu.
    ShowMenu,
    Activate,
    SecondaryActivate,
    /// Let the panel show its own menu instead.
    PanelMenu,
    /// The item handles the click itself.
    Ignore,
}

/// Decide what a click does, given the tray policy and what the item offers.
pub fn resolve_click(button: MouseButton, ctrl: bool, menu_is_primary: bool, menu_only: bool, has_menu: bool) -> ClickAction {
    match button {
        MouseButton::Secondary if ctrl || menu_is_primary => ClickAction::PanelMenu,
        MouseButton::Secondary if has_menu => ClickAction::ShowMenu,
        MouseButton::Secondary => ClickAction::PanelMenu,
        MouseButton::Primary if (menu_only || menu_is_primary) && has_menu => ClickAction::ShowMenu,
        MouseButton::Primary => ClickAction::Activate,
        MouseButton::Middle if menu_is_primary && !menu_only => ClickAction::Activate,
        MouseButton::Middle => ClickAction::SecondaryActivate,
    }
}

/// Snapshot of an exposed StatusNotifierItem.
#[derive(Debug, Clone)]
pub struct ProtocolItem {
    id: String,
    icon: DisplayIcon,
    tooltip_title: Option<String>,
    tooltip_subtitle: Option<String>,
    menu_only: bool,
    menu: Option<String>,
    hidden: bool,
    handle: ItemHandle,
}

impl ProtocolItem {
    fn new(item: &Item, handle: &ItemHandle, hidden: bool) -> Self {
        let (tooltip_title, tooltip_subtitle) = item.tooltip();
        Self {
            id: item.name().to_owned(),
            icon: item.icon(),
            tooltip_title: tooltip_title.map(str::to_owned),
            tooltip_subtitle: tooltip_subtitle.map(str::to_owned),
            menu_only: item.is_menu_only(),
            menu: item.menu().map(str::to_owned),
            hidden,
            handle: handle.clone(),
        }
    }

    /// Object path of the item's menu, if it has one.
    pub fn menu(&self) -> Option<&str> {
        self.menu.as_deref()
    }

    pub fn handle(&self) -> &ItemHandle {
        &self.handle
    }
}

impl TrayItem for ProtocolItem {
    fn name(&self) -> &str {
        &self.id
    }

    fn icon(&self) -> DisplayIcon {
        self.icon.clone()
    }

    fn tooltip(&self) -> (Option<&str>, Option<&str>) {
        (self.tooltip_title.as_deref(), self.tooltip_subtitle.as_deref())
    }

    fn is_hidden(&self) -> bool {
        self.hidden
    }

    fn activate(&self, x: i32, y: i32) {
        self.handle.activate(x, y);
    }
}

/// An icon embedded through the legacy protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyItem {
    name: String,
    hidden: bool,
}

impl TrayItem for LegacyItem {
    fn name(&self) -> &str {
        &self.name
    }

    /// The embedded window draws itself.
    fn icon(&self) -> DisplayIcon {
        DisplayIcon::default()
    }

    fn tooltip(&self) -> (Option<&str>, Option<&str>) {
        (Some(self.name.as_str()), None)
    }

    fn is_hidden(&self) -> bool {
        self.hidden
    }

    // The embedded window receives its input events directly.
    fn activate(&self, _x: i32, _y: i32) {}
}

pub struct Aggregator<P: Presenter> {
    presenter: P,
    policy: TrayPolicy,
    known: KnownItems,
    legacy: LegacyBridge,
    items: HashMap<String, ProtocolItem>,
    // exposed protocol items, sorted by discovery
    order: Vec<(u64, String)>,
    legacy_items: HashMap<u64, LegacyItem>,
}

impl<P: Presenter> Aggregator<P> {
    pub fn new(policy: TrayPolicy, known: KnownItems, legacy: KnownItems, presenter: P) -> Self {
        Self {
            presenter,
            policy,
            known,
            legacy: LegacyBridge::new(legacy, policy),
            items: HashMap::new(),
            order: Vec::new(),
            legacy_items: HashMap::new(),
        }
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    pub fn known_items(&self) -> &KnownItems {
        &self.known
    }

    pub fn known_legacy_items(&self) -> &KnownItems {
        self.legacy.known()
    }

    /// Copy the known and hidden lists into `config`.
    pub fn write_lists(&self, config: &mut TrayConfig) {
        config.set_item_lists(&self.known, self.legacy.known());
    }

    /// All displayed items: protocol items in the order they were discovered, followed by legacy
    /// icons in their user-defined order.
    pub fn ids(&self) -> Vec<ItemId> {
        let legacy_names = self.legacy.known();
        let legacy = self
            .legacy_items
            .iter()
            .sorted_by_key(|(window, item)| (legacy_names.position(&item.name).unwrap_or(usize::MAX), **window))
            .map(|(window, _)| ItemId::Legacy(*window));

        self.order.iter().map(|(_, key)| ItemId::Protocol(key.clone())).chain(legacy).collect()
    }

    pub fn get(&self, id: &ItemId) -> Option<&dyn TrayItem> {
        match id {
            ItemId::Protocol(key) => self.items.get(key).map(|item| item as &dyn TrayItem),
            ItemId::Legacy(window) => self.legacy_items.get(window).map(|item| item as &dyn TrayItem),
        }
    }

    pub fn protocol_item(&self, key: &str) -> Option<&ProtocolItem> {
        self.items.get(key)
    }

    pub fn is_hidden(&self, id: &ItemId) -> bool {
        self.get(id).is_some_and(|item| item.is_hidden())
    }

    /// Hide or show an item. The preference is stored under the item's name, so it applies to
    /// every item with the same name.
    pub fn set_hidden(&mut self, id: &ItemId, hidden: bool) {
        let Some(name) = self.get(id).map(|item| item.name().to_owned()) else {
            log::debug!("can't hide unknown item {:?}", id);
            return;
        };

        let affected: Vec<ItemId> = match id {
            ItemId::Protocol(_) => {
                self.known.set_hidden(&name, hidden);
                self.items
                    .iter_mut()
                    .filter(|(_, item)| item.id == name)
                    .map(|(key, item)| {
                        item.hidden = hidden;
                        ItemId::Protocol(key.clone())
                    })
                    .collect()
            },
            ItemId::Legacy(_) => {
                self.legacy.set_hidden(&name, hidden);
                self.legacy_items
                    .iter_mut()
                    .filter(|(_, item)| item.name == name)
                    .map(|(window, item)| {
                        item.hidden = hidden;
                        ItemId::Legacy(*window)
                    })
                    .collect()
            },
        };

        for id in affected {
            self.presenter.hidden_changed(&id, hidden);
        }
        self.flush_list_events();
    }

    /// Move a protocol item name one place, see [`KnownItems::swap`].
    pub fn swap_known(&mut self, name1: &str, name2: &str) -> bool {
        let swapped = self.known.swap(name1, name2);
        self.flush_list_events();
        swapped
    }

    /// Move a legacy icon name one place, see [`KnownItems::swap`].
    pub fn swap_legacy(&mut self, name1: &str, name2: &str) -> bool {
        let swapped = self.legacy.swap(name1, name2);
        self.flush_list_events();
        swapped
    }

    /// Forget every protocol item name that isn't currently displayed.
    pub fn clear_unknown_items(&mut self) -> bool {
        let live: HashSet<String> = self.items.values().map(|item| item.id.clone()).collect();
        let changed = self.known.clear_unknown(&live);
        self.flush_list_events();
        changed
    }

    /// Forget every legacy icon name that isn't currently displayed.
    pub fn clear_unknown_legacy_items(&mut self) -> bool {
        let live: HashSet<String> = self.legacy_items.values().map(|item| item.name.clone()).collect();
        let changed = self.legacy.clear_unknown(&live);
        self.flush_list_events();
        changed
    }

    /// A legacy icon was embedded in `window`. Adding a window that is already shown replaces it.
    pub fn legacy_icon_added(&mut self, window: u64, name: &str) {
        self.legacy_icon_removed(window);
        let name = name.to_lowercase();
        let hidden = self.legacy.observe(&name);
        let item = LegacyItem { name, hidden };
        let id = ItemId::Legacy(window);
        self.presenter.item_added(&id, &item);
        self.legacy_items.insert(window, item);
        self.flush_list_events();
    }

    pub fn legacy_icon_removed(&mut self, window: u64) {
        if self.legacy_items.remove(&window).is_some() {
            self.presenter.item_removed(&ItemId::Legacy(window));
        }
    }

    /// Handle a click on an item.
    pub fn click(&self, id: &ItemId, button: MouseButton, ctrl: bool, x: i32, y: i32) -> ClickAction {
        let item = match id {
            ItemId::Protocol(key) => match self.items.get(key) {
                Some(item) => item,
                None => return ClickAction::Ignore,
            },
            ItemId::Legacy(_) => return ClickAction::Ignore,
        };

        let action = resolve_click(button, ctrl, self.policy.menu_is_primary, item.menu_only, item.menu.is_some());
        match action {
            ClickAction::Activate => item.activate(x, y),
            ClickAction::SecondaryActivate => item.handle.secondary_activate(x, y),
            ClickAction::ShowMenu | ClickAction::PanelMenu | ClickAction::Ignore => {}
        }
        action
    }

    pub fn scroll(&self, id: &ItemId, delta_x: i32, delta_y: i32) {
        if let ItemId::Protocol(key) = id {
            if let Some(item) = self.items.get(key) {
                item.handle.scroll(delta_x, delta_y);
            }
        }
    }

    fn flush_list_events(&mut self) {
        let known = self.known.drain_events();
        let legacy = self.legacy.drain_events();
        for event in &known {
            log::debug!("known items: {:?}", event);
        }
        for event in &legacy {
            log::debug!("legacy items: {:?}", event);
        }
        if !known.is_empty() || !legacy.is_empty() {
            self.presenter.lists_changed(&self.known, self.legacy.known());
        }
    }
}

impl<P: Presenter> Host for Aggregator<P> {
    fn add_item(&mut self, key: &str, discovered: u64, item: &Item, handle: &ItemHandle) {
        let hidden = self.known.observe(item.name(), self.policy.hide_new_items);
        let snapshot = ProtocolItem::new(item, handle, hidden);
        let id = ItemId::Protocol(key.to_owned());
        self.presenter.item_added(&id, &snapshot);
        if self.items.insert(key.to_owned(), snapshot).is_none() {
            let idx = self.order.partition_point(|(seq, _)| *seq < discovered);
            self.order.insert(idx, (discovered, key.to_owned()));
        }
        self.flush_list_events();
    }

    fn remove_item(&mut self, key: &str) {
        if self.items.remove(key).is_some() {
            self.order.retain(|(_, k)| k != key);
            self.presenter.item_removed(&ItemId::Protocol(key.to_owned()));
        }
    }

    fn item_changed(&mut self, key: &str, item: &Item, change: ItemChange) {
        let Some(snapshot) = self.items.get_mut(key) else {
            return;
        };
        let handle = snapshot.handle.clone();
        *snapshot = ProtocolItem::new(item, &handle, snapshot.hidden);
        self.presenter.item_changed(&ItemId::Protocol(key.to_owned()), &*snapshot, change);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct Recorder {
        log: Vec<String>,
        saved: Vec<(Vec<String>, Vec<String>)>,
    }

    impl Presenter for Recorder {
        fn item_added(&mut self, id: &ItemId, item: &dyn TrayItem) {
            self.log.push(format!("add {:?} {} hidden={}", id, item.name(), item.is_hidden()));
        }

        fn item_removed(&mut self, id: &ItemId) {
            self.log.push(format!("remove {:?}", id));
        }

        fn item_changed(&mut self, id: &ItemId, _item: &dyn TrayItem, change: ItemChange) {
            self.log.push(format!("change {:?} {:?}", id, change));
        }

        fn hidden_changed(&mut self, id: &ItemId, hidden: bool) {
            self.log.push(format!("hidden {:?} {}", id, hidden));
        }

        fn lists_changed(&mut self, known: &KnownItems, legacy: &KnownItems) {
            self.saved.push((known.names().to_vec(), legacy.names().to_vec()));
        }
    }

    fn aggregator(policy: TrayPolicy) -> Aggregator<Recorder> {
        Aggregator::new(policy, KnownItems::default(), KnownItems::default(), Recorder::default())
    }

    fn exposed(key: &str, id: &str, props: FetchedProperties) -> Item {
        let mut item = Item::new(key);
        item.start();
        item.connected();
        item.apply_properties(FetchedProperties { id: Some(id.to_owned()), ..props });
        assert!(item.is_exposed());
        item
    }

    #[test]
    fn test_click_policy() {
        use ClickAction::*;
        use MouseButton::*;

        // (button, ctrl, menu_is_primary, menu_only, has_menu)
        assert_eq!(resolve_click(Primary, false, false, false, true), Activate);
        assert_eq!(resolve_click(Primary, false, false, true, true), ShowMenu);
        assert_eq!(resolve_click(Primary, false, true, false, true), ShowMenu);
        assert_eq!(resolve_click(Primary, false, true, false, false), Activate);
        assert_eq!(resolve_click(Middle, false, true, false, true), Activate);
        assert_eq!(resolve_click(Middle, false, true, true, true), SecondaryActivate);
        assert_eq!(resolve_click(Middle, false, false, false, true), SecondaryActivate);
        assert_eq!(resolve_click(Secondary, false, false, false, true), ShowMenu);
        assert_eq!(resolve_click(Secondary, false, false, false, false), PanelMenu);
        assert_eq!(resolve_click(Secondary, false, true, false, true), PanelMenu);
        assert_eq!(resolve_click(Secondary, true, false, false, true), PanelMenu);
    }

    #[test]
    fn test_protocol_items_in_discovery_order() {
        let mut agg = aggregator(TrayPolicy::default());
        let (handle, _rx) = ItemHandle::channel();
        let b = exposed(":1.2/StatusNotifierItem", "b", Default::default());
        let a = exposed(":1.1/StatusNotifierItem", "a", Default::default());
        agg.add_item(b.key(), 0, &b, &handle);
        agg.add_item(a.key(), 1, &a, &handle);
        agg.legacy_icon_added(7, "Blueman");

        assert_eq!(
            agg.ids(),
            vec![
                ItemId::Protocol(":1.2/StatusNotifierItem".to_owned()),
                ItemId::Protocol(":1.1/StatusNotifierItem".to_owned()),
                ItemId::Legacy(7),
            ]
        );
        assert_eq!(agg.get(&ItemId::Legacy(7)).map(|item| item.name().to_owned()), Some("blueman".to_owned()));
        assert_eq!(agg.known_items().names(), &["a".to_owned(), "b".to_owned()]);

        agg.remove_item(":1.2/StatusNotifierItem");
        assert_eq!(agg.ids().len(), 2);
    }

    #[test]
    fn test_unsealed_item_keeps_its_place() {
        let mut agg = aggregator(TrayPolicy::default());
        let mut table = ItemTable::new();
        let first = table.add(":1.1/StatusNotifierItem").unwrap();
        let second = table.add(":1.2/StatusNotifierItem").unwrap();
        let update = |start: &ItemStart, kind| ItemUpdate { key: start.key.clone(), generation: start.generation, kind };

        for start in [&first, &second] {
            let events = table.apply(update(start, UpdateKind::Connected));
            crate::host::dispatch(&mut agg, &table, events);
            let props = FetchedProperties { id: Some(start.key.clone()), ..Default::default() };
            let events = table.apply(update(start, UpdateKind::Properties(props)));
            crate::host::dispatch(&mut agg, &table, events);
        }
        let expected = vec![
            ItemId::Protocol(":1.1/StatusNotifierItem".to_owned()),
            ItemId::Protocol(":1.2/StatusNotifierItem".to_owned()),
        ];
        assert_eq!(agg.ids(), expected);

        let events = table.apply(update(&first, UpdateKind::Status("Passive".to_owned())));
        crate::host::dispatch(&mut agg, &table, events);
        assert_eq!(agg.ids(), vec![ItemId::Protocol(":1.2/StatusNotifierItem".to_owned())]);

        let events = table.apply(update(&first, UpdateKind::Status("Active".to_owned())));
        crate::host::dispatch(&mut agg, &table, events);
        assert_eq!(agg.ids(), expected);
        assert_eq!(table.keys().collect::<Vec<_>>(), vec![":1.1/StatusNotifierItem", ":1.2/StatusNotifierItem"]);
    }

    #[test]
    fn test_legacy_window_added_twice_is_replaced() {
        let mut agg = aggregator(TrayPolicy::default());
        agg.legacy_icon_added(7, "Blueman");
        agg.legacy_icon_added(7, "Blueman");
        assert_eq!(agg.ids(), vec![ItemId::Legacy(7)]);
        assert_eq!(
            agg.presenter().log,
            vec![
                "add Legacy(7) blueman hidden=false".to_owned(),
                "remove Legacy(7)".to_owned(),
                "add Legacy(7) blueman hidden=false".to_owned(),
            ]
        );
    }

    #[test]
    fn test_legacy_icons_follow_known_order() {
        let legacy = KnownItems::new(vec!["zz".to_owned(), "aa".to_owned()], vec![]);
        let mut agg = Aggregator::new(TrayPolicy::default(), KnownItems::default(), legacy, Recorder::default());
        agg.legacy_icon_added(1, "aa");
        agg.legacy_icon_added(2, "zz");
        agg.legacy_icon_added(3, "new");
        assert_eq!(agg.ids(), vec![ItemId::Legacy(3), ItemId::Legacy(2), ItemId::Legacy(1)]);

        assert!(agg.swap_legacy("zz", "aa"));
        assert_eq!(agg.ids(), vec![ItemId::Legacy(3), ItemId::Legacy(1), ItemId::Legacy(2)]);
    }

    #[test]
    fn test_hide_new_items_policy() {
        let mut agg = aggregator(TrayPolicy { hide_new_items: true, ..Default::default() });
        let (handle, _rx) = ItemHandle::channel();
        let item = exposed(":1.1/StatusNotifierItem", "nm-applet", Default::default());
        agg.add_item(item.key(), 0, &item, &handle);

        let id = ItemId::Protocol(item.key().to_owned());
        assert!(agg.is_hidden(&id));
        agg.set_hidden(&id, false);
        assert!(!agg.is_hidden(&id));
        assert_eq!(
            agg.presenter().log,
            vec![
                "add Protocol(\":1.1/StatusNotifierItem\") nm-applet hidden=true".to_owned(),
                "hidden Protocol(\":1.1/StatusNotifierItem\") false".to_owned(),
            ]
        );
        // once for the new item, once for showing it
        assert_eq!(agg.presenter().saved.len(), 2);
    }

    #[test]
    fn test_changes_refresh_the_snapshot() {
        let mut agg = aggregator(TrayPolicy::default());
        let (handle, _rx) = ItemHandle::channel();
        let mut item = exposed(":1.1/StatusNotifierItem", "app", Default::default());
        agg.add_item(item.key(), 0, &item, &handle);

        let changes = item.apply_properties(FetchedProperties { title: Some("Hello".to_owned()), ..Default::default() });
        assert_eq!(changes, vec![ItemChange::TooltipChanged]);
        agg.item_changed(item.key(), &item, ItemChange::TooltipChanged);

        let snapshot = agg.get(&ItemId::Protocol(item.key().to_owned())).unwrap();
        assert_eq!(snapshot.tooltip(), (Some("Hello"), None));
    }

    #[test]
    fn test_clicks_are_forwarded() {
        let mut agg = aggregator(TrayPolicy::default());
        let (handle, mut rx): (ItemHandle, mpsc::UnboundedReceiver<ItemRequest>) = ItemHandle::channel();
        let item = exposed(
            ":1.1/StatusNotifierItem",
            "app",
            FetchedProperties { item_is_menu: Some(false), ..Default::default() },
        );
        agg.add_item(item.key(), 0, &item, &handle);
        let id = ItemId::Protocol(item.key().to_owned());

        assert_eq!(agg.click(&id, MouseButton::Primary, false, 10, 20), ClickAction::Activate);
        assert_eq!(agg.click(&id, MouseButton::Middle, false, 1, 2), ClickAction::SecondaryActivate);
        agg.scroll(&id, 0, -1);
        assert_eq!(rx.try_recv(), Ok(ItemRequest::Activate { x: 10, y: 20 }));
        assert_eq!(rx.try_recv(), Ok(ItemRequest::SecondaryActivate { x: 1, y: 2 }));
        assert_eq!(rx.try_recv(), Ok(ItemRequest::Scroll { delta_x: 0, delta_y: -1 }));

        assert_eq!(agg.click(&ItemId::Legacy(3), MouseButton::Primary, false, 0, 0), ClickAction::Ignore);
    }

    #[test]
    fn test_clear_unknown_keeps_live_names() {
        let known = KnownItems::new(vec!["gone".to_owned(), "app".to_owned()], vec!["gone".to_owned()]);
        let mut agg = Aggregator::new(TrayPolicy::default(), known, KnownItems::default(), Recorder::default());
        let (handle, _rx) = ItemHandle::channel();
        let item = exposed(":1.1/StatusNotifierItem", "app", Default::default());
        agg.add_item(item.key(), 0, &item, &handle);

        assert!(agg.clear_unknown_items());
        assert_eq!(agg.known_items().names(), &["app".to_owned()]);
        assert!(!agg.clear_unknown_items());

        let mut config = TrayConfig::default();
        agg.write_lists(&mut config);
        assert_eq!(config.known_items, vec!["app".to_owned()]);
        assert_eq!(config.hidden_items, Vec::<String>::new());
    }
}
