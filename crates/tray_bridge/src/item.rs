use crate::*;

use tokio::sync::mpsc;

/// Recognised values of [`org.freedesktop.StatusNotifierItem.Status`].
///
/// [`org.freedesktop.StatusNotifierItem.Status`]: https://www.freedesktop.org/wiki/Specifications/StatusNotifierItem/StatusNotifierItem/#org.freedesktop.statusnotifieritem.status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The item doesn't convey important information to the user, it can be considered an "idle"
    /// status and is likely that visualizations will chose to hide it.
    Passive,
    /// The item is active, is more important that the item will be shown in some way to the user.
    Active,
    /// The item carries really important information for the user, such as battery charge running
    /// out and is wants to incentive the direct user intervention. Visualizations should emphasize
    /// in some way the items with NeedsAttention status.
    NeedsAttention,
}

impl Status {
    /// Anything other than `"Passive"` means the item wants to be shown, including values the
    /// protocol doesn't define.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or(Status::Active)
    }

    pub fn is_exposed(self) -> bool {
        self != Status::Passive
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ParseStatusError;

impl std::str::FromStr for Status {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> std::result::Result<Self, ParseStatusError> {
        match s {
            "Passive" => Ok(Status::Passive),
            "Active" => Ok(Status::Active),
            "NeedsAttention" => Ok(Status::NeedsAttention),
            _ => Err(ParseStatusError),
        }
    }
}

/// Lifecycle of a mirrored item.
///
/// ```text
/// Starting -> AwaitingProperties -> Exposed <-> Sealed
///     \               \                \          /
///      `---------------`----------------> Finished
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Starting,
    AwaitingProperties,
    Exposed,
    Sealed,
    Finished,
}

/// Notification produced by a state transition or a property refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemChange {
    Exposed,
    Sealed,
    Finished { was_exposed: bool },
    TooltipChanged,
    IconChanged,
    MenuChanged,
}

/// Cached attributes of an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemProperties {
    pub id: Option<String>,
    pub status: Status,
    pub title: Option<String>,
    pub tooltip_title: Option<String>,
    pub tooltip_subtitle: Option<String>,
    pub icon_desc: Option<String>,
    pub attention_desc: Option<String>,
    pub icon_theme_path: Option<String>,
    pub icon_name: Option<String>,
    pub icon_pixmap: Option<Pixmap>,
    pub attention_icon_name: Option<String>,
    pub attention_icon_pixmap: Option<Pixmap>,
    pub overlay_icon_name: Option<String>,
    pub overlay_icon_pixmap: Option<Pixmap>,
    pub item_is_menu: bool,
    pub menu: Option<String>,
}

impl Default for ItemProperties {
    fn default() -> Self {
        Self {
            id: None,
            status: Status::Active,
            title: None,
            tooltip_title: None,
            tooltip_subtitle: None,
            icon_desc: None,
            attention_desc: None,
            icon_theme_path: None,
            icon_name: None,
            icon_pixmap: None,
            attention_icon_name: None,
            attention_icon_pixmap: None,
            overlay_icon_name: None,
            overlay_icon_pixmap: None,
            // Ubuntu indicators don't implement Activate and don't report this property
            item_is_menu: true,
            menu: None,
        }
    }
}

/// Replace `slot` with `new` (empty strings meaning "unset"), reporting whether it changed.
fn update_string(slot: &mut Option<String>, new: Option<String>) -> bool {
    let Some(new) = new else {
        return false;
    };
    let new = properties::non_empty(&new);
    if *slot != new {
        *slot = new;
        true
    } else {
        false
    }
}

fn update_pixmap(slot: &mut Option<Pixmap>, new: Option<Option<Pixmap>>) -> bool {
    match new {
        Some(new) if *slot != new => {
            *slot = new;
            true
        },
        _ => false,
    }
}

/// A StatusNotifierItem (SNI) tracked by the host.
///
/// The item itself doesn't talk to the bus. It is driven by the results its connection task
/// reports, and turns them into state transitions and change notifications.
#[derive(Debug, Clone)]
pub struct Item {
    key: String,
    state: ItemState,
    props: ItemProperties,
}

impl Item {
    /// Create an item for the registry key `key`, in the `Starting` state.
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into(), state: ItemState::Starting, props: ItemProperties::default() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn state(&self) -> ItemState {
        self.state
    }

    pub fn properties(&self) -> &ItemProperties {
        &self.props
    }

    /// Whether the first property fetch has completed, i.e. accessors may be used.
    pub fn is_initialized(&self) -> bool {
        matches!(self.state, ItemState::Exposed | ItemState::Sealed)
    }

    pub fn is_exposed(&self) -> bool {
        self.state == ItemState::Exposed
    }

    /// Validate the key and decide where to connect. A malformed key finishes the item.
    pub fn start(&mut self) -> Option<ItemTarget> {
        debug_assert_eq!(self.state, ItemState::Starting);
        match parse_key(&self.key) {
            Ok(target) => Some(target),
            Err(e) => {
                log::debug!("not starting item: {}", e);
                self.state = ItemState::Finished;
                None
            },
        }
    }

    /// The connection to the item has been established.
    pub fn connected(&mut self) {
        if self.state == ItemState::Starting {
            self.state = ItemState::AwaitingProperties;
        }
    }

    /// Apply the result of a property fetch.
    ///
    /// Every property is compared against its cached value and only reported when it actually
    /// changed. Until an `Id` has been seen the item stays in `AwaitingProperties`.
    pub fn apply_properties(&mut self, fetched: FetchedProperties) -> Vec<ItemChange> {
        if matches!(self.state, ItemState::Starting | ItemState::Finished) {
            return Vec::new();
        }

        let props = &mut self.props;
        // any reported `Id` counts, even an empty one
        if props.id.is_none() {
            props.id = fetched.id;
        }

        let mut status_changed = false;
        if let Some(status) = fetched.status {
            let status = Status::parse_lenient(&status);
            status_changed = status.is_exposed() != props.status.is_exposed();
            props.status = status;
        }

        let mut tooltip = false;
        tooltip |= update_string(&mut props.title, fetched.title);
        if let Some(tt) = fetched.tooltip {
            let (title, subtitle) = tt.parts();
            tooltip |= update_string(&mut props.tooltip_title, Some(title.unwrap_or_default()));
            tooltip |= update_string(&mut props.tooltip_subtitle, Some(subtitle.unwrap_or_default()));
        }
        tooltip |= update_string(&mut props.icon_desc, fetched.icon_desc);
        tooltip |= update_string(&mut props.attention_desc, fetched.attention_desc);

        let mut icon = false;
        icon |= update_string(&mut props.icon_theme_path, fetched.icon_theme_path);
        icon |= update_string(&mut props.icon_name, fetched.icon_name);
        icon |= update_pixmap(&mut props.icon_pixmap, fetched.icon_pixmap);
        icon |= update_string(&mut props.attention_icon_name, fetched.attention_icon_name);
        icon |= update_pixmap(&mut props.attention_icon_pixmap, fetched.attention_icon_pixmap);
        icon |= update_string(&mut props.overlay_icon_name, fetched.overlay_icon_name);
        icon |= update_pixmap(&mut props.overlay_icon_pixmap, fetched.overlay_icon_pixmap);

        let mut menu = false;
        if let Some(item_is_menu) = fetched.item_is_menu {
            menu |= item_is_menu != props.item_is_menu;
            props.item_is_menu = item_is_menu;
        }
        menu |= update_string(&mut props.menu, fetched.menu);

        if self.state == ItemState::AwaitingProperties {
            if self.props.id.is_none() {
                return Vec::new();
            }
            return self.set_exposed(self.props.status.is_exposed()).into_iter().collect();
        }

        let mut changes = Vec::new();
        if status_changed {
            changes.extend(self.set_exposed(self.props.status.is_exposed()));
        }
        if self.is_exposed() {
            if tooltip {
                changes.push(ItemChange::TooltipChanged);
            }
            if icon {
                changes.push(ItemChange::IconChanged);
            }
            if menu {
                changes.push(ItemChange::MenuChanged);
            }
        }
        changes
    }

    /// Apply a `NewStatus` signal. This moves between `Exposed` and `Sealed` without a refetch.
    pub fn apply_status(&mut self, status: &str) -> Option<ItemChange> {
        if self.state == ItemState::Finished {
            return None;
        }
        let status = Status::parse_lenient(status);
        let was_exposed = self.props.status.is_exposed();
        self.props.status = status;
        if self.is_initialized() && was_exposed != status.is_exposed() {
            self.set_exposed(status.is_exposed())
        } else {
            None
        }
    }

    /// Tear the item down. Returns the final notification.
    pub fn finish(&mut self) -> ItemChange {
        let was_exposed = self.is_exposed();
        self.state = ItemState::Finished;
        ItemChange::Finished { was_exposed }
    }

    fn set_exposed(&mut self, exposed: bool) -> Option<ItemChange> {
        let (state, change) =
            if exposed { (ItemState::Exposed, ItemChange::Exposed) } else { (ItemState::Sealed, ItemChange::Sealed) };
        if self.state == state {
            None
        } else {
            self.state = state;
            Some(change)
        }
    }

    /// The item's `Id`.
    pub fn name(&self) -> &str {
        debug_assert!(self.is_initialized(), "name of uninitialized item {}", self.key);
        self.props.id.as_deref().unwrap_or_default()
    }

    /// The icon to display. An attention icon replaces the normal icon while present.
    pub fn icon(&self) -> DisplayIcon {
        debug_assert!(self.is_initialized(), "icon of uninitialized item {}", self.key);
        let props = &self.props;
        DisplayIcon {
            theme_path: props.icon_theme_path.clone(),
            name: props.attention_icon_name.clone().or_else(|| props.icon_name.clone()),
            pixmap: props.attention_icon_pixmap.clone().or_else(|| props.icon_pixmap.clone()),
            overlay_name: props.overlay_icon_name.clone(),
            overlay_pixmap: props.overlay_icon_pixmap.clone(),
        }
    }

    /// Title and subtitle of the tooltip.
    ///
    /// Items that don't set a full tooltip get one assembled from their title and accessible
    /// descriptions. A subtitle equal to the title is dropped.
    pub fn tooltip(&self) -> (Option<&str>, Option<&str>) {
        debug_assert!(self.is_initialized(), "tooltip of uninitialized item {}", self.key);
        let props = &self.props;
        let (title, subtitle) = match (
            props.tooltip_title.as_deref(),
            props.tooltip_subtitle.as_deref(),
            props.attention_desc.as_deref().or(props.icon_desc.as_deref()),
        ) {
            (Some(title), Some(subtitle), _) => (Some(title), Some(subtitle)),
            (tooltip_title, _, Some(desc)) => match tooltip_title.or(props.title.as_deref()) {
                Some(title) => (Some(title), Some(desc)),
                None => (Some(desc), None),
            },
            (Some(title), None, None) => (Some(title), None),
            (None, _, None) => (props.title.as_deref(), None),
        };
        (title, subtitle.filter(|s| Some(*s) != title))
    }

    /// Whether the item only offers a menu, so activation should open it.
    pub fn is_menu_only(&self) -> bool {
        debug_assert!(self.is_initialized(), "menu of uninitialized item {}", self.key);
        self.props.item_is_menu
    }

    /// Object path of the item's `com.canonical.dbusmenu` menu.
    pub fn menu(&self) -> Option<&str> {
        self.props.menu.as_deref()
    }
}

/// Request sent from the host to the task that owns an item's connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemRequest {
    Refresh,
    Activate { x: i32, y: i32 },
    SecondaryActivate { x: i32, y: i32 },
    ContextMenu { x: i32, y: i32 },
    Scroll { delta_x: i32, delta_y: i32 },
}

/// Cheap handle for talking to an item's provider. Requests to an item that is gone are dropped.
#[derive(Debug, Clone)]
pub struct ItemHandle {
    tx: mpsc::UnboundedSender<ItemRequest>,
}

impl ItemHandle {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ItemRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, request: ItemRequest) {
        if self.tx.send(request).is_err() {
            log::debug!("dropping request for an item that is gone");
        }
    }

    /// Ask for the properties to be fetched again.
    pub fn refresh(&self) {
        self.send(ItemRequest::Refresh);
    }

    pub fn activate(&self, x: i32, y: i32) {
        self.send(ItemRequest::Activate { x, y });
    }

    pub fn secondary_activate(&self, x: i32, y: i32) {
        self.send(ItemRequest::SecondaryActivate { x, y });
    }

    pub fn context_menu(&self, x: i32, y: i32) {
        self.send(ItemRequest::ContextMenu { x, y });
    }

    pub fn scroll(&self, delta_x: i32, delta_y: i32) {
        if delta_x != 0 || delta_y != 0 {
            self.send(ItemRequest::Scroll { delta_x, delta_y });
        }
    }
}
