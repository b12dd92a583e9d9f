//! Well-known names and paths of the StatusNotifierItem protocol.

/// Bus name claimed by the StatusNotifierWatcher.
pub const WATCHER_BUS: &str = "org.kde.StatusNotifierWatcher";

/// Object path the watcher is exported at.
pub const WATCHER_OBJECT: &str = "/StatusNotifierWatcher";

/// Object path of an item that registered with a bare bus name.
pub const ITEM_OBJECT: &str = "/StatusNotifierItem";

/// Interface every item implements.
pub const ITEM_INTERFACE: &str = "org.kde.StatusNotifierItem";

/// Prefix of the names hosts claim before registering with a watcher.
pub const HOST_BUS_PREFIX: &str = "org.freedesktop.StatusNotifierHost";
