//! Proxies for DBus services, so we can call them.
//!
//! The proxies follow the interface XML of the StatusNotifierItem and StatusNotifierWatcher
//! specifications, in the shape [zbus-xmlgen](https://docs.rs/crate/zbus_xmlgen/latest) generates.
//! Only the members the bridge actually uses are declared.

mod dbus_status_notifier_item;
pub use dbus_status_notifier_item::*;

mod dbus_status_notifier_watcher;
pub use dbus_status_notifier_watcher::*;
