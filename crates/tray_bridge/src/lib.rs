//! Bridge between the StatusNotifierItem protocol, legacy tray icons and whatever displays them.
//!
//! [`Watcher`] serves `org.kde.StatusNotifierWatcher`, [`run_host`] mirrors the items registered
//! with it into a [`Host`], and [`Aggregator`] merges those with legacy icons for a
//! [`Presenter`].

mod address;
pub use address::*;

mod aggregator;
pub use aggregator::*;

mod backend;
pub use backend::*;

mod config;
pub use config::*;

mod error;
pub use error::*;

mod host;
pub use host::*;

mod icon;
pub use icon::*;

mod item;
pub use item::*;

mod known;
pub use known::*;

mod legacy;
pub use legacy::*;

pub mod names;

mod properties;
pub use properties::*;

pub mod proxy;

mod table;
pub use table::*;

mod tracker;
pub use tracker::*;

mod watcher;
pub use watcher::*;
