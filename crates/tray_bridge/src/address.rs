use crate::*;

use serde::Deserialize;
use zbus::fdo::IntrospectableProxy;

/// Where a StatusNotifierItem lives on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemAddress {
    pub bus_name: String,
    pub path: String,
}

impl ItemAddress {
    /// The registry key of this address, i.e. `{bus_name}{path}` (e.g. `:1.42/custom/Item`).
    ///
    /// This is the format used by the [RegisteredStatusNotifierItems property][rsni].
    ///
    /// [rsni]: https://freedesktop.org/wiki/Specifications/StatusNotifierItem/StatusNotifierWatcher/#registeredstatusnotifieritems
    pub fn key(&self) -> String {
        format!("{}{}", self.bus_name, self.path)
    }
}

/// Target of a key reported by a watcher. Foreign watchers sometimes report bare bus names, in
/// which case the object path has to be discovered first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemTarget {
    Address(ItemAddress),
    Pathless(String),
}

impl ItemTarget {
    pub fn bus_name(&self) -> &str {
        match self {
            ItemTarget::Address(addr) => &addr.bus_name,
            ItemTarget::Pathless(bus_name) => bus_name,
        }
    }
}

fn is_bus_name(name: &str) -> bool {
    zbus::names::BusName::try_from(name).is_ok()
}

/// Decode the service string passed to `RegisterStatusNotifierItem` into an item address.
///
/// The freedesktop.org specification has the format of this be just the bus name, however some
/// status items pass non-conforming values. One common one is just the object path, in which case
/// the caller's own bus name owns the item.
pub fn resolve_registration(service: &str, sender: Option<&str>) -> Result<ItemAddress> {
    let (bus_name, path) = if service.starts_with('/') {
        match sender {
            Some(sender) => (sender, service),
            None => return Err(Error::InvalidService(service.to_owned())),
        }
    } else {
        (service, names::ITEM_OBJECT)
    };

    if !is_bus_name(bus_name) {
        return Err(Error::InvalidService(service.to_owned()));
    }

    Ok(ItemAddress { bus_name: bus_name.to_owned(), path: path.to_owned() })
}

/// Split a registry key back into its bus name and object path.
pub fn parse_key(key: &str) -> Result<ItemTarget> {
    let target = match key.find('/') {
        Some(idx) => {
            ItemTarget::Address(ItemAddress { bus_name: key[..idx].to_owned(), path: key[idx..].to_owned() })
        },
        None => ItemTarget::Pathless(key.to_owned()),
    };

    if is_bus_name(target.bus_name()) {
        Ok(target)
    } else {
        Err(Error::InvalidService(key.to_owned()))
    }
}

/// Turn an [`ItemTarget`] into a full address, introspecting the bus name if needed.
pub async fn resolve_target(con: &zbus::Connection, target: ItemTarget) -> zbus::Result<ItemAddress> {
    match target {
        ItemTarget::Address(addr) => Ok(addr),
        ItemTarget::Pathless(bus_name) => {
            let path = resolve_pathless_address(con, &bus_name, "/".to_owned())
                .await?
                .ok_or_else(|| zbus::Error::Failure(format!("no StatusNotifierItem found for {bus_name}")))?;
            Ok(ItemAddress { bus_name, path })
        },
    }
}

#[derive(Deserialize)]
struct DBusNode {
    #[serde(default)]
    interface: Vec<DBusInterface>,

    #[serde(default)]
    node: Vec<DBusNode>,

    #[serde(rename = "@name")]
    name: Option<String>,
}

#[derive(Deserialize)]
struct DBusInterface {
    #[serde(rename = "@name")]
    name: String,
}

enum NodeMatch {
    Found,
    Children(Vec<String>),
}

fn inspect_node(introspection_xml: &str) -> zbus::Result<NodeMatch> {
    let dbus_node =
        quick_xml::de::from_str::<DBusNode>(introspection_xml).map_err(|err| zbus::Error::Failure(err.to_string()))?;

    if dbus_node.interface.iter().any(|interface| interface.name == names::ITEM_INTERFACE) {
        Ok(NodeMatch::Found)
    } else {
        Ok(NodeMatch::Children(dbus_node.node.into_iter().filter_map(|node| node.name).collect()))
    }
}

async fn resolve_pathless_address(con: &zbus::Connection, service: &str, path: String) -> zbus::Result<Option<String>> {
    let introspection_xml =
        IntrospectableProxy::builder(con).destination(service)?.path(path.as_str())?.build().await?.introspect().await?;

    let children = match inspect_node(&introspection_xml)? {
        NodeMatch::Found => return Ok(Some(path)),
        NodeMatch::Children(children) => children,
    };

    for name in children {
        if name == "StatusNotifierItem" {
            // dbus may not report the interface on this node, take it anyway
            return Ok(Some(join_to_path(&path, &name)));
        }

        let path = Box::pin(resolve_pathless_address(con, service, join_to_path(&path, &name))).await?;
        if path.is_some() {
            return Ok(path);
        }
    }

    Ok(None)
}

fn join_to_path(path: &str, name: &str) -> String {
    // Make sure we don't double-up on the leading slash
    format!("{path}/{name}", path = if path == "/" { "" } else { path })
}
