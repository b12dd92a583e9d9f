use crate::*;

use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Result of an item's connection task, tagged with the item it belongs to.
#[derive(Debug)]
pub struct ItemUpdate {
    pub key: String,
    pub generation: u64,
    pub kind: UpdateKind,
}

#[derive(Debug)]
pub enum UpdateKind {
    Connected,
    Properties(FetchedProperties),
    Status(String),
    /// The item can't be reached anymore, either because a call failed or its owner vanished.
    Gone,
}

/// What the connection task for a newly added item needs.
#[derive(Debug)]
pub struct ItemStart {
    pub key: String,
    pub generation: u64,
    pub target: ItemTarget,
    pub cancel: CancellationToken,
    pub requests: mpsc::UnboundedReceiver<ItemRequest>,
}

/// Event for the [`Host`] implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableEvent {
    Added(String),
    Removed(String),
    Changed(String, ItemChange),
}

#[derive(Debug)]
struct Slot {
    item: Item,
    generation: u64,
    cancel: CancellationToken,
    handle: ItemHandle,
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// The items mirrored from a watcher, keyed by their registry key.
///
/// This is the only owner of [`Item`]s. Connection tasks report back through [`ItemUpdate`]s,
/// which are ignored once the item they were started for has been removed.
#[derive(Debug, Default)]
pub struct ItemTable {
    items: HashMap<String, Slot>,
    // insertion order of the keys, used as display order
    order: Vec<String>,
    next_generation: u64,
}

impl ItemTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Item> {
        self.items.get(key).map(|slot| &slot.item)
    }

    pub fn handle(&self, key: &str) -> Option<&ItemHandle> {
        self.items.get(key).map(|slot| &slot.handle)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sequence number of the item's discovery. It stays the same while the item is in the table,
    /// so it orders items the same way [`ItemTable::keys`] does.
    pub fn discovered(&self, key: &str) -> Option<u64> {
        self.items.get(key).map(|slot| slot.generation)
    }

    /// Keys in the order they were discovered.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Add an item. Adding a key that is already known only asks for its properties again.
    ///
    /// Returns what is needed to start the connection task for a new item, or `None` if the item
    /// already existed or its key is malformed.
    pub fn add(&mut self, key: &str) -> Option<ItemStart> {
        if let Some(slot) = self.items.get(key) {
            log::debug!("refreshing known item {}", key);
            slot.handle.refresh();
            return None;
        }

        let mut item = Item::new(key);
        let target = item.start()?;

        let generation = self.next_generation;
        self.next_generation += 1;
        let cancel = CancellationToken::new();
        let (handle, requests) = ItemHandle::channel();

        self.items.insert(key.to_owned(), Slot { item, generation, cancel: cancel.clone(), handle });
        self.order.push(key.to_owned());

        Some(ItemStart { key: key.to_owned(), generation, target, cancel, requests })
    }

    /// Remove an item, cancelling anything still in flight for it.
    pub fn remove(&mut self, key: &str) -> Option<TableEvent> {
        let mut slot = self.items.remove(key)?;
        self.order.retain(|k| k != key);
        slot.cancel.cancel();
        match slot.item.finish() {
            ItemChange::Finished { was_exposed: true } => Some(TableEvent::Removed(key.to_owned())),
            _ => None,
        }
    }

    /// Remove every item, e.g. because the watcher went away.
    pub fn clear(&mut self) -> Vec<TableEvent> {
        let keys = self.order.clone();
        keys.iter().filter_map(|key| self.remove(key)).collect()
    }

    /// Converge on a full list of registered keys.
    ///
    /// New keys are added, keys that are no longer listed are removed, and keys present in both
    /// are left alone.
    pub fn sync(&mut self, keys: &[String]) -> (Vec<ItemStart>, Vec<TableEvent>) {
        let listed: HashSet<&str> = keys.iter().map(String::as_str).collect();
        let stale: Vec<String> = self.order.iter().filter(|k| !listed.contains(k.as_str())).cloned().collect();
        let events = stale.iter().filter_map(|key| self.remove(key)).collect();

        let starts = keys.iter().filter(|key| !self.contains(key)).cloned().collect::<Vec<_>>();
        let starts = starts.iter().filter_map(|key| self.add(key)).collect();
        (starts, events)
    }

    /// Apply the result of a connection task.
    pub fn apply(&mut self, update: ItemUpdate) -> Vec<TableEvent> {
        let Some(slot) = self.items.get_mut(&update.key) else {
            return Vec::new();
        };
        if slot.generation != update.generation || slot.cancel.is_cancelled() {
            return Vec::new();
        }

        let changes = match update.kind {
            UpdateKind::Connected => {
                slot.item.connected();
                Vec::new()
            },
            UpdateKind::Properties(props) => slot.item.apply_properties(props),
            UpdateKind::Status(status) => slot.item.apply_status(&status).into_iter().collect(),
            UpdateKind::Gone => return self.remove(&update.key).into_iter().collect(),
        };

        changes
            .into_iter()
            .filter_map(|change| match change {
                ItemChange::Exposed => Some(TableEvent::Added(update.key.clone())),
                ItemChange::Sealed => Some(TableEvent::Removed(update.key.clone())),
                ItemChange::Finished { .. } => None,
                change => Some(TableEvent::Changed(update.key.clone(), change)),
            })
            .collect()
    }
}
