use crate::*;

use std::{collections::HashMap, sync::Arc};
use zbus::{interface, Interface};

/// Registered items, each paired with the subscription that notices its owner going away.
///
/// Every key in the registry has exactly one live subscription. Replacing or removing a key
/// always cancels its subscription first.
#[derive(Debug)]
pub struct Registry<S: Subscription> {
    items: HashMap<String, Registration<S>>,
    next_id: u64,
}

#[derive(Debug)]
struct Registration<S> {
    id: u64,
    subscription: S,
}

impl<S: Subscription> Default for Registry<S> {
    fn default() -> Self {
        Self { items: HashMap::new(), next_id: 0 }
    }
}

impl<S: Subscription> Registry<S> {
    /// Register `key`, superseding any previous registration under the same key.
    ///
    /// `subscribe` receives the id of the new registration, which must later be handed to
    /// [`Registry::remove`] by the subscription itself.
    pub fn insert(&mut self, key: &str, subscribe: impl FnOnce(u64) -> S) -> u64 {
        if let Some(old) = self.items.remove(key) {
            old.subscription.cancel();
        }
        let id = self.next_id;
        self.next_id += 1;
        self.items.insert(key.to_owned(), Registration { id, subscription: subscribe(id) });
        id
    }

    /// Remove `key`, if it is still the registration `id`. Returns whether anything was removed.
    pub fn remove(&mut self, key: &str, id: u64) -> bool {
        match self.items.get(key) {
            Some(reg) if reg.id == id => {
                reg.subscription.cancel();
                self.items.remove(key);
                true
            },
            _ => false,
        }
    }

    /// Remove `key` because its own subscription fired, if it is still the registration `id`.
    ///
    /// Unlike [`Registry::remove`] this doesn't cancel the subscription, which is the one
    /// reporting the removal and has run its course.
    pub fn expire(&mut self, key: &str, id: u64) -> bool {
        match self.items.get(key) {
            Some(reg) if reg.id == id => {
                self.items.remove(key);
                true
            },
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        for (_, reg) in self.items.drain() {
            reg.subscription.cancel();
        }
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

    pub fn keys(&self) -> Vec<String> {
        self.items.keys().cloned().collect()
    }
}

impl<S: Subscription> Drop for Registry<S> {
    fn drop(&mut self) {
        self.clear();
    }
}

/// An instance of [`org.kde.StatusNotifierWatcher`]. It only tracks what tray items exist, and
/// doesn't have any logic for displaying items (for that, see [`Host`][`crate::Host`]).
///
/// While this is usually run alongside the host, it can also be used standalone.
///
/// [`org.kde.StatusNotifierWatcher`]: https://freedesktop.org/wiki/Specifications/StatusNotifierItem/StatusNotifierWatcher/
#[derive(Debug, Default)]
pub struct Watcher {
    // Intentionally using std::sync::Mutex instead of tokio's async mutex, since we don't need to
    // hold the mutex across an await.
    //
    // See <https://docs.rs/tokio/latest/tokio/sync/struct.Mutex.html#which-kind-of-mutex-should-you-use>
    items: Arc<std::sync::Mutex<Registry<tokio::task::AbortHandle>>>,
}

/// Implementation of the `StatusNotifierWatcher` service.
///
/// Methods and properties correspond to methods and properties on the DBus service that can be
/// used by others, while signals are events that we generate that other services listen to.
#[interface(name = "org.kde.StatusNotifierWatcher")]
impl Watcher {
    /// RegisterStatusNotifierHost method
    ///
    /// Hosts are not tracked, every registration is simply acknowledged.
    async fn register_status_notifier_host(&self, service: &str) {
        log::debug!("host registered: {}", service);
    }

    /// IsStatusNotifierHostRegistered property
    ///
    /// The process running this watcher always hosts the items itself.
    #[zbus(property)]
    fn is_status_notifier_host_registered(&self) -> bool {
        true
    }

    // ------------------------------------------------------------------------

    /// RegisterStatusNotifierItem method
    async fn register_status_notifier_item(
        &self,
        service: &str,
        #[zbus(header)] hdr: zbus::message::Header<'_>,
        #[zbus(connection)] con: &zbus::Connection,
        #[zbus(signal_context)] ctxt: zbus::SignalContext<'_>,
    ) -> zbus::fdo::Result<()> {
        let sender = hdr.sender().map(|s| s.to_string());
        let addr = match resolve_registration(service, sender.as_deref()) {
            Ok(addr) => addr,
            Err(e) => {
                log::warn!("rejecting item registration: {}", e);
                return Err(zbus::fdo::Error::InvalidArgs(format!("Invalid bus name {:?}", service)));
            },
        };
        let key = addr.key();
        let owner = zbus::names::BusName::try_from(addr.bus_name)
            .map_err(|e| zbus::fdo::Error::InvalidArgs(e.to_string()))?;

        {
            let mut items = self.items.lock().unwrap(); // unwrap: mutex poisoning is okay
            if items.contains(&key) {
                log::info!("new item: {} (replacing previous registration)", key);
            } else {
                log::info!("new item: {}", key);
            }
            items.insert(&key, |id| {
                let items = self.items.clone();
                let ctxt = ctxt.to_owned();
                let con = con.to_owned();
                let key = key.clone();
                tokio::spawn(async move {
                    if let Err(e) = wait_for_service_exit(&con, owner).await {
                        log::error!("failed to wait for service exit: {}", e);
                    }

                    let removed = {
                        let mut items = items.lock().unwrap(); // unwrap: mutex poisoning is okay
                        items.expire(&key, id)
                    };
                    if !removed {
                        return;
                    }
                    log::info!("gone item: {}", key);

                    if let Err(e) = Watcher::registered_status_notifier_items_refresh(&ctxt).await {
                        log::error!("failed to signal Watcher: {}", e);
                    }
                    if let Err(e) = Watcher::status_notifier_item_unregistered(&ctxt, &key).await {
                        log::error!("failed to signal Watcher: {}", e);
                    }
                })
                .abort_handle()
            });
        }

        self.registered_status_notifier_items_changed(&ctxt).await?;
        Watcher::status_notifier_item_registered(&ctxt, &key).await?;

        Ok(())
    }

    /// StatusNotifierItemRegistered signal
    #[zbus(signal)]
    async fn status_notifier_item_registered(ctxt: &zbus::SignalContext<'_>, service: &str) -> zbus::Result<()>;

    /// StatusNotifierItemUnregistered signal
    #[zbus(signal)]
    async fn status_notifier_item_unregistered(ctxt: &zbus::SignalContext<'_>, service: &str) -> zbus::Result<()>;

    /// RegisteredStatusNotifierItems property
    #[zbus(property)]
    fn registered_status_notifier_items(&self) -> Vec<String> {
        let items = self.items.lock().unwrap(); // unwrap: mutex poisoning is okay
        items.keys()
    }

    // ------------------------------------------------------------------------

    /// ProtocolVersion property
    #[zbus(property)]
    fn protocol_version(&self) -> i32 {
        0
    }
}

impl Watcher {
    /// Create a new Watcher.
    pub fn new() -> Watcher {
        Default::default()
    }

    /// Attach and run the Watcher (in the background) on a connection.
    ///
    /// Returns whether this watcher became the owner of [`names::WATCHER_BUS`]. If the name is
    /// already owned elsewhere, the watcher is not started at all and `false` is returned, so the
    /// host can mirror whichever instance owns it.
    pub async fn attach_to(self, con: &zbus::Connection) -> zbus::Result<bool> {
        if !con.object_server().at(names::WATCHER_OBJECT, self).await? {
            return Err(zbus::Error::Failure(format!(
                "Object already exists at {} on this connection -- is StatusNotifierWatcher already running?",
                names::WATCHER_OBJECT
            )));
        }

        let flags = [zbus::fdo::RequestNameFlags::DoNotQueue];
        let owned = match con.request_name_with_flags(names::WATCHER_BUS, flags.into_iter().collect()).await {
            Ok(zbus::fdo::RequestNameReply::PrimaryOwner) | Ok(zbus::fdo::RequestNameReply::AlreadyOwner) => true,
            Ok(_) | Err(zbus::Error::NameTaken) => false,
            Err(e) => return Err(e),
        };

        if owned {
            log::info!("serving {} on {}", names::WATCHER_BUS, names::WATCHER_OBJECT);
        } else {
            log::info!("{} is owned by another process, deferring to it", names::WATCHER_BUS);
            con.object_server().remove::<Watcher, _>(names::WATCHER_OBJECT).await?;
        }
        Ok(owned)
    }

    /// Equivalent to `registered_status_notifier_items_invalidate`, but without requiring `self`.
    async fn registered_status_notifier_items_refresh(ctxt: &zbus::SignalContext<'_>) -> zbus::Result<()> {
        zbus::fdo::Properties::properties_changed(
            ctxt,
            Self::name(),
            &std::collections::HashMap::new(),
            &["RegisteredStatusNotifierItems"],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::{cell::Cell, rc::Rc};

    #[derive(Debug, Clone, Default)]
    struct FakeSubscription {
        cancelled: Rc<Cell<u32>>,
    }

    impl Subscription for FakeSubscription {
        fn cancel(&self) {
            self.cancelled.set(self.cancelled.get() + 1);
        }
    }

    #[test]
    fn test_reregistration_replaces_subscription() {
        let mut registry = Registry::default();
        let first = FakeSubscription::default();
        let second = FakeSubscription::default();

        let first_id = registry.insert(":1.42/custom/Item", |_| first.clone());
        let second_id = registry.insert(":1.42/custom/Item", |_| second.clone());

        assert_eq!(registry.len(), 1);
        assert_eq!(first.cancelled.get(), 1);
        assert_eq!(second.cancelled.get(), 0);

        // the superseded subscription must not be able to remove the new registration
        assert!(!registry.remove(":1.42/custom/Item", first_id));
        assert!(registry.contains(":1.42/custom/Item"));
        assert!(registry.remove(":1.42/custom/Item", second_id));
        assert_eq!(second.cancelled.get(), 1);
    }

    #[test]
    fn test_owner_loss_removes_exactly_once() {
        let mut registry = Registry::default();
        let sub = FakeSubscription::default();
        let id = registry.insert(":1.42/custom/Item", |_| sub.clone());
        registry.insert("org.example.Tray/StatusNotifierItem", |_| FakeSubscription::default());

        assert!(registry.remove(":1.42/custom/Item", id));
        assert!(!registry.remove(":1.42/custom/Item", id));
        assert_eq!(sub.cancelled.get(), 1);
        assert_eq!(registry.keys(), vec!["org.example.Tray/StatusNotifierItem".to_owned()]);
    }

    #[test]
    fn test_expiry_leaves_the_subscription_alone() {
        let mut registry = Registry::default();
        let sub = FakeSubscription::default();
        let id = registry.insert(":1.42/custom/Item", |_| sub.clone());

        assert!(registry.expire(":1.42/custom/Item", id));
        assert!(!registry.expire(":1.42/custom/Item", id));
        assert!(registry.is_empty());
        assert_eq!(sub.cancelled.get(), 0);
    }

    #[test]
    fn test_subscription_receives_its_id() {
        let mut registry = Registry::default();
        let mut seen = None;
        let id = registry.insert("a/StatusNotifierItem", |id| {
            seen = Some(id);
            FakeSubscription::default()
        });
        assert_eq!(seen, Some(id));
    }

    #[test]
    fn test_clear_cancels_everything() {
        let subs: Vec<FakeSubscription> = (0..3).map(|_| FakeSubscription::default()).collect();
        {
            let mut registry = Registry::default();
            for (i, sub) in subs.iter().enumerate() {
                registry.insert(&format!(":1.{i}/StatusNotifierItem"), |_| sub.clone());
            }
            registry.clear();
            assert!(registry.is_empty());
        }
        assert!(subs.iter().all(|s| s.cancelled.get() == 1));
    }
}
