//! Tracking of bus name ownership, so that registrations disappear together with the process
//! that made them.

use futures::{stream::BoxStream, StreamExt};

/// A live ownership subscription that can be torn down explicitly.
pub trait Subscription {
    fn cancel(&self);
}

impl Subscription for tokio::task::AbortHandle {
    fn cancel(&self) {
        self.abort();
    }
}

/// Change in the ownership of a watched bus name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerEvent {
    Appeared(String),
    Vanished,
}

/// Watch a (usually well-known) name appear and vanish on the bus.
pub struct NameWatch {
    initial: Option<OwnerEvent>,
    changes: BoxStream<'static, OwnerEvent>,
}

impl NameWatch {
    /// Start watching `name`. The first event reports the current owner, if there is one.
    pub async fn new(con: &zbus::Connection, name: &str) -> zbus::Result<Self> {
        let dbus = zbus::fdo::DBusProxy::new(con).await?;
        // subscribe before asking for the owner, so that no change can slip in between
        let changes = dbus
            .receive_name_owner_changed_with_args(&[(0, name)])
            .await?
            .filter_map(|sig| async move {
                let args = sig.args().ok()?;
                Some(match &**args.new_owner() {
                    Some(owner) => OwnerEvent::Appeared(owner.to_string()),
                    None => OwnerEvent::Vanished,
                })
            })
            .boxed();

        let bus_name = zbus::names::BusName::try_from(name)?;
        let initial = match dbus.get_name_owner(bus_name).await {
            Ok(owner) => Some(OwnerEvent::Appeared(owner.to_string())),
            Err(zbus::fdo::Error::NameHasNoOwner(_)) => None,
            Err(e) => return Err(e.into()),
        };

        Ok(Self { initial, changes })
    }

    /// Next ownership change, or `None` once the bus connection is gone.
    pub async fn next(&mut self) -> Option<OwnerEvent> {
        match self.initial.take() {
            Some(ev) => Some(ev),
            None => self.changes.next().await,
        }
    }
}

/// Wait for a DBus service to disappear
pub async fn wait_for_service_exit(con: &zbus::Connection, service: zbus::names::BusName<'_>) -> zbus::fdo::Result<()> {
    let dbus = zbus::fdo::DBusProxy::new(con).await?;
    let mut owner_changes = dbus.receive_name_owner_changed_with_args(&[(0, service.as_str())]).await?;

    if !dbus.name_has_owner(service.clone()).await? {
        // service has already disappeared
        return Ok(());
    }

    while let Some(sig) = owner_changes.next().await {
        let args = sig.args()?;
        if args.new_owner().is_none() {
            break;
        }
    }

    Ok(())
}
