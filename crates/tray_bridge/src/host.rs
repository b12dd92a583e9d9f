use crate::*;

use futures::{stream::BoxStream, StreamExt};
use std::collections::HashMap;
use tokio::sync::mpsc;
use zbus::zvariant::OwnedValue;

/// Observer of the items mirrored from a StatusNotifierWatcher.
///
/// Only items that are currently exposed (i.e. not `Passive`) are ever passed to an
/// implementation.
pub trait Host {
    /// An item became visible. Items should be displayed ordered by `discovered`, which stays the
    /// same when an item is hidden and exposed again.
    fn add_item(&mut self, key: &str, discovered: u64, item: &Item, handle: &ItemHandle);
    /// A previously added item is gone or turned passive.
    fn remove_item(&mut self, key: &str);
    /// The tooltip, icon or menu of an added item changed.
    fn item_changed(&mut self, key: &str, item: &Item, change: ItemChange);
}

/// Claim a unique name for this connection to register as a StatusNotifierHost with.
pub async fn claim_host_name(con: &zbus::Connection) -> zbus::Result<String> {
    // From <https://www.freedesktop.org/wiki/Specifications/StatusNotifierItem/StatusNotifierHost/>:
    //
    // Instances of this service are registered on the Dbus session bus, under a name on the
    // form org.freedesktop.StatusNotifierHost-id where id is an unique identifier, that keeps
    // the names unique on the bus, such as the process-id of the application or another type
    // of identifier if more that one StatusNotifierHost is registered by the same process.
    let pid = std::process::id();
    let mut i = 0;
    loop {
        let wellknown_name = format!("{}-{}-{}", names::HOST_BUS_PREFIX, pid, i);
        let flags = [zbus::fdo::RequestNameFlags::DoNotQueue];

        use zbus::fdo::RequestNameReply::*;
        match con.request_name_with_flags(wellknown_name.as_str(), flags.into_iter().collect()).await {
            Ok(PrimaryOwner) => return Ok(wellknown_name),
            // a name we already own might belong to another host in this process
            Ok(Exists) | Ok(AlreadyOwner) | Err(zbus::Error::NameTaken) => {}
            Ok(InQueue) => {
                return Err(zbus::Error::Failure(format!("{} was queued even though DoNotQueue was set", wellknown_name)))
            },
            Err(e) => return Err(e),
        }

        i += 1;
    }
}

#[derive(Debug)]
enum WatcherEvent {
    Registered(String),
    Unregistered(String),
    Items(Vec<String>),
}

/// Connection to the watcher that currently owns [`names::WATCHER_BUS`].
struct WatcherLink {
    // keeps the signal subscriptions alive
    _proxy: proxy::StatusNotifierWatcherProxy<'static>,
    events: BoxStream<'static, WatcherEvent>,
}

impl WatcherLink {
    /// Connect to the watcher and register as a host. Returns the link and the currently
    /// registered items.
    async fn connect(con: &zbus::Connection, host_name: Option<&str>) -> zbus::Result<(Self, Vec<String>)> {
        let snw = proxy::StatusNotifierWatcherProxy::new(con).await?;

        if let Some(host_name) = host_name {
            if let Err(e) = snw.register_status_notifier_host(host_name).await {
                log::debug!("failed to register as host {}: {}", host_name, e);
            }
        }

        // subscribe before reading the list, so that nothing registered in between gets lost
        let registered = snw.receive_status_notifier_item_registered().await?.filter_map(|sig| async move {
            let args = sig.args().ok()?;
            Some(WatcherEvent::Registered(args.service.to_owned()))
        });
        let unregistered = snw.receive_status_notifier_item_unregistered().await?.filter_map(|sig| async move {
            let args = sig.args().ok()?;
            Some(WatcherEvent::Unregistered(args.service.to_owned()))
        });
        let items_changed = snw
            .receive_registered_status_notifier_items_changed()
            .await
            .filter_map(|changed| async move { changed.get().await.ok().map(WatcherEvent::Items) });

        let items = snw.registered_status_notifier_items().await?;
        let events = futures::stream::select_all([registered.boxed(), unregistered.boxed(), items_changed.boxed()]).boxed();

        Ok((Self { _proxy: snw, events }, items))
    }

    async fn next(link: &mut Option<WatcherLink>) -> Option<WatcherEvent> {
        match link {
            Some(link) => link.events.next().await,
            None => std::future::pending().await,
        }
    }
}

/// Mirror the items of whichever process owns [`names::WATCHER_BUS`] into `host`, following the
/// watcher as it comes and goes.
///
/// This only returns once the bus connection is closed, or if the initial subscriptions fail.
pub async fn run_host(con: &zbus::Connection, host: &mut dyn Host) -> zbus::Result<()> {
    let host_name = match claim_host_name(con).await {
        Ok(name) => Some(name),
        Err(e) => {
            log::debug!("could not claim a host name: {}", e);
            None
        },
    };

    let mut watcher_owner = NameWatch::new(con, names::WATCHER_BUS).await?;
    let (updates_tx, mut updates_rx) = mpsc::unbounded_channel();
    let mut table = ItemTable::new();
    let mut link: Option<WatcherLink> = None;

    loop {
        tokio::select! {
            owner = watcher_owner.next() => match owner {
                Some(OwnerEvent::Appeared(owner)) => {
                    log::debug!("watcher appeared at {}", owner);
                    link = None;
                    let events = table.clear();
                    dispatch(host, &table, events);

                    match WatcherLink::connect(con, host_name.as_deref()).await {
                        Ok((new_link, items)) => {
                            link = Some(new_link);
                            let (starts, events) = table.sync(&items);
                            dispatch(host, &table, events);
                            spawn_items(con, starts, &updates_tx);
                        },
                        Err(e) => log::debug!("failed to connect to watcher: {}", e),
                    }
                },
                Some(OwnerEvent::Vanished) => {
                    log::debug!("watcher vanished, dropping all items");
                    link = None;
                    let events = table.clear();
                    dispatch(host, &table, events);
                },
                None => break,
            },
            Some(event) = WatcherLink::next(&mut link) => match event {
                WatcherEvent::Registered(key) => {
                    log::debug!("item registered: {}", key);
                    spawn_items(con, table.add(&key), &updates_tx);
                },
                WatcherEvent::Unregistered(key) => {
                    log::debug!("item unregistered: {}", key);
                    let events = table.remove(&key).into_iter().collect();
                    dispatch(host, &table, events);
                },
                WatcherEvent::Items(items) => {
                    let (starts, events) = table.sync(&items);
                    dispatch(host, &table, events);
                    spawn_items(con, starts, &updates_tx);
                },
            },
            Some(update) = updates_rx.recv() => {
                let events = table.apply(update);
                dispatch(host, &table, events);
            },
        }
    }

    Ok(())
}

pub(crate) fn dispatch(host: &mut dyn Host, table: &ItemTable, events: Vec<TableEvent>) {
    for event in events {
        match event {
            TableEvent::Added(key) => {
                if let (Some(discovered), Some(item), Some(handle)) =
                    (table.discovered(&key), table.get(&key), table.handle(&key))
                {
                    host.add_item(&key, discovered, item, handle);
                }
            },
            TableEvent::Removed(key) => host.remove_item(&key),
            TableEvent::Changed(key, change) => {
                if let Some(item) = table.get(&key) {
                    host.item_changed(&key, item, change);
                }
            },
        }
    }
}

fn spawn_items(
    con: &zbus::Connection,
    starts: impl IntoIterator<Item = ItemStart>,
    updates: &mpsc::UnboundedSender<ItemUpdate>,
) {
    for start in starts {
        tokio::spawn(run_item(con.clone(), start, updates.clone()));
    }
}

/// Connection task of a single item. Runs until the item is removed from the table or becomes
/// unreachable.
async fn run_item(con: zbus::Connection, start: ItemStart, updates: mpsc::UnboundedSender<ItemUpdate>) {
    let ItemStart { key, generation, target, cancel, mut requests } = start;
    let send = |kind: UpdateKind| {
        // the host loop is gone, nothing left to report to
        let _ = updates.send(ItemUpdate { key: key.clone(), generation, kind });
    };

    tokio::select! {
        _ = cancel.cancelled() => {}
        result = serve_item(&con, target, &mut requests, &send) => {
            if let Err(e) = result {
                log::debug!("item {} failed: {}", key, e);
            }
            send(UpdateKind::Gone);
        },
    }
}

async fn serve_item(
    con: &zbus::Connection,
    target: ItemTarget,
    requests: &mut mpsc::UnboundedReceiver<ItemRequest>,
    send: &(dyn Fn(UpdateKind) + Sync),
) -> zbus::Result<()> {
    let addr = resolve_target(con, target).await?;

    let item: proxy::StatusNotifierItemProxy<'static> = proxy::StatusNotifierItemProxy::builder(con)
        .destination(addr.bus_name.clone())?
        .path(addr.path.clone())?
        .build()
        .await?;
    let props = zbus::Proxy::new(con, addr.bus_name.clone(), addr.path.clone(), "org.freedesktop.DBus.Properties").await?;
    send(UpdateKind::Connected);

    let owner = zbus::names::BusName::try_from(addr.bus_name.clone())?;
    let exit = wait_for_service_exit(con, owner);
    tokio::pin!(exit);

    let mut refetch = futures::stream::select_all([
        item.receive_new_title().await?.map(|_| ()).boxed(),
        item.receive_new_icon().await?.map(|_| ()).boxed(),
        item.receive_new_attention_icon().await?.map(|_| ()).boxed(),
        item.receive_new_overlay_icon().await?.map(|_| ()).boxed(),
        item.receive_new_tool_tip().await?.map(|_| ()).boxed(),
    ]);
    let mut status = item.receive_new_status().await?;

    send(UpdateKind::Properties(fetch_properties(&props).await?));

    loop {
        tokio::select! {
            res = &mut exit => {
                res?;
                log::debug!("item owner {} vanished", addr.bus_name);
                return Ok(());
            },
            Some(()) = refetch.next() => send(UpdateKind::Properties(fetch_properties(&props).await?)),
            Some(sig) = status.next() => {
                if let Ok(args) = sig.args() {
                    send(UpdateKind::Status(args.status.to_owned()));
                }
            },
            request = requests.recv() => match request {
                Some(ItemRequest::Refresh) => send(UpdateKind::Properties(fetch_properties(&props).await?)),
                Some(request) => forward_action(&item, request),
                None => return Ok(()),
            },
        }
    }
}

/// `org.freedesktop.DBus.Properties.GetAll` for the item interface.
async fn fetch_properties(props: &zbus::Proxy<'_>) -> zbus::Result<FetchedProperties> {
    let values: HashMap<String, OwnedValue> = props.call("GetAll", &(names::ITEM_INTERFACE,)).await?;
    Ok(FetchedProperties::from_map(&values))
}

/// Send an action to the item without waiting for it to be handled.
fn forward_action(item: &proxy::StatusNotifierItemProxy<'static>, request: ItemRequest) {
    let item = item.clone();
    tokio::spawn(async move {
        let result = match request {
            ItemRequest::Refresh => Ok(()),
            ItemRequest::Activate { x, y } => item.activate(x, y).await,
            ItemRequest::SecondaryActivate { x, y } => item.secondary_activate(x, y).await,
            ItemRequest::ContextMenu { x, y } => item.context_menu(x, y).await,
            ItemRequest::Scroll { delta_x, delta_y } => scroll(&item, delta_x, delta_y).await,
        };
        if let Err(e) = result {
            log::debug!("item action {:?} failed: {}", request, e);
        }
    });
}

async fn scroll(item: &proxy::StatusNotifierItemProxy<'_>, delta_x: i32, delta_y: i32) -> zbus::Result<()> {
    for (delta, orientation) in scroll_calls(delta_x, delta_y) {
        item.scroll(delta, orientation).await?;
    }
    Ok(())
}

/// The `Scroll` calls needed for a scroll event. The protocol takes one axis per call.
fn scroll_calls(delta_x: i32, delta_y: i32) -> Vec<(i32, &'static str)> {
    let mut calls = Vec::new();
    if delta_x != 0 {
        calls.push((delta_x, "horizontal"));
    }
    if delta_y != 0 {
        calls.push((delta_y, "vertical"));
    }
    calls
}
