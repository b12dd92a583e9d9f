use crate::paths::TraydPaths;

use anyhow::{Context, Result};
use std::path::PathBuf;
use tray_bridge::{Aggregator, Backend, ItemChange, ItemId, KnownItems, Presenter, TrayConfig, TrayItem};

/// Presenter that logs what would be displayed, and keeps the configuration file in sync with
/// the known and hidden item lists.
pub struct LoggingPresenter {
    config: TrayConfig,
    config_file: PathBuf,
}

impl LoggingPresenter {
    pub fn new(config: TrayConfig, config_file: PathBuf) -> Self {
        Self { config, config_file }
    }

    pub fn config(&self) -> &TrayConfig {
        &self.config
    }

    fn save(&self) {
        if let Err(e) = self.config.save(&self.config_file) {
            log::error!("Failed to save configuration to {}: {}", self.config_file.display(), e);
        }
    }
}

fn describe(item: &dyn TrayItem) -> String {
    match item.tooltip() {
        (Some(title), Some(subtitle)) => format!("{} ({}: {})", item.name(), title, subtitle),
        (Some(title), None) => format!("{} ({})", item.name(), title),
        _ => item.name().to_owned(),
    }
}

impl Presenter for LoggingPresenter {
    fn item_added(&mut self, id: &ItemId, item: &dyn TrayItem) {
        let hidden = if item.is_hidden() { " [hidden]" } else { "" };
        log::info!("added {:?}: {}{}", id, describe(item), hidden);
    }

    fn item_removed(&mut self, id: &ItemId) {
        log::info!("removed {:?}", id);
    }

    fn item_changed(&mut self, id: &ItemId, item: &dyn TrayItem, change: ItemChange) {
        match change {
            ItemChange::IconChanged => log::info!("icon of {:?} changed: {:?}", id, item.icon().main()),
            _ => log::info!("{:?} of {:?}: {}", change, id, describe(item)),
        }
    }

    fn hidden_changed(&mut self, id: &ItemId, hidden: bool) {
        log::info!("{:?} is now {}", id, if hidden { "hidden" } else { "shown" });
    }

    fn lists_changed(&mut self, known: &KnownItems, legacy: &KnownItems) {
        self.config.set_item_lists(known, legacy);
        self.save();
    }
}

pub async fn run_daemon(paths: &TraydPaths) -> Result<()> {
    let config = TrayConfig::load(paths.get_config_file())
        .with_context(|| format!("Failed to load configuration from {}", paths.get_config_file().display()))?;

    let con = zbus::Connection::session().await.context("Failed to connect to the session bus")?;
    let backend = Backend::start(&con).await.context("Failed to start the StatusNotifierWatcher")?;
    if backend.is_watcher() {
        log::info!("Serving the StatusNotifierWatcher");
    } else {
        log::info!("Another process serves the StatusNotifierWatcher, only mirroring its items");
    }

    let presenter = LoggingPresenter::new(config.clone(), paths.get_config_file().to_path_buf());
    let mut aggregator = Aggregator::new(config.policy(), config.known_items(), config.known_legacy_items(), presenter);

    let result = tokio::select! {
        result = backend.run(&mut aggregator) => result.context("Lost the connection to the session bus"),
        signal = tokio::signal::ctrl_c() => {
            log::info!("Shutting down");
            signal.context("Failed to wait for Ctrl-C")
        },
    };

    let mut config = aggregator.presenter().config().clone();
    aggregator.write_lists(&mut config);
    config.save(paths.get_config_file()).context("Failed to save the configuration")?;

    result
}

/// Print the keys registered with whichever watcher is running.
pub async fn list_items() -> Result<()> {
    let con = zbus::Connection::session().await.context("Failed to connect to the session bus")?;
    let watcher = tray_bridge::proxy::StatusNotifierWatcherProxy::new(&con).await?;
    let items = watcher
        .registered_status_notifier_items()
        .await
        .with_context(|| format!("Failed to query {}", tray_bridge::names::WATCHER_BUS))?;
    for item in items {
        println!("{}", item);
    }
    Ok(())
}
