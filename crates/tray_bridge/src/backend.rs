use crate::*;

/// The watcher and host pair a tray runs on one bus connection.
///
/// The watcher is only served if nobody else owns [`names::WATCHER_BUS`] yet. The host mirrors
/// whichever watcher does, so items show up either way.
pub struct Backend {
    con: zbus::Connection,
    is_watcher: bool,
}

impl Backend {
    pub async fn start(con: &zbus::Connection) -> zbus::Result<Self> {
        let is_watcher = Watcher::new().attach_to(con).await?;
        Ok(Self { con: con.clone(), is_watcher })
    }

    /// Whether this process serves the watcher itself.
    pub fn is_watcher(&self) -> bool {
        self.is_watcher
    }

    pub fn connection(&self) -> &zbus::Connection {
        &self.con
    }

    /// Mirror the registered items into `host` until the connection closes.
    pub async fn run(&self, host: &mut dyn Host) -> zbus::Result<()> {
        run_host(&self.con, host).await
    }
}
