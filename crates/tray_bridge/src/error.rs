use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Dbus connection error")]
    DbusError(#[from] zbus::Error),
    #[error("Dbus method error")]
    DbusMethodError(#[from] zbus::fdo::Error),
    #[error("Service {0:?} was not understood")]
    InvalidService(String),
    #[error("Could not access the configuration file")]
    ConfigIo(#[from] std::io::Error),
    #[error("Configuration file is malformed")]
    ConfigFormat(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
