use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Where the configuration of trayd lives.
#[derive(Debug, Clone)]
pub struct TraydPaths {
    pub config_file: PathBuf,
}

impl TraydPaths {
    pub fn from_config_file<P: AsRef<Path>>(config_file: P) -> Self {
        TraydPaths { config_file: config_file.as_ref().to_path_buf() }
    }

    pub fn default() -> Result<Self> {
        let config_dir = match std::env::var("XDG_CONFIG_HOME") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => PathBuf::from(std::env::var("HOME").context("Neither XDG_CONFIG_HOME nor HOME are set")?).join(".config"),
        };
        Ok(Self::from_config_file(config_dir.join("trayd").join("config.json")))
    }

    pub fn get_config_file(&self) -> &Path {
        self.config_file.as_path()
    }
}

impl std::fmt::Display for TraydPaths {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "config-file: {}", self.config_file.display())
    }
}
