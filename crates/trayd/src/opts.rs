use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Struct that gets generated from `RawOpt`.
#[derive(Debug, PartialEq)]
pub struct Opt {
    pub log_debug: bool,
    pub config_path: Option<PathBuf>,
    pub action: Action,
}

#[derive(Parser, Debug, PartialEq)]
#[command(author = "ElKowar", version, about)]
struct RawOpt {
    /// Write out debug logs.
    #[arg(long = "debug", global = true)]
    log_debug: bool,

    /// Override the path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    action: Option<Action>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Action {
    /// Serve the StatusNotifierWatcher if nobody else does, and show what registers with it.
    #[command(name = "daemon", alias = "d")]
    Daemon,

    /// Print the items registered with the running StatusNotifierWatcher.
    #[command(name = "list", alias = "ls")]
    List,
}

impl Opt {
    pub fn from_env() -> Self {
        let raw: RawOpt = RawOpt::parse();
        raw.into()
    }
}

impl From<RawOpt> for Opt {
    fn from(other: RawOpt) -> Self {
        let RawOpt { action, log_debug, config } = other;
        Opt { action: action.unwrap_or(Action::Daemon), log_debug, config_path: config }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> Opt {
        RawOpt::try_parse_from(args).unwrap().into()
    }

    #[test]
    fn test_daemon_is_default() {
        assert_eq!(parse(&["trayd"]), Opt { log_debug: false, config_path: None, action: Action::Daemon });
    }

    #[test]
    fn test_global_flags() {
        assert_eq!(
            parse(&["trayd", "list", "--debug", "--config", "/tmp/tray.json"]),
            Opt { log_debug: true, config_path: Some(PathBuf::from("/tmp/tray.json")), action: Action::List }
        );
    }
}
