use anyhow::{Context, Result};
use paths::TraydPaths;

mod daemon;
mod opts;
mod paths;

fn main() {
    let opts: opts::Opt = opts::Opt::from_env();

    let log_level_filter = if opts.log_debug { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    if std::env::var("RUST_LOG").is_ok() {
        pretty_env_logger::init_timed();
    } else {
        pretty_env_logger::formatted_timed_builder()
            .filter(Some("trayd"), log_level_filter)
            .filter(Some("tray_bridge"), log_level_filter)
            .init();
    }

    if let Err(err) = run(opts) {
        log::error!("{:?}", err);
        std::process::exit(1);
    }
}

fn run(opts: opts::Opt) -> Result<()> {
    let paths = match opts.config_path {
        Some(path) => TraydPaths::from_config_file(path),
        None => TraydPaths::default().context("Failed to initialize trayd paths")?,
    };
    log::debug!("Using paths: {}", paths);

    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().context("Failed to start the runtime")?;
    match opts.action {
        opts::Action::Daemon => rt.block_on(daemon::run_daemon(&paths)),
        opts::Action::List => rt.block_on(daemon::list_items()),
    }
}
