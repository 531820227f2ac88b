//! This is the binary that runs the playlake pipeline once.
//! there are no tests or anything else in this file because the only thing it does is load the settings
//! and start a run with functions from the `playlake_etl` library crate (which is tested).

use std::path::PathBuf;

use playlake_core::config::Settings;
use playlake_etl::start;

use clap::Parser;

#[cfg(not(feature = "cli"))]
compile_error!("The cli feature is required to build the playlake binary");

/// Options configurable via the CLI.
#[derive(Parser)]
#[clap(version, about)]
struct Flags {
    /// config file path, defaults to `Playlake.toml` in the user's config directory
    #[clap(long)]
    config: Option<PathBuf>,
    /// log level
    #[clap(long)]
    log_level: Option<log::LevelFilter>,
}

fn main() -> anyhow::Result<()> {
    let flags = Flags::try_parse()?;

    let config_file = match flags.config {
        Some(config) => config,
        None => Settings::get_config_path()?,
    };

    let settings = Settings::init(config_file, flags.log_level)?;

    let report = start(settings)?;
    if report.skipped() > 0 {
        eprintln!(
            "{} malformed source lines were skipped",
            report.skipped()
        );
    }

    Ok(())
}
