//! CLI entry point for inspecting a data file.
//!
//! # Responsibility
//! - Open the configured store (or the path given as first argument).
//! - Print per-kind record counts in a stable `key=value` format.

use std::process::ExitCode;

use hbnb_core::{
    core_version, init_logging_from_config, CoreConfig, DataManager, EntityKind, FileStore,
};
use log::info;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("hbnb error={err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = CoreConfig::from_env()?;
    if let Some(path) = std::env::args_os().nth(1) {
        config.store.path = path.into();
    }
    init_logging_from_config(&config)?;

    println!("hbnb_core version={}", core_version());
    println!("hbnb data_file={}", config.store.path.display());

    let store = FileStore::open_with(config.store.clone())?;
    let manager = DataManager::with_options(store, config.manager);
    for kind in EntityKind::ALL {
        println!("hbnb count kind={} total={}", kind, manager.count(kind)?);
    }
    info!("event=cli_inspect module=cli status=ok");
    Ok(())
}
