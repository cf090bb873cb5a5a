//! Scriptq Demo Host
//!
//! Runs native producer/consumer threads and a script against one shared
//! queue, then prints where every message went.
//!
//! Usage: `scriptq [settings.json]`

mod demo;
mod settings;

use anyhow::{ensure, Result};
use settings::DemoSettings;
use std::path::Path;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    tracing::info!("Scriptq v{}", scriptq_core::VERSION);

    let settings = match std::env::args_os().nth(1) {
        Some(path) => DemoSettings::load(Path::new(&path))?,
        None => DemoSettings::default(),
    };
    tracing::debug!(?settings, "loaded settings");

    let report = demo::run(&settings)?;
    println!("{report}");

    ensure!(report.is_balanced(), "message accounting does not balance");
    Ok(())
}
