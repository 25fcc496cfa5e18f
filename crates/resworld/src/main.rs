use anyhow::Context;
use clap::Parser;
use resworld_core::store::STATE_FILE_NAME;
use resworld_core::{ProgressStore, RegionCoordinator, SharedConfig};
use std::path::PathBuf;
use std::sync::Arc;

mod announcer;
mod config;
mod console;
mod local_engine;

use announcer::TerminalAnnouncer;
use console::Console;
use local_engine::LocalEngine;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the pregeneration state file
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Directory containing one folder per region
    #[arg(long, default_value = "worlds")]
    world_dir: PathBuf,

    /// Config file stem (loads `<stem>.ron` if it exists)
    #[arg(long, default_value = "resworld")]
    config: String,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse command-line arguments
    let args = Args::parse();

    let manager_config = config::load(&args.config)?;
    let engine = Arc::new(
        LocalEngine::open(&args.world_dir)
            .with_context(|| format!("Failed to open world directory {:?}", args.world_dir))?,
    );
    let store = Arc::new(ProgressStore::open(args.data_dir.join(STATE_FILE_NAME)));

    let coordinator = Arc::new(RegionCoordinator::new(
        SharedConfig::new(manager_config),
        engine.clone(),
        Arc::new(TerminalAnnouncer),
        store,
    ));

    let adopted = coordinator.discover_existing();
    let resumed = coordinator.resume_pending();
    log::info!(
        "Starting resworld ({} existing region(s), {} pregeneration(s) resumed)",
        adopted,
        resumed
    );

    let console = Console::new(coordinator.clone(), engine, args.config);
    let result = console.run(std::io::stdin().lock(), std::io::stdout());

    coordinator.shutdown();
    result
}
