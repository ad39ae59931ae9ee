use std::path::PathBuf;

use clap::Parser;

/// Prototype host that drives a script bundle through the scheduler core.
#[derive(Parser, Debug)]
#[command(
    about = "Prototype host that drives a script bundle through the scheduler",
    version
)]
pub struct Args {
    /// Path to the JSON script bundle
    #[arg(long, default_value = "demo/bundle.json")]
    pub bundle: PathBuf,

    /// Number of ticks to simulate
    #[arg(long, default_value_t = 20)]
    pub ticks: u64,

    /// Simulate the user skipping the active cutscene at this tick
    #[arg(long)]
    pub abort_tick: Option<u64>,

    /// Run the room entry pseudo-script before the first tick
    #[arg(long)]
    pub room_entry: bool,

    /// Path to write the final scheduler state as JSON
    #[arg(long)]
    pub state_json: Option<PathBuf>,

    /// Print a per-tick slot summary
    #[arg(long)]
    pub verbose: bool,
}
