use anyhow::Result;
use clap::Parser;

use backlot_engine::cli::Args;
use backlot_engine::runtime;

fn main() -> Result<()> {
    pretty_env_logger::init();
    let args = Args::parse();
    runtime::execute(args)
}
