use std::fs;

use anyhow::{Context, Result};

use backlot_vm::Scheduler;

use crate::bundle::Bundle;
use crate::cli::Args;
use crate::ops::DemoExecutor;

/// Load the bundle, drive the scheduler for the requested ticks and report
/// what happened.
pub fn execute(args: Args) -> Result<()> {
    let bundle = Bundle::load(&args.bundle)?;
    let mut vm = Scheduler::new(bundle.vm_config(), Box::new(bundle.build_store()));
    let mut exec = DemoExecutor::new();

    if args.room_entry {
        vm.run_room_entry(&mut exec)
            .context("running the room entry script")?;
    }
    if let Some(boot) = bundle.boot_script {
        vm.run_script(&mut exec, boot, &[], false, false)
            .with_context(|| format!("running boot script {boot}"))?;
    }

    for tick in 1..=args.ticks {
        if args.abort_tick == Some(tick) {
            if vm.abort_cutscene() {
                eprintln!("[backlot_engine] cutscene aborted at tick {tick}");
            } else {
                eprintln!("[backlot_engine] warning: no abortable cutscene at tick {tick}");
            }
        }
        vm.run_tick(&mut exec)
            .with_context(|| format!("executing tick {tick}"))?;
        if args.verbose {
            describe_tick(&vm, tick);
        }
    }

    if let Some(path) = args.state_json.as_ref() {
        let json = serde_json::to_string_pretty(&vm.snapshot())
            .context("serializing scheduler state to JSON")?;
        fs::write(path, json)
            .with_context(|| format!("writing scheduler state to {}", path.display()))?;
        println!("Saved scheduler state to {}", path.display());
    }

    let live = vm.slots().iter().filter(|slot| !slot.is_dead()).count();
    println!(
        "Ran {} tick(s): {live} live slot(s), {} pending sentence(s)",
        args.ticks,
        vm.pending_sentences().len()
    );
    if !exec.messages.is_empty() {
        println!("\nScript output:");
        for message in &exec.messages {
            println!("  {message}");
        }
    }
    Ok(())
}

fn describe_tick(vm: &Scheduler, tick: u64) {
    let live: Vec<String> = vm
        .slots()
        .iter()
        .enumerate()
        .filter(|(_, slot)| !slot.is_dead())
        .map(|(index, slot)| {
            let frozen = if slot.frozen { " frozen" } else { "" };
            format!("{index}:{} {:?}{frozen}", slot.number, slot.status)
        })
        .collect();
    if live.is_empty() {
        println!("tick {tick:>3}: idle");
    } else {
        println!("tick {tick:>3}: {}", live.join(", "));
    }
}
