use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tempfile::tempdir;

use backlot_engine::bundle::Bundle;
use backlot_engine::cli::Args;
use backlot_engine::ops::DemoExecutor;
use backlot_engine::runtime;
use backlot_vm::{SavedState, Scheduler, SAVE_VERSION};

fn demo_bundle_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demo/bundle.json")
}

#[test]
fn demo_bundle_plays_the_expected_transcript() -> Result<()> {
    let bundle = Bundle::load(&demo_bundle_path())?;
    let mut vm = Scheduler::new(bundle.vm_config(), Box::new(bundle.build_store()));
    let mut exec = DemoExecutor::new();

    vm.run_room_entry(&mut exec)?;
    vm.run_script(&mut exec, bundle.boot_script.context("boot script")?, &[], false, false)?;
    assert_eq!(exec.messages, vec!["enter", "boot", "cue", "scene"]);

    // Tick 1: the scene script sits in its delay; the queued sentence runs
    // the object's verb program.
    vm.run_tick(&mut exec)?;
    assert_eq!(exec.messages.last().map(String::as_str), Some("used"));

    // Ticks 2-3: the delay expires and the cutscene closes through its hook.
    vm.run_tick(&mut exec)?;
    vm.run_tick(&mut exec)?;
    assert_eq!(exec.messages.last().map(String::as_str), Some("fin"));
    assert_eq!(vm.slots().iter().filter(|slot| !slot.is_dead()).count(), 0);
    Ok(())
}

#[test]
fn cutscene_abort_replays_the_protected_region() -> Result<()> {
    let bundle = Bundle::load(&demo_bundle_path())?;
    let mut vm = Scheduler::new(bundle.vm_config(), Box::new(bundle.build_store()));
    let mut exec = DemoExecutor::new();
    vm.run_script(&mut exec, 1, &[], false, false)?;

    // The scene script is parked in its delay with the override open.
    assert!(vm.abort_cutscene());
    vm.run_tick(&mut exec)?;
    // The owner was rewound to just after the cutscene opcode and printed
    // its banner again.
    assert_eq!(exec.messages.last().map(String::as_str), Some("scene"));
    Ok(())
}

#[test]
fn execute_writes_a_versioned_state_dump() -> Result<()> {
    let dir = tempdir()?;
    let state_path = dir.path().join("state.json");
    let args = Args {
        bundle: demo_bundle_path(),
        ticks: 2,
        abort_tick: None,
        room_entry: false,
        state_json: Some(state_path.clone()),
        verbose: false,
    };
    runtime::execute(args)?;

    let text = fs::read_to_string(&state_path).context("reading state dump")?;
    let state: SavedState = serde_json::from_str(&text).context("parsing state dump")?;
    assert_eq!(state.version, SAVE_VERSION);
    assert_eq!(state.slots.len(), backlot_vm::NUM_SLOTS);
    // The scene script is still mid-delay after two ticks.
    assert!(state.slots.iter().any(|slot| slot.number == 2));
    Ok(())
}
