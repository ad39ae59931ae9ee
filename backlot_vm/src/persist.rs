use serde::{Deserialize, Serialize};

use crate::config::NUM_SLOTS;
use crate::cutscene::CutsceneFrame;
use crate::error::VmError;
use crate::nested::NestFrame;
use crate::scheduler::Scheduler;
use crate::sentence::SentenceEntry;
use crate::slot::ScriptSlot;

/// Record layout revision understood by this crate.
pub const SAVE_VERSION: u16 = 1;

/// The logical scheduler state that round-trips through a save file: the
/// slot table with locals, the call/resume stack, the cutscene override
/// stack and the sentence queue. Per-tick transients are not carried; they
/// reset to idle on restore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedState {
    pub version: u16,
    pub tick: u64,
    pub override_hit: bool,
    pub slots: Vec<ScriptSlot>,
    pub nest: Vec<NestFrame>,
    pub cutscenes: Vec<CutsceneFrame>,
    pub sentences: Vec<SentenceEntry>,
}

impl Scheduler {
    /// Externalize everything a save file needs from the scheduler.
    pub fn snapshot(&self) -> SavedState {
        SavedState {
            version: SAVE_VERSION,
            tick: self.tick,
            override_hit: self.override_hit,
            slots: self.slots.as_slice().to_vec(),
            nest: self.nest.as_slice().to_vec(),
            cutscenes: self.cutscenes.as_slice().to_vec(),
            sentences: self.sentences.as_slice().to_vec(),
        }
    }

    /// Restore from a persisted record. Nest frames whose slot no longer
    /// matches the identity they captured are dropped, the same rule a live
    /// stale resumption follows.
    pub fn restore(&mut self, state: SavedState) -> Result<(), VmError> {
        if state.version != SAVE_VERSION {
            return Err(VmError::SaveVersion {
                found: state.version,
                expected: SAVE_VERSION,
            });
        }
        if state.slots.len() != NUM_SLOTS {
            return Err(VmError::BadSave(format!(
                "expected {NUM_SLOTS} slots, found {}",
                state.slots.len()
            )));
        }
        self.slots.load(state.slots);
        self.nest.load(state.nest, self.slots.as_slice());
        self.cutscenes.load(state.cutscenes, self.slots.as_slice());
        self.sentences.load(state.sentences);
        self.override_hit = state.override_hit;
        self.tick = state.tick;
        self.current = None;
        self.current_code = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{SavedState, SAVE_VERSION};
    use crate::config::VmConfig;
    use crate::error::VmError;
    use crate::nested::{NestCaller, NestFrame};
    use crate::scheduler::Scheduler;
    use crate::slot::{ScriptStatus, WhereIs};
    use crate::store::InMemoryStore;

    const OP_END: u8 = 0x00;
    const OP_BREAK: u8 = 0x01;

    fn scheduler_with_script(number: u16, code: Vec<u8>) -> Scheduler {
        let mut store = InMemoryStore::new();
        store.insert_global(number, code);
        Scheduler::new(VmConfig::default(), Box::new(store))
    }

    struct MiniExec;

    impl crate::exec::OpcodeExecutor for MiniExec {
        fn step(&mut self, vm: &mut Scheduler) -> Result<crate::exec::StepOutcome, VmError> {
            match vm.read_byte()? {
                OP_END => Ok(crate::exec::StepOutcome::Terminate),
                OP_BREAK => Ok(crate::exec::StepOutcome::Yield),
                op => Err(VmError::Script(format!("unexpected opcode {op}"))),
            }
        }
    }

    #[test]
    fn state_round_trips_through_json() {
        let mut vm = scheduler_with_script(12, vec![OP_BREAK, OP_END]);
        let mut exec = MiniExec;
        vm.run_script(&mut exec, 12, &[4, 5], true, false).unwrap();
        vm.enqueue_sentence(3, 100, 200, true);

        let json = serde_json::to_string(&vm.snapshot()).unwrap();
        let state: SavedState = serde_json::from_str(&json).unwrap();

        let mut restored = scheduler_with_script(12, vec![OP_BREAK, OP_END]);
        restored.restore(state).unwrap();

        let slot = restored.slot(1);
        assert_eq!(slot.number, 12);
        assert_eq!(slot.status, ScriptStatus::Running);
        assert_eq!(slot.pc, 1);
        assert_eq!(slot.locals[0], 4);
        assert_eq!(slot.locals[1], 5);
        assert!(slot.freeze_resistant);
        assert_eq!(restored.pending_sentences().len(), 1);
        assert_eq!(restored.current_slot(), None);

        // The restored scheduler picks the script back up at the saved pc.
        restored.run_tick(&mut exec).unwrap();
        assert!(restored.slot(1).is_dead());
    }

    #[test]
    fn restore_drops_nest_frames_for_mismatched_slots() {
        let mut vm = scheduler_with_script(12, vec![OP_BREAK, OP_END]);
        let mut exec = MiniExec;
        vm.run_script(&mut exec, 12, &[], false, false).unwrap();

        let mut state = vm.snapshot();
        state.nest.push(NestFrame {
            caller: Some(NestCaller {
                number: 99,
                where_is: WhereIs::Global,
                slot: 1,
                generation: 1,
            }),
        });

        let mut restored = scheduler_with_script(12, vec![OP_BREAK, OP_END]);
        restored.restore(state).unwrap();
        assert_eq!(restored.snapshot().nest.len(), 0);
    }

    #[test]
    fn restore_rejects_unknown_versions() {
        let mut vm = scheduler_with_script(12, vec![OP_END]);
        let mut state = vm.snapshot();
        state.version = SAVE_VERSION + 1;
        let err = vm.restore(state).unwrap_err();
        assert!(matches!(err, VmError::SaveVersion { .. }));
    }

    #[test]
    fn restore_rejects_truncated_slot_tables() {
        let mut vm = scheduler_with_script(12, vec![OP_END]);
        let mut state = vm.snapshot();
        state.slots.truncate(10);
        let err = vm.restore(state).unwrap_err();
        assert!(matches!(err, VmError::BadSave(_)));
    }
}
