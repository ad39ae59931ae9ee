use log::{debug, error, trace, warn};

use crate::config::{VmConfig, NUM_LOCALS, NUM_SLOTS};
use crate::cutscene::{CutsceneFrame, CutsceneOwner, CutsceneStack};
use crate::error::VmError;
use crate::exec::{OpcodeExecutor, StepOutcome};
use crate::nested::{NestCaller, NestFrame, NestStack};
use crate::sentence::{SentenceEntry, SentenceQueue};
use crate::slot::{ScriptSlot, ScriptStatus, SlotTable, WhereIs};
use crate::store::{ResolvedScript, ScriptStore, ROOM_ENTRY_SCRIPT, ROOM_EXIT_SCRIPT};

/// Cooperative script scheduler: drives every live slot once per tick and
/// provides the synchronous nested invocation the opcode layer builds on.
///
/// One instance owns the slot table, the call/resume stack, the cutscene
/// override stack and the sentence queue for a game session. All methods run
/// on the single logic thread; the opcode executor is handed in by the host
/// on every entry point that can execute instructions.
pub struct Scheduler {
    pub(crate) config: VmConfig,
    pub(crate) store: Box<dyn ScriptStore>,
    pub(crate) slots: SlotTable,
    pub(crate) nest: NestStack,
    pub(crate) cutscenes: CutsceneStack,
    pub(crate) sentences: SentenceQueue,
    /// Slot actively executing right now; at most one at any instant.
    pub(crate) current: Option<usize>,
    pub(crate) current_code: Option<ResolvedScript>,
    /// Raised by a cutscene abort, cleared when a script observes it.
    pub(crate) override_hit: bool,
    pub(crate) tick: u64,
}

impl Scheduler {
    pub fn new(config: VmConfig, store: Box<dyn ScriptStore>) -> Self {
        Scheduler {
            config,
            store,
            slots: SlotTable::new(),
            nest: NestStack::new(),
            cutscenes: CutsceneStack::new(),
            sentences: SentenceQueue::new(),
            current: None,
            current_code: None,
            override_hit: false,
            tick: 0,
        }
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    // ------------------------------------------------------------------
    // Tick driver

    /// Run one pass over the slot table, then service the sentence queue.
    ///
    /// Every slot that is Running, unfrozen and not yet served this tick gets
    /// one turn, in ascending index order. A turn runs instructions until the
    /// slot yields, blocks behind a nested call that outlived it, or dies.
    pub fn run_tick(&mut self, exec: &mut dyn OpcodeExecutor) -> Result<(), VmError> {
        self.tick += 1;
        trace!("tick {} begins", self.tick);

        for index in 1..NUM_SLOTS {
            let slot = self.slots.get_mut(index);
            if slot.status == ScriptStatus::Paused {
                slot.delay = slot.delay.saturating_sub(1);
                if slot.delay == 0 {
                    slot.status = ScriptStatus::Running;
                }
            }
        }

        self.slots.clear_tick_latches();
        self.suspend_current();

        for index in 1..NUM_SLOTS {
            let slot = self.slots.get(index);
            if slot.status != ScriptStatus::Running || slot.frozen || slot.did_run_this_tick {
                continue;
            }
            let (number, where_is, entry) = (slot.number, slot.where_is, slot.entry);
            self.slots.get_mut(index).did_run_this_tick = true;
            match self.store.resolve(number, where_is, entry) {
                Some(resolved) => {
                    self.current = Some(index);
                    self.current_code = Some(resolved);
                    self.run_current(exec)?;
                }
                None => {
                    warn!("slot {index}: script {number} ({where_is:?}) no longer resolves");
                    self.release_slot(index);
                }
            }
        }

        self.pump_sentences(exec)
    }

    /// Instruction loop for the current slot. Exits when `current` clears:
    /// explicit yield, termination, or an abandoned nested resumption.
    fn run_current(&mut self, exec: &mut dyn OpcodeExecutor) -> Result<(), VmError> {
        while self.current.is_some() {
            match exec.step(self) {
                Ok(StepOutcome::Continue) => {
                    // A stopped or parked slot ends its turn here; a stop of
                    // the running slot already cleared `current` itself.
                    if let Some(index) = self.current {
                        if self.slots.get(index).status != ScriptStatus::Running {
                            self.suspend_current();
                        }
                    }
                }
                Ok(StepOutcome::Yield) => self.suspend_current(),
                Ok(StepOutcome::Terminate) => {
                    if let Some(index) = self.current {
                        debug!(
                            "script {} (slot {index}) finished",
                            self.slots.get(index).number
                        );
                        self.release_slot(index);
                    }
                    self.suspend_current();
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    if let Some(index) = self.current {
                        error!(
                            "script {} (slot {index}) aborted: {err}",
                            self.slots.get(index).number
                        );
                        self.release_slot(index);
                    }
                    self.suspend_current();
                }
            }
        }
        Ok(())
    }

    fn suspend_current(&mut self) {
        self.current = None;
        self.current_code = None;
    }

    /// Kill a slot and take any cutscene frames it still owns with it; a
    /// leftover frame would otherwise rewind the slot's next occupant.
    fn release_slot(&mut self, index: usize) {
        self.cutscenes.drop_owned_by(index);
        self.slots.release(index);
    }

    // ------------------------------------------------------------------
    // Starting and stopping

    /// Start a plain script, synchronously running it until it yields or
    /// finishes. With `recursive` unset, any live instance of the same
    /// script is stopped first.
    pub fn run_script(
        &mut self,
        exec: &mut dyn OpcodeExecutor,
        number: u16,
        args: &[i32],
        freeze_resistant: bool,
        recursive: bool,
    ) -> Result<(), VmError> {
        if number == 0 {
            return Ok(());
        }
        let where_is = self.store.where_is_script(number);
        if where_is == WhereIs::NotFound {
            return Err(VmError::ScriptMissing { number, where_is });
        }
        if !recursive {
            self.stop_script(number)?;
        }
        self.invoke(exec, number, where_is, 0, args, freeze_resistant, recursive)
    }

    /// Start an object's verb program. Objects absent from the room and the
    /// inventory are a silent no-op, as is a verb the object does not handle.
    pub fn run_object_script(
        &mut self,
        exec: &mut dyn OpcodeExecutor,
        object: u16,
        entry: u8,
        args: &[i32],
        freeze_resistant: bool,
        recursive: bool,
    ) -> Result<(), VmError> {
        if object == 0 {
            return Ok(());
        }
        let where_is = self.store.where_is_object(object);
        if where_is == WhereIs::NotFound {
            debug!("object {object} not present; verb {entry} ignored");
            return Ok(());
        }
        if !recursive {
            self.stop_object_script(object)?;
        }
        self.invoke(exec, object, where_is, entry, args, freeze_resistant, recursive)
    }

    /// Run the synthetic room entry pseudo-script, if the room ships one.
    pub fn run_room_entry(&mut self, exec: &mut dyn OpcodeExecutor) -> Result<(), VmError> {
        self.invoke(exec, ROOM_ENTRY_SCRIPT, WhereIs::Room, 0, &[], false, false)
    }

    /// Run the synthetic room exit pseudo-script, if the room ships one.
    pub fn run_room_exit(&mut self, exec: &mut dyn OpcodeExecutor) -> Result<(), VmError> {
        self.invoke(exec, ROOM_EXIT_SCRIPT, WhereIs::Room, 0, &[], false, false)
    }

    /// Stop every live slot running `number` as a plain script.
    /// Stopping script 0 or an unbound number is a silent no-op.
    pub fn stop_script(&mut self, number: u16) -> Result<(), VmError> {
        if number == 0 {
            return Ok(());
        }
        self.stop_matching(|slot| {
            slot.number == number
                && matches!(slot.where_is, WhereIs::Global | WhereIs::Local)
        })
    }

    /// Stop every live slot running one of `object`'s verb programs.
    pub fn stop_object_script(&mut self, object: u16) -> Result<(), VmError> {
        if object == 0 {
            return Ok(());
        }
        self.stop_matching(|slot| slot.number == object && slot.where_is.is_object())
    }

    /// Kill everything scoped to the current room, as happens on room exit.
    pub fn stop_room_scripts(&mut self) -> Result<(), VmError> {
        self.stop_matching(|slot| slot.where_is.is_room_scoped())
    }

    fn stop_matching(&mut self, matches: impl Fn(&ScriptSlot) -> bool) -> Result<(), VmError> {
        for index in 1..NUM_SLOTS {
            let slot = self.slots.get(index);
            if slot.is_dead() || !matches(slot) {
                continue;
            }
            if slot.cutscene_override_count > 0 {
                if self.config.strict_cutscene_guard {
                    return Err(VmError::CutsceneGuard {
                        slot: index,
                        number: slot.number,
                        count: slot.cutscene_override_count,
                    });
                }
                warn!(
                    "refusing to stop script {} (slot {index}): {} open cutscene override(s)",
                    slot.number, slot.cutscene_override_count
                );
                continue;
            }
            self.release_slot(index);
            if self.current == Some(index) {
                self.suspend_current();
            }
        }
        Ok(())
    }

    pub fn is_script_running(&self, number: u16) -> bool {
        number != 0
            && self.slots.iter().any(|(_, slot)| {
                !slot.is_dead()
                    && slot.number == number
                    && matches!(slot.where_is, WhereIs::Global | WhereIs::Local)
            })
    }

    pub fn is_object_script_running(&self, object: u16) -> bool {
        object != 0
            && self
                .slots
                .iter()
                .any(|(_, slot)| !slot.is_dead() && slot.number == object && slot.where_is.is_object())
    }

    // ------------------------------------------------------------------
    // Nested invocation

    /// Bind a callee into a fresh slot and run it to its first yield point,
    /// then try to restore the suspended caller. The caller resumes only if
    /// it still holds the exact identity captured in the nest frame; a
    /// caller the callee stopped (or restarted) is abandoned silently.
    fn invoke(
        &mut self,
        exec: &mut dyn OpcodeExecutor,
        number: u16,
        where_is: WhereIs,
        entry: u8,
        args: &[i32],
        freeze_resistant: bool,
        recursive: bool,
    ) -> Result<(), VmError> {
        let Some(resolved) = self.store.resolve(number, where_is, entry) else {
            if where_is.is_object() || where_is == WhereIs::Room {
                debug!("no program for {number} ({where_is:?}, entry {entry})");
                return Ok(());
            }
            return Err(VmError::ScriptMissing { number, where_is });
        };
        let slot_index = self
            .slots
            .acquire()
            .ok_or(VmError::SlotsExhausted { number, where_is })?;

        // The caller's program counter is already persisted in its slot; the
        // frame only records who may be resumed.
        let caller = self.current.map(|index| {
            let slot = self.slots.get(index);
            NestCaller {
                number: slot.number,
                where_is: slot.where_is,
                slot: index,
                generation: slot.generation,
            }
        });
        self.nest.push(NestFrame { caller })?;

        self.slots.bind(
            slot_index,
            number,
            where_is,
            entry,
            resolved.base,
            args,
            freeze_resistant,
            recursive,
        );
        debug!(
            "invoking script {number} ({where_is:?}) in slot {slot_index}, nest depth {}",
            self.nest.depth()
        );
        self.current = Some(slot_index);
        self.current_code = Some(resolved);

        let result = self.run_current(exec);
        let frame = self.nest.pop();
        result?;

        match frame.and_then(|frame| frame.caller) {
            Some(caller) => self.resume_caller(caller),
            None => self.suspend_current(),
        }
        Ok(())
    }

    fn resume_caller(&mut self, caller: NestCaller) {
        let slot = self.slots.get(caller.slot);
        if !caller.matches(slot) {
            debug!(
                "caller of slot {} changed while the callee ran; resumption abandoned",
                caller.slot
            );
            self.suspend_current();
            return;
        }
        let (number, where_is, entry) = (slot.number, slot.where_is, slot.entry);
        match self.store.resolve(number, where_is, entry) {
            Some(resolved) => {
                self.current = Some(caller.slot);
                self.current_code = Some(resolved);
            }
            None => {
                warn!("script {number} vanished during a nested call");
                self.release_slot(caller.slot);
                self.suspend_current();
            }
        }
    }

    // ------------------------------------------------------------------
    // Freeze control

    /// Suspend every live slot except the current one. Freeze-resistant
    /// slots survive a plain freeze on exemption-aware rule sets. The owner
    /// of an open cutscene override is always thawed back: protected regions
    /// keep running while, say, a dialog menu is up.
    pub fn freeze_scripts(&mut self, include_resistant: bool) {
        let exemption_aware = self.config.exemption_aware_freeze;
        for index in 1..NUM_SLOTS {
            if self.current == Some(index) {
                continue;
            }
            let slot = self.slots.get_mut(index);
            if slot.is_dead() {
                continue;
            }
            if exemption_aware && !include_resistant && slot.freeze_resistant {
                continue;
            }
            slot.frozen = true;
        }
        self.sentences.freeze_all();
        if let Some(owner) = self.cutscenes.innermost_owner() {
            let slot = self.slots.get_mut(owner.slot);
            if owner.matches(slot) {
                slot.frozen = false;
            }
        }
    }

    /// Thaw every slot and every queued sentence. Freezing never touched
    /// logical state, so nothing else needs repair.
    pub fn unfreeze_scripts(&mut self) {
        for index in 1..NUM_SLOTS {
            self.slots.get_mut(index).frozen = false;
        }
        self.sentences.unfreeze_all();
    }

    // ------------------------------------------------------------------
    // Cutscene overrides

    /// Open a protected region owned by the current slot. The program
    /// position is captured now, before the jump that normally skips the
    /// protected body, so an abort can land on it.
    pub fn begin_cutscene(
        &mut self,
        exec: &mut dyn OpcodeExecutor,
        data: i32,
    ) -> Result<(), VmError> {
        let owner = self.current.map(|index| CutsceneOwner {
            slot: index,
            generation: self.slots.get(index).generation,
        });
        let resume_pc = self.current.map(|index| self.slots.get(index).pc);
        self.cutscenes.push(CutsceneFrame {
            data,
            owner,
            resume_pc,
        })?;
        if let Some(index) = self.current {
            let slot = self.slots.get_mut(index);
            slot.cutscene_override_count = slot.cutscene_override_count.saturating_add(1);
        }
        debug!(
            "cutscene override opened (depth {}, owner {owner:?})",
            self.cutscenes.depth()
        );
        if let Some(script) = self.config.cutscene_start_script {
            self.run_script(exec, script, &[data], false, false)?;
        }
        Ok(())
    }

    /// Close the innermost protected region and run the end hook with the
    /// data parameter the region opened with.
    pub fn end_cutscene(&mut self, exec: &mut dyn OpcodeExecutor) -> Result<(), VmError> {
        let Some(frame) = self.cutscenes.pop() else {
            return Err(VmError::Script("cutscene end with no open override".into()));
        };
        if let Some(index) = self.current {
            let slot = self.slots.get_mut(index);
            if slot.cutscene_override_count > 0 {
                slot.cutscene_override_count -= 1;
            }
        }
        debug!("cutscene override closed (depth {})", self.cutscenes.depth());
        if let Some(script) = self.config.cutscene_end_script {
            self.run_script(exec, script, &[frame.data], false, false)?;
        }
        Ok(())
    }

    /// User skip: force the innermost override's owner back to the position
    /// captured at `begin_cutscene`, runnable and unfrozen, and raise the
    /// override flag. Returns whether anything was aborted; a region whose
    /// saved position was already consumed cannot be aborted twice.
    pub fn abort_cutscene(&mut self) -> bool {
        let Some(frame) = self.cutscenes.top_mut() else {
            return false;
        };
        let owner = frame.owner;
        if let Some(owner) = owner {
            if !owner.matches(self.slots.get(owner.slot)) {
                // The owning incarnation is gone; the saved position belongs
                // to nobody and must not touch the slot's next occupant.
                frame.resume_pc = None;
                return false;
            }
        }
        let Some(resume_pc) = frame.resume_pc.take() else {
            return false;
        };
        if let Some(owner) = owner {
            let slot = self.slots.get_mut(owner.slot);
            slot.pc = resume_pc;
            slot.status = ScriptStatus::Running;
            slot.frozen = false;
            slot.delay = 0;
            if slot.cutscene_override_count > 0 {
                slot.cutscene_override_count -= 1;
            }
            debug!("cutscene aborted; slot {} resumes at {resume_pc}", owner.slot);
        }
        self.override_hit = true;
        true
    }

    /// Read-and-clear the flag raised by `abort_cutscene`, the well-known
    /// "was this cutscene skipped" signal scripts poll after a wait.
    pub fn take_override_hit(&mut self) -> bool {
        std::mem::take(&mut self.override_hit)
    }

    // ------------------------------------------------------------------
    // Sentence queue

    /// Queue a deferred verb/object invocation for the sentence script.
    pub fn enqueue_sentence(&mut self, verb: u8, object_a: u16, object_b: u16, preposition: bool) {
        self.sentences.enqueue(SentenceEntry {
            verb,
            object_a,
            object_b,
            preposition,
            frozen: false,
        });
    }

    pub fn pending_sentences(&self) -> &[SentenceEntry] {
        self.sentences.as_slice()
    }

    /// Service the queue once per tick: newest entry first, and only while
    /// the sentence script is idle and the entry is not frozen.
    fn pump_sentences(&mut self, exec: &mut dyn OpcodeExecutor) -> Result<(), VmError> {
        let Some(script) = self.config.sentence_script else {
            return Ok(());
        };
        if self.sentence_script_busy(script) {
            return Ok(());
        }
        match self.sentences.last() {
            Some(entry) if !entry.frozen => {}
            _ => return Ok(()),
        }
        let Some(entry) = self.sentences.pop_last() else {
            return Ok(());
        };
        if self.config.legacy_sentence_rules && entry.preposition && entry.object_a == entry.object_b
        {
            debug!(
                "dropping degenerate sentence: verb {} on object {}",
                entry.verb, entry.object_a
            );
            return Ok(());
        }
        let args = [
            entry.verb as i32,
            entry.object_a as i32,
            entry.object_b as i32,
        ];
        match self.run_script(exec, script, &args, false, false) {
            Ok(()) => Ok(()),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                error!("sentence script {script} failed: {err}");
                Ok(())
            }
        }
    }

    fn sentence_script_busy(&self, script: u16) -> bool {
        self.slots.iter().any(|(_, slot)| {
            !slot.is_dead()
                && slot.number == script
                && matches!(slot.where_is, WhereIs::Global | WhereIs::Local)
                && !slot.frozen
        })
    }

    // ------------------------------------------------------------------
    // Executor surface

    pub fn current_slot(&self) -> Option<usize> {
        self.current
    }

    pub fn slot(&self, index: usize) -> &ScriptSlot {
        self.slots.get(index)
    }

    pub fn slots(&self) -> &[ScriptSlot] {
        self.slots.as_slice()
    }

    /// Yield the current slot's turn, leaving it runnable at its current
    /// program counter. The explicit "break" instruction lands here.
    pub fn break_here(&mut self) {
        self.suspend_current();
    }

    /// Park the current slot for `ticks` ticks; it wakes on its own.
    pub fn delay_current(&mut self, ticks: u32) -> Result<(), VmError> {
        let index = self.require_current()?;
        let slot = self.slots.get_mut(index);
        slot.delay = ticks;
        slot.status = ScriptStatus::Paused;
        Ok(())
    }

    /// Fetch the next byte of the current program, advancing the counter.
    pub fn read_byte(&mut self) -> Result<u8, VmError> {
        let index = self.require_current()?;
        let code = match self.current_code.as_ref() {
            Some(resolved) => &resolved.code,
            None => return Err(VmError::Script("current slot has no resolved code".into())),
        };
        let slot = self.slots.get(index);
        if slot.pc >= code.len() {
            return Err(VmError::PcOutOfRange {
                offset: slot.pc,
                number: slot.number,
                len: code.len(),
            });
        }
        let byte = code[slot.pc];
        self.slots.get_mut(index).pc += 1;
        Ok(byte)
    }

    /// Fetch a little-endian 16-bit operand.
    pub fn read_word(&mut self) -> Result<u16, VmError> {
        let lo = self.read_byte()? as u16;
        let hi = self.read_byte()? as u16;
        Ok(lo | hi << 8)
    }

    /// Redirect the current program counter.
    pub fn jump(&mut self, target: usize) -> Result<(), VmError> {
        let index = self.require_current()?;
        self.slots.get_mut(index).pc = target;
        Ok(())
    }

    pub fn current_local(&self, local: usize) -> Result<i32, VmError> {
        let index = self.require_current()?;
        if local >= NUM_LOCALS {
            return Err(VmError::Script(format!("local variable {local} out of range")));
        }
        Ok(self.slots.get(index).locals[local])
    }

    pub fn set_current_local(&mut self, local: usize, value: i32) -> Result<(), VmError> {
        let index = self.require_current()?;
        if local >= NUM_LOCALS {
            return Err(VmError::Script(format!("local variable {local} out of range")));
        }
        self.slots.get_mut(index).locals[local] = value;
        Ok(())
    }

    fn require_current(&self) -> Result<usize, VmError> {
        self.current
            .ok_or_else(|| VmError::Script("no script is currently executing".into()))
    }
}
