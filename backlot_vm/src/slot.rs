use log::trace;
use serde::{Deserialize, Serialize};

use crate::config::{NUM_LOCALS, NUM_SLOTS};

/// Logical run state of a slot. `frozen` lives next to it and is orthogonal:
/// a frozen slot keeps whatever status it had.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptStatus {
    Dead,
    Paused,
    Running,
}

/// Ownership/source category of the program a slot runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhereIs {
    NotFound,
    Global,
    Local,
    Room,
    Inventory,
    FlObject,
}

impl WhereIs {
    /// Categories that belong to the current room and die with it.
    pub fn is_room_scoped(self) -> bool {
        matches!(self, WhereIs::Local | WhereIs::Room | WhereIs::FlObject)
    }

    /// Categories an object script can resolve from.
    pub fn is_object(self) -> bool {
        matches!(self, WhereIs::Room | WhereIs::Inventory | WhereIs::FlObject)
    }
}

/// One pseudo-task: a persistent execution context for a single program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptSlot {
    /// Script/object identifier bound to this slot; 0 means empty.
    pub number: u16,
    pub status: ScriptStatus,
    pub where_is: WhereIs,
    /// Object entry (verb) code; 0 for plain scripts.
    pub entry: u8,
    /// Offset into the resolved byte buffer.
    pub pc: usize,
    /// Ticks remaining before a Paused slot resumes on its own.
    pub delay: u32,
    pub frozen: bool,
    pub freeze_resistant: bool,
    pub recursive: bool,
    /// Open protected regions owned by this slot.
    pub cutscene_override_count: u8,
    /// Bumped on every bind; distinguishes a restarted script from the
    /// incarnation a nest frame captured.
    pub generation: u64,
    pub locals: [i32; NUM_LOCALS],
    /// Per-tick latch; never persisted.
    #[serde(skip)]
    pub did_run_this_tick: bool,
}

impl ScriptSlot {
    fn empty() -> Self {
        ScriptSlot {
            number: 0,
            status: ScriptStatus::Dead,
            where_is: WhereIs::NotFound,
            entry: 0,
            pc: 0,
            delay: 0,
            frozen: false,
            freeze_resistant: false,
            recursive: false,
            cutscene_override_count: 0,
            generation: 0,
            locals: [0; NUM_LOCALS],
            did_run_this_tick: false,
        }
    }

    pub fn is_dead(&self) -> bool {
        self.status == ScriptStatus::Dead
    }
}

/// Fixed array of script slots. Index 0 is reserved so a slot index of 0 can
/// never be confused with "no slot" in legacy data.
#[derive(Debug, Clone)]
pub struct SlotTable {
    slots: Vec<ScriptSlot>,
}

impl SlotTable {
    pub fn new() -> Self {
        SlotTable {
            slots: vec![ScriptSlot::empty(); NUM_SLOTS],
        }
    }

    /// First dead slot at index >= 1, if any. Exhaustion is the caller's
    /// problem: the table has no growth path.
    pub fn acquire(&self) -> Option<usize> {
        (1..NUM_SLOTS).find(|&idx| self.slots[idx].is_dead())
    }

    /// Populate a slot and mark it running. The slot's generation advances so
    /// stale nest frames can tell this incarnation from the previous one.
    #[allow(clippy::too_many_arguments)]
    pub fn bind(
        &mut self,
        index: usize,
        number: u16,
        where_is: WhereIs,
        entry: u8,
        pc: usize,
        args: &[i32],
        freeze_resistant: bool,
        recursive: bool,
    ) {
        let generation = self.slots[index].generation + 1;
        let slot = &mut self.slots[index];
        slot.number = number;
        slot.status = ScriptStatus::Running;
        slot.where_is = where_is;
        slot.entry = entry;
        slot.pc = pc;
        slot.delay = 0;
        slot.frozen = false;
        slot.freeze_resistant = freeze_resistant;
        slot.recursive = recursive;
        slot.cutscene_override_count = 0;
        slot.generation = generation;
        slot.locals = [0; NUM_LOCALS];
        for (local, arg) in slot.locals.iter_mut().zip(args) {
            *local = *arg;
        }
        slot.did_run_this_tick = false;
        trace!("slot {index}: bound script {number} ({where_is:?}) gen {generation}");
    }

    /// Mark a slot dead. A dead slot has no identity; its number reads 0.
    pub fn release(&mut self, index: usize) {
        let slot = &mut self.slots[index];
        trace!("slot {index}: released script {}", slot.number);
        slot.number = 0;
        slot.status = ScriptStatus::Dead;
        slot.where_is = WhereIs::NotFound;
        slot.frozen = false;
        slot.delay = 0;
        slot.cutscene_override_count = 0;
    }

    pub fn get(&self, index: usize) -> &ScriptSlot {
        &self.slots[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut ScriptSlot {
        &mut self.slots[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &ScriptSlot)> {
        self.slots.iter().enumerate()
    }

    pub fn as_slice(&self) -> &[ScriptSlot] {
        &self.slots
    }

    /// Replace the whole table from a persisted record.
    pub fn load(&mut self, slots: Vec<ScriptSlot>) {
        self.slots = slots;
        for slot in &mut self.slots {
            slot.did_run_this_tick = false;
        }
    }

    pub fn clear_tick_latches(&mut self) {
        for slot in &mut self.slots {
            slot.did_run_this_tick = false;
        }
    }
}

impl Default for SlotTable {
    fn default() -> Self {
        Self::new()
    }
}
