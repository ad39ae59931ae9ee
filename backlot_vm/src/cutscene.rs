use serde::{Deserialize, Serialize};

use crate::config::MAX_CUTSCENE_DEPTH;
use crate::error::VmError;
use crate::slot::ScriptSlot;

/// Slot that opened a protected region, pinned to the incarnation that
/// opened it. A slot rebound since then is a different owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CutsceneOwner {
    pub slot: usize,
    pub generation: u64,
}

impl CutsceneOwner {
    pub fn matches(&self, slot: &ScriptSlot) -> bool {
        !slot.is_dead() && slot.generation == self.generation
    }
}

/// One open protected region. `resume_pc` is the position captured when the
/// region opened, consumed only by a user abort.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CutsceneFrame {
    /// Opaque data parameter handed back to the cutscene end hook.
    pub data: i32,
    /// Slot that opened the region; empty when the host opened it directly.
    pub owner: Option<CutsceneOwner>,
    /// Saved program position for abort; cleared once an abort consumes it.
    pub resume_pc: Option<usize>,
}

/// Bounded stack of open cutscene overrides.
#[derive(Debug, Clone, Default)]
pub struct CutsceneStack {
    frames: Vec<CutsceneFrame>,
}

impl CutsceneStack {
    pub fn new() -> Self {
        CutsceneStack {
            frames: Vec::with_capacity(MAX_CUTSCENE_DEPTH),
        }
    }

    pub fn push(&mut self, frame: CutsceneFrame) -> Result<(), VmError> {
        if self.frames.len() >= MAX_CUTSCENE_DEPTH {
            return Err(VmError::CutsceneOverflow {
                max: MAX_CUTSCENE_DEPTH,
            });
        }
        self.frames.push(frame);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<CutsceneFrame> {
        self.frames.pop()
    }

    pub fn top_mut(&mut self) -> Option<&mut CutsceneFrame> {
        self.frames.last_mut()
    }

    /// Owner of the innermost open region, if any; this is the slot that
    /// must keep running through a freeze.
    pub fn innermost_owner(&self) -> Option<CutsceneOwner> {
        self.frames.last().and_then(|frame| frame.owner)
    }

    /// Drop every frame owned by `slot`. Called when that slot dies with
    /// regions still open, so a later abort cannot rewind whatever script
    /// gets bound into the index next.
    pub fn drop_owned_by(&mut self, slot: usize) {
        self.frames
            .retain(|frame| frame.owner.map_or(true, |owner| owner.slot != slot));
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn as_slice(&self) -> &[CutsceneFrame] {
        &self.frames
    }

    /// Reload from a persisted record, dropping frames whose owner slot no
    /// longer holds the incarnation that opened the region.
    pub fn load(&mut self, frames: Vec<CutsceneFrame>, slots: &[ScriptSlot]) {
        self.frames = frames
            .into_iter()
            .filter(|frame| match frame.owner {
                Some(owner) => slots
                    .get(owner.slot)
                    .map(|slot| owner.matches(slot))
                    .unwrap_or(false),
                None => true,
            })
            .take(MAX_CUTSCENE_DEPTH)
            .collect();
    }
}
