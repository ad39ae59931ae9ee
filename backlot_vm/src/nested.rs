use serde::{Deserialize, Serialize};

use crate::config::MAX_NEST_DEPTH;
use crate::error::VmError;
use crate::slot::{ScriptSlot, WhereIs};

/// Identity of a suspended caller at the moment a nested invocation began.
/// Used only to decide whether that caller may be resumed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestCaller {
    pub number: u16,
    pub where_is: WhereIs,
    pub slot: usize,
    pub generation: u64,
}

impl NestCaller {
    /// Strict identity check: same number, same ownership, same incarnation,
    /// still alive and not frozen. A stopped-and-restarted script fails the
    /// generation test and is a different caller.
    pub fn matches(&self, slot: &ScriptSlot) -> bool {
        slot.number == self.number
            && slot.where_is == self.where_is
            && slot.generation == self.generation
            && !slot.is_dead()
            && !slot.frozen
    }
}

/// One entry on the call/resume stack. `caller` is empty when the invocation
/// came from the host rather than from a running slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NestFrame {
    pub caller: Option<NestCaller>,
}

/// Bounded stack of nest frames. Overflow means runaway script recursion and
/// is fatal; unbounded host-stack descent is exactly what this guards.
#[derive(Debug, Clone, Default)]
pub struct NestStack {
    frames: Vec<NestFrame>,
}

impl NestStack {
    pub fn new() -> Self {
        NestStack {
            frames: Vec::with_capacity(MAX_NEST_DEPTH),
        }
    }

    pub fn push(&mut self, frame: NestFrame) -> Result<(), VmError> {
        if self.frames.len() >= MAX_NEST_DEPTH {
            return Err(VmError::NestOverflow {
                max: MAX_NEST_DEPTH,
            });
        }
        self.frames.push(frame);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<NestFrame> {
        self.frames.pop()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn as_slice(&self) -> &[NestFrame] {
        &self.frames
    }

    /// Reload from a persisted record, dropping frames whose caller no
    /// longer matches its slot (same rule as a live stale resumption).
    pub fn load(&mut self, frames: Vec<NestFrame>, slots: &[ScriptSlot]) {
        self.frames = frames
            .into_iter()
            .filter(|frame| match frame.caller {
                Some(caller) => slots
                    .get(caller.slot)
                    .map(|slot| caller.matches(slot))
                    .unwrap_or(false),
                None => false,
            })
            .take(MAX_NEST_DEPTH)
            .collect();
    }
}
