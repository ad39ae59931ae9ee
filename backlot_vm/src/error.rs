use thiserror::Error;

use crate::slot::WhereIs;

/// Failures surfaced by the scheduler and its collaborators.
///
/// The taxonomy matters more than the payloads: fatal variants abort the
/// session-level operation that raised them, while the rest terminate only
/// the offending slot's turn (the instruction loop marks the slot dead and
/// moves on).
#[derive(Debug, Error)]
pub enum VmError {
    #[error("no free script slot for script {number} ({where_is:?})")]
    SlotsExhausted { number: u16, where_is: WhereIs },

    #[error("nested script invocation exceeds depth {max}")]
    NestOverflow { max: usize },

    #[error("cutscene override stack exceeds depth {max}")]
    CutsceneOverflow { max: usize },

    #[error(
        "script {number} in slot {slot} holds {count} open cutscene override(s) and cannot be stopped"
    )]
    CutsceneGuard { slot: usize, number: u16, count: u8 },

    #[error("unknown opcode 0x{opcode:02x} at offset {offset} in script {number}")]
    UnknownOpcode {
        opcode: u8,
        offset: usize,
        number: u16,
    },

    #[error("program counter {offset} past the end of script {number} ({len} bytes)")]
    PcOutOfRange {
        offset: usize,
        number: u16,
        len: usize,
    },

    #[error("script {number} ({where_is:?}) could not be resolved")]
    ScriptMissing { number: u16, where_is: WhereIs },

    #[error("unsupported save state version {found} (expected {expected})")]
    SaveVersion { found: u16, expected: u16 },

    #[error("malformed save state: {0}")]
    BadSave(String),

    #[error("script error: {0}")]
    Script(String),
}

impl VmError {
    /// Fatal errors poison the whole session and propagate out of
    /// `run_tick`; everything else only costs the current slot its life.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            VmError::SlotsExhausted { .. }
                | VmError::NestOverflow { .. }
                | VmError::CutsceneOverflow { .. }
                | VmError::CutsceneGuard { .. }
                | VmError::SaveVersion { .. }
                | VmError::BadSave(_)
        )
    }
}
