use crate::error::VmError;
use crate::scheduler::Scheduler;

/// What a single decoded-and-executed instruction did to the current slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Keep going; the slot's turn is not over.
    Continue,
    /// Explicit break: the turn ends, the slot stays runnable at its
    /// current program counter.
    Yield,
    /// End of script; the slot dies.
    Terminate,
}

/// Decodes and executes one instruction of the current slot.
///
/// Implementations fetch through the scheduler's `read_byte`/`read_word`
/// helpers (which advance the program counter) and may re-enter the
/// scheduler: start or stop scripts, open or close cutscenes, freeze, queue
/// sentences. The scheduler guarantees a current slot exists for the whole
/// call.
///
/// Errors route by `VmError::is_fatal`: a fatal error aborts the session
/// operation, anything else kills the current slot and ends its turn.
pub trait OpcodeExecutor {
    fn step(&mut self, vm: &mut Scheduler) -> Result<StepOutcome, VmError>;
}
