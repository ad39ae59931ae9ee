//! Prototype host for the scheduler core: loads a JSON script bundle,
//! supplies the demo opcode executor and drives ticks from the command
//! line. Everything game-specific stays in the bundle; the binary only
//! wires the collaborators together.

pub mod bundle;
pub mod cli;
pub mod ops;
pub mod runtime;
