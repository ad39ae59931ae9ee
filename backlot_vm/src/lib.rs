//! Cooperative script scheduler for a legacy adventure-game virtual machine.
//!
//! Rooms and global resources ship small bytecode programs that drive
//! dialogue, puzzles and room transitions. This crate holds those programs
//! in fixed slots and runs them in apparent concurrency on one logic
//! thread: every live slot gets one turn per tick, scripts call each other
//! synchronously and resume mid-instruction, freezes suspend whole groups
//! of slots without touching their state, and cutscene overrides protect
//! regions that must survive (or deliberately reject) interruption.
//!
//! Per-opcode semantics live behind [`OpcodeExecutor`]; byte buffers come
//! from a [`ScriptStore`]. The scheduler itself only moves program
//! counters, slot lifecycles and the small coordination structures around
//! them, and the whole of that state round-trips through [`SavedState`].

pub mod config;
pub mod cutscene;
pub mod error;
pub mod exec;
pub mod nested;
pub mod persist;
pub mod scheduler;
pub mod sentence;
pub mod slot;
pub mod store;

pub use config::{VmConfig, MAX_CUTSCENE_DEPTH, MAX_NEST_DEPTH, MAX_SENTENCES, NUM_LOCALS, NUM_SLOTS};
pub use error::VmError;
pub use exec::{OpcodeExecutor, StepOutcome};
pub use persist::{SavedState, SAVE_VERSION};
pub use scheduler::Scheduler;
pub use sentence::SentenceEntry;
pub use slot::{ScriptSlot, ScriptStatus, WhereIs};
pub use store::{
    InMemoryStore, ResolvedScript, ScriptStore, ENTRY_WILDCARD, ROOM_ENTRY_SCRIPT,
    ROOM_EXIT_SCRIPT,
};
