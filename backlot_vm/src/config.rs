/// Fixed capacity of the slot table. Slot 0 is reserved and never acquired.
pub const NUM_SLOTS: usize = 80;

/// Local variables carried by every slot, reloaded on each (re)start.
pub const NUM_LOCALS: usize = 25;

/// Maximum depth of synchronous nested script invocation.
pub const MAX_NEST_DEPTH: usize = 15;

/// Maximum number of simultaneously open cutscene overrides.
pub const MAX_CUTSCENE_DEPTH: usize = 5;

/// Capacity of the deferred sentence queue.
pub const MAX_SENTENCES: usize = 6;

/// Rule switches and hook bindings that vary between game versions.
///
/// The scheduler takes one of these at construction instead of carrying
/// version conditionals through the hot paths.
#[derive(Debug, Clone)]
pub struct VmConfig {
    /// Stopping a slot that still owns an open cutscene override is a fatal
    /// protocol violation when set; otherwise the stop is refused and logged.
    pub strict_cutscene_guard: bool,
    /// Whether a plain freeze honours the `freeze_resistant` start flag.
    /// Early rule sets froze everything unconditionally.
    pub exemption_aware_freeze: bool,
    /// Legacy rule sets drop a queued sentence whose preposition form refers
    /// to the same object on both sides.
    pub legacy_sentence_rules: bool,
    /// Script servicing the sentence queue, if the game binds one.
    pub sentence_script: Option<u16>,
    /// Hook script invoked synchronously when a cutscene begins.
    pub cutscene_start_script: Option<u16>,
    /// Hook script invoked synchronously when a cutscene ends.
    pub cutscene_end_script: Option<u16>,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            strict_cutscene_guard: true,
            exemption_aware_freeze: true,
            legacy_sentence_rules: true,
            sentence_script: None,
            cutscene_start_script: None,
            cutscene_end_script: None,
        }
    }
}
