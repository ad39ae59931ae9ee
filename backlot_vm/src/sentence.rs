use log::warn;
use serde::{Deserialize, Serialize};

use crate::config::MAX_SENTENCES;

/// A deferred verb+object invocation waiting for the sentence script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceEntry {
    pub verb: u8,
    pub object_a: u16,
    pub object_b: u16,
    /// Set when the sentence uses a preposition form ("use A with B").
    pub preposition: bool,
    /// Frozen sentences are skipped by the pump until unfrozen.
    pub frozen: bool,
}

/// Small bounded queue of deferred sentences, serviced most-recent-first.
#[derive(Debug, Clone, Default)]
pub struct SentenceQueue {
    entries: Vec<SentenceEntry>,
}

impl SentenceQueue {
    pub fn new() -> Self {
        SentenceQueue {
            entries: Vec::with_capacity(MAX_SENTENCES),
        }
    }

    /// Append a sentence. When the queue is full the oldest entry gives way:
    /// service is last-in-first-served, so the newest request wins.
    pub fn enqueue(&mut self, entry: SentenceEntry) {
        if self.entries.len() >= MAX_SENTENCES {
            warn!("sentence queue full; dropping oldest entry");
            self.entries.remove(0);
        }
        self.entries.push(entry);
    }

    pub fn last(&self) -> Option<&SentenceEntry> {
        self.entries.last()
    }

    pub fn pop_last(&mut self) -> Option<SentenceEntry> {
        self.entries.pop()
    }

    pub fn freeze_all(&mut self) {
        for entry in &mut self.entries {
            entry.frozen = true;
        }
    }

    pub fn unfreeze_all(&mut self) {
        for entry in &mut self.entries {
            entry.frozen = false;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn as_slice(&self) -> &[SentenceEntry] {
        &self.entries
    }

    pub fn load(&mut self, mut entries: Vec<SentenceEntry>) {
        entries.truncate(MAX_SENTENCES);
        self.entries = entries;
    }
}
