use std::collections::HashMap;
use std::sync::Arc;

use crate::slot::WhereIs;

/// Object entry code that matches any verb when no exact entry exists.
pub const ENTRY_WILDCARD: u8 = 0xff;

/// Pseudo-script number for the synthetic room exit program.
pub const ROOM_EXIT_SCRIPT: u16 = 10_001;
/// Pseudo-script number for the synthetic room entry program.
pub const ROOM_ENTRY_SCRIPT: u16 = 10_002;

/// A resolved program: the byte buffer plus the offset of its first
/// instruction within that buffer.
#[derive(Debug, Clone)]
pub struct ResolvedScript {
    pub code: Arc<[u8]>,
    pub base: usize,
}

impl ResolvedScript {
    pub fn new(code: Arc<[u8]>) -> Self {
        ResolvedScript { code, base: 0 }
    }
}

/// Resolves a script identifier plus ownership category into a byte buffer.
///
/// The scheduler stays agnostic to where bytes come from; swapping in a
/// resource-file backed store changes nothing above this trait.
pub trait ScriptStore {
    /// Classify a plain script number. `NotFound` for unknown numbers.
    fn where_is_script(&self, number: u16) -> WhereIs;

    /// Classify an object number. `NotFound` when the object is not present
    /// in the current room or the inventory.
    fn where_is_object(&self, object: u16) -> WhereIs;

    /// Resolve a program. For object categories `entry` selects the verb
    /// program, falling back to the wildcard entry.
    fn resolve(&self, number: u16, where_is: WhereIs, entry: u8) -> Option<ResolvedScript>;
}

#[derive(Debug, Clone)]
struct ObjectRecord {
    where_is: WhereIs,
    verbs: HashMap<u8, Arc<[u8]>>,
}

/// Script store backed by in-memory byte tables; the test harness and the
/// prototype host both load into one of these.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    globals: HashMap<u16, Arc<[u8]>>,
    room_scripts: HashMap<u16, Arc<[u8]>>,
    objects: HashMap<u16, ObjectRecord>,
    room_entry: Option<Arc<[u8]>>,
    room_exit: Option<Arc<[u8]>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_global(&mut self, number: u16, code: Vec<u8>) {
        self.globals.insert(number, code.into());
    }

    pub fn insert_room_script(&mut self, number: u16, code: Vec<u8>) {
        self.room_scripts.insert(number, code.into());
    }

    pub fn insert_object(&mut self, object: u16, where_is: WhereIs, verbs: Vec<(u8, Vec<u8>)>) {
        let verbs = verbs
            .into_iter()
            .map(|(entry, code)| (entry, Arc::from(code)))
            .collect();
        self.objects.insert(object, ObjectRecord { where_is, verbs });
    }

    pub fn set_room_entry(&mut self, code: Vec<u8>) {
        self.room_entry = Some(code.into());
    }

    pub fn set_room_exit(&mut self, code: Vec<u8>) {
        self.room_exit = Some(code.into());
    }

    fn resolve_object(&self, object: u16, entry: u8) -> Option<ResolvedScript> {
        let record = self.objects.get(&object)?;
        let code = record
            .verbs
            .get(&entry)
            .or_else(|| record.verbs.get(&ENTRY_WILDCARD))?;
        Some(ResolvedScript::new(code.clone()))
    }
}

impl ScriptStore for InMemoryStore {
    fn where_is_script(&self, number: u16) -> WhereIs {
        if self.globals.contains_key(&number) {
            WhereIs::Global
        } else if self.room_scripts.contains_key(&number) {
            WhereIs::Local
        } else {
            WhereIs::NotFound
        }
    }

    fn where_is_object(&self, object: u16) -> WhereIs {
        self.objects
            .get(&object)
            .map(|record| record.where_is)
            .unwrap_or(WhereIs::NotFound)
    }

    fn resolve(&self, number: u16, where_is: WhereIs, entry: u8) -> Option<ResolvedScript> {
        match where_is {
            WhereIs::Global => self
                .globals
                .get(&number)
                .map(|code| ResolvedScript::new(code.clone())),
            WhereIs::Local => self
                .room_scripts
                .get(&number)
                .map(|code| ResolvedScript::new(code.clone())),
            WhereIs::Room if number == ROOM_ENTRY_SCRIPT => self
                .room_entry
                .as_ref()
                .map(|code| ResolvedScript::new(code.clone())),
            WhereIs::Room if number == ROOM_EXIT_SCRIPT => self
                .room_exit
                .as_ref()
                .map(|code| ResolvedScript::new(code.clone())),
            WhereIs::Room | WhereIs::Inventory | WhereIs::FlObject => {
                self.resolve_object(number, entry)
            }
            WhereIs::NotFound => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{InMemoryStore, ScriptStore, ENTRY_WILDCARD, ROOM_ENTRY_SCRIPT};
    use crate::slot::WhereIs;

    #[test]
    fn classifies_scripts_by_table() {
        let mut store = InMemoryStore::new();
        store.insert_global(5, vec![0]);
        store.insert_room_script(200, vec![0]);
        assert_eq!(store.where_is_script(5), WhereIs::Global);
        assert_eq!(store.where_is_script(200), WhereIs::Local);
        assert_eq!(store.where_is_script(9), WhereIs::NotFound);
    }

    #[test]
    fn object_entry_falls_back_to_wildcard() {
        let mut store = InMemoryStore::new();
        store.insert_object(
            300,
            WhereIs::Room,
            vec![(2, vec![1, 0]), (ENTRY_WILDCARD, vec![9, 0])],
        );
        let exact = store.resolve(300, WhereIs::Room, 2).unwrap();
        assert_eq!(exact.code[0], 1);
        let fallback = store.resolve(300, WhereIs::Room, 7).unwrap();
        assert_eq!(fallback.code[0], 9);
        assert!(store.resolve(301, WhereIs::Room, 2).is_none());
    }

    #[test]
    fn room_entry_pseudo_script_resolves_in_room_category() {
        let mut store = InMemoryStore::new();
        store.set_room_entry(vec![0x42, 0]);
        let resolved = store.resolve(ROOM_ENTRY_SCRIPT, WhereIs::Room, 0).unwrap();
        assert_eq!(resolved.code[0], 0x42);
        assert_eq!(resolved.base, 0);
    }
}
