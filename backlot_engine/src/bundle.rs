use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use backlot_vm::{InMemoryStore, VmConfig, WhereIs};

/// A self-contained script package: every program the scheduler may be asked
/// to run, plus the rule switches and hook bindings for the session.
#[derive(Debug, Default, Deserialize)]
pub struct Bundle {
    #[serde(default)]
    pub config: BundleConfig,
    /// Global script started once before the first tick.
    pub boot_script: Option<u16>,
    #[serde(default)]
    pub globals: BTreeMap<u16, Vec<u8>>,
    #[serde(default)]
    pub room: RoomBundle,
}

#[derive(Debug, Default, Deserialize)]
pub struct RoomBundle {
    #[serde(default)]
    pub scripts: BTreeMap<u16, Vec<u8>>,
    pub entry: Option<Vec<u8>>,
    pub exit: Option<Vec<u8>>,
    #[serde(default)]
    pub objects: BTreeMap<u16, ObjectBundle>,
}

#[derive(Debug, Deserialize)]
pub struct ObjectBundle {
    #[serde(default)]
    pub owner: ObjectOwner,
    /// Verb programs keyed by entry code; 255 is the wildcard entry.
    pub verbs: BTreeMap<u8, Vec<u8>>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectOwner {
    #[default]
    Room,
    Inventory,
    FlObject,
}

impl From<ObjectOwner> for WhereIs {
    fn from(owner: ObjectOwner) -> WhereIs {
        match owner {
            ObjectOwner::Room => WhereIs::Room,
            ObjectOwner::Inventory => WhereIs::Inventory,
            ObjectOwner::FlObject => WhereIs::FlObject,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BundleConfig {
    pub strict_cutscene_guard: bool,
    pub exemption_aware_freeze: bool,
    pub legacy_sentence_rules: bool,
    pub sentence_script: Option<u16>,
    pub cutscene_start_script: Option<u16>,
    pub cutscene_end_script: Option<u16>,
}

impl Default for BundleConfig {
    fn default() -> Self {
        BundleConfig {
            strict_cutscene_guard: true,
            exemption_aware_freeze: true,
            legacy_sentence_rules: true,
            sentence_script: None,
            cutscene_start_script: None,
            cutscene_end_script: None,
        }
    }
}

impl Bundle {
    pub fn load(path: &Path) -> Result<Bundle> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading script bundle at {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing script bundle {}", path.display()))
    }

    pub fn vm_config(&self) -> VmConfig {
        VmConfig {
            strict_cutscene_guard: self.config.strict_cutscene_guard,
            exemption_aware_freeze: self.config.exemption_aware_freeze,
            legacy_sentence_rules: self.config.legacy_sentence_rules,
            sentence_script: self.config.sentence_script,
            cutscene_start_script: self.config.cutscene_start_script,
            cutscene_end_script: self.config.cutscene_end_script,
        }
    }

    pub fn build_store(&self) -> InMemoryStore {
        let mut store = InMemoryStore::new();
        for (&number, code) in &self.globals {
            store.insert_global(number, code.clone());
        }
        for (&number, code) in &self.room.scripts {
            store.insert_room_script(number, code.clone());
        }
        if let Some(code) = &self.room.entry {
            store.set_room_entry(code.clone());
        }
        if let Some(code) = &self.room.exit {
            store.set_room_exit(code.clone());
        }
        for (&object, record) in &self.room.objects {
            let verbs = record
                .verbs
                .iter()
                .map(|(&entry, code)| (entry, code.clone()))
                .collect();
            store.insert_object(object, record.owner.into(), verbs);
        }
        store
    }
}
