use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::emotion::EmotionVector;
use crate::error::Result;
use crate::lifecycle::HealthRecord;
use crate::types::AgentId;

const EMOTIONS_FILE: &str = "emotions.json";
const HEALTH_FILE: &str = "health.json";
const MESSAGES_FILE: &str = "messages.jsonl";

/// JSON documents keyed by agent id under one state directory.
#[derive(Debug, Clone)]
pub struct StateFiles {
    dir: PathBuf,
}

impl StateFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn messages_path(&self) -> PathBuf {
        self.dir.join(MESSAGES_FILE)
    }

    pub fn save_emotions(&self, emotions: &BTreeMap<AgentId, EmotionVector>) -> Result<()> {
        self.write_json(EMOTIONS_FILE, emotions)
    }

    pub fn load_emotions(&self) -> Result<BTreeMap<AgentId, EmotionVector>> {
        self.read_json(EMOTIONS_FILE)
    }

    pub fn save_health(&self, records: &BTreeMap<AgentId, HealthRecord>) -> Result<()> {
        self.write_json(HEALTH_FILE, records)
    }

    pub fn load_health(&self) -> Result<BTreeMap<AgentId, HealthRecord>> {
        self.read_json(HEALTH_FILE)
    }

    // Write to a sibling temp file, then rename over the target
    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let target = self.dir.join(name);
        let tmp = self.dir.join(format!("{}.tmp", name));
        std::fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
        std::fs::rename(&tmp, &target)?;
        Ok(())
    }

    /// A missing file reads as the empty document.
    fn read_json<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T> {
        let path: &Path = &self.dir.join(name);
        if !path.exists() {
            return Ok(T::default());
        }
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
