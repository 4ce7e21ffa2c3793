use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{ChorusError, Result};
use crate::types::AgentId;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Registry file (`.yaml`, `.yml` or `.json`). Built-in catalog when unset.
    pub registry_path: Option<PathBuf>,
    pub router: RouterConfig,
    pub fusion: FusionConfig,
    pub health: HealthConfig,
    pub provider: ProviderConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub default_agent: AgentId,
    /// Second-best / best score ratio at which two agents are fused.
    pub closeness_threshold: f32,
    /// Minimum score a target needs before it can be picked.
    pub min_score: f32,
    /// Per-word weight of an exact multi-word phrase match.
    pub phrase_bonus: f32,
    pub handlers: Vec<HandlerConfig>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default_agent: AgentId::from("echo"),
            closeness_threshold: 0.7,
            min_score: 1.0,
            phrase_bonus: 1.5,
            handlers: vec![HandlerConfig {
                name: "weather".to_string(),
                trigger_phrases: vec![
                    "weather".to_string(),
                    "forecast".to_string(),
                    "temperature".to_string(),
                ],
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerConfig {
    pub name: String,
    #[serde(default)]
    pub trigger_phrases: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub timeout_ms: u64,
    /// Terminal requests kept for `status` queries before the oldest are evicted.
    pub max_retained: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_retained: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub check_interval_secs: u64,
    pub max_error_ratio: f64,
    pub max_latency_ms: f64,
    /// Responses an agent must have produced before the error ratio is judged.
    pub min_responses: u64,
    /// Minimum age of a healthy agent's last snapshot before a check pass
    /// takes a fresh one.
    pub snapshot_interval_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 60,
            max_error_ratio: 0.5,
            max_latency_ms: 20_000.0,
            min_responses: 1,
            snapshot_interval_secs: 3_600,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Ollama,
    Hub,
    /// Canned replies, for offline runs.
    Echo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub backend: BackendKind,
    pub ollama_url: Option<String>,
    pub ollama_model: Option<String>,
    pub hub_url: String,
    pub hub_model: String,
    pub hub_api_key: Option<String>,
    /// Per-agent backend overrides on top of `backend`, e.g. `nova = "hub"`.
    pub agent_backends: BTreeMap<AgentId, BackendKind>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Ollama,
            ollama_url: None,
            ollama_model: None,
            hub_url: "https://router.huggingface.co/v1".to_string(),
            hub_model: "meta-llama/Llama-3.1-8B-Instruct".to_string(),
            hub_api_key: None,
            agent_backends: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Where messages, emotions and health snapshots are persisted.
    pub state_dir: PathBuf,
    pub backup_dir: PathBuf,
    /// Directory holding each agent's backing files (`<agents_dir>/<agent_id>/`).
    pub agents_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(".chorus/state"),
            backup_dir: PathBuf::from(".chorus/backups"),
            agents_dir: PathBuf::from(".chorus/agents"),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            ChorusError::Config(format!("cannot read config {}: {}", path.display(), e))
        })?;
        toml::from_str(&source)
            .map_err(|e| ChorusError::Config(format!("malformed config {}: {}", path.display(), e)))
    }

    /// File (when given) with environment overrides on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(path) = std::env::var("CHORUS_REGISTRY") {
            self.registry_path = Some(PathBuf::from(path));
        }
        if let Ok(agent) = std::env::var("CHORUS_DEFAULT_AGENT") {
            self.router.default_agent = AgentId::from(agent);
        }
        if let Ok(dir) = std::env::var("CHORUS_STATE_DIR") {
            self.storage.state_dir = PathBuf::from(dir);
        }
        if let Some(ms) = std::env::var("CHORUS_FUSION_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.fusion.timeout_ms = ms;
        }
        if let Ok(backend) = std::env::var("CHORUS_BACKEND") {
            match backend.as_str() {
                "ollama" => self.provider.backend = BackendKind::Ollama,
                "hub" => self.provider.backend = BackendKind::Hub,
                "echo" => self.provider.backend = BackendKind::Echo,
                other => log::warn!("ignoring unknown CHORUS_BACKEND {:?}", other),
            }
        }
        if let Ok(url) = std::env::var("OLLAMA_URL") {
            self.provider.ollama_url = Some(url);
        }
        if let Ok(model) = std::env::var("OLLAMA_MODEL") {
            self.provider.ollama_model = Some(model);
        }
        if let Ok(key) = std::env::var("HUB_API_KEY") {
            self.provider.hub_api_key = Some(key);
        }
    }
}
