pub mod builtin;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{ChorusError, Result};
use crate::types::{Agent, AgentId};

pub use builtin::builtin_agents;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegistryDocument {
    agents: Vec<Agent>,
}

/// Read-only catalog of agent personas, loaded once at startup.
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    agents: Vec<Agent>,
    index: HashMap<AgentId, usize>,
}

impl AgentRegistry {
    /// Build a registry, rejecting the whole catalog if any entry is invalid.
    pub fn from_agents(agents: Vec<Agent>) -> Result<Self> {
        if agents.is_empty() {
            return Err(ChorusError::Config("agent registry is empty".to_string()));
        }

        let mut index = HashMap::with_capacity(agents.len());
        for (i, agent) in agents.iter().enumerate() {
            if agent.id.as_str().trim().is_empty() {
                return Err(ChorusError::Config(format!(
                    "agent at position {} has an empty id",
                    i
                )));
            }
            if index.insert(agent.id.clone(), i).is_some() {
                return Err(ChorusError::Config(format!(
                    "duplicate agent id: {}",
                    agent.id
                )));
            }
        }

        Ok(Self { agents, index })
    }

    pub fn builtin() -> Result<Self> {
        Self::from_agents(builtin_agents())
    }

    pub fn from_yaml_str(source: &str) -> Result<Self> {
        let doc: RegistryDocument = serde_yaml::from_str(source)
            .map_err(|e| ChorusError::Config(format!("malformed registry: {}", e)))?;
        Self::from_agents(doc.agents)
    }

    pub fn from_json_str(source: &str) -> Result<Self> {
        let doc: RegistryDocument = serde_json::from_str(source)
            .map_err(|e| ChorusError::Config(format!("malformed registry: {}", e)))?;
        Self::from_agents(doc.agents)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            ChorusError::Config(format!("cannot read registry {}: {}", path.display(), e))
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&source),
            Some("yaml") | Some("yml") => Self::from_yaml_str(&source),
            other => Err(ChorusError::Config(format!(
                "unsupported registry format: {:?}",
                other
            ))),
        }
    }

    pub fn lookup(&self, id: &AgentId) -> Result<&Agent> {
        self.index
            .get(id)
            .map(|&i| &self.agents[i])
            .ok_or_else(|| ChorusError::unknown_agent(id.as_str()))
    }

    pub fn contains(&self, id: &AgentId) -> bool {
        self.index.contains_key(id)
    }

    /// Agents in catalog order.
    pub fn all(&self) -> &[Agent] {
        &self.agents
    }

    pub fn ids(&self) -> Vec<AgentId> {
        self.agents.iter().map(|a| a.id.clone()).collect()
    }

    pub fn match_by_tag(&self, tag: &str) -> Vec<&Agent> {
        self.agents.iter().filter(|a| a.has_tag(tag)).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

/// Explicit `AgentId -> T` binding built once from the registry.
///
/// Every registry agent is bound at construction and rebinding an unknown id
/// is rejected, so lookups only fail for agents outside the registry.
#[derive(Debug, Clone)]
pub struct CapabilityTable<T> {
    entries: HashMap<AgentId, T>,
}

impl<T> CapabilityTable<T> {
    /// Bind every registry agent using `make`.
    pub fn for_all<F>(registry: &AgentRegistry, mut make: F) -> Self
    where
        F: FnMut(&Agent) -> T,
    {
        let entries = registry
            .all()
            .iter()
            .map(|a| (a.id.clone(), make(a)))
            .collect();
        Self { entries }
    }

    pub fn get(&self, id: &AgentId) -> Result<&T> {
        self.entries
            .get(id)
            .ok_or_else(|| ChorusError::unknown_agent(id.as_str()))
    }

    /// Rebind an agent that is already in the table.
    pub fn replace(&mut self, id: &AgentId, value: T) -> Result<()> {
        match self.entries.get_mut(id) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(ChorusError::unknown_agent(id.as_str())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const REGISTRY_YAML: &str = r#"
agents:
  - id: lumina
    display_name: Lumina
    capability_tags: [emotion, empathy]
    color_hint: magenta
    trigger_phrases: [feel, emotional]
  - id: nova
    display_name: Nova
    capability_tags: [code, systems]
    trigger_phrases: [code, technical]
"#;

    #[test]
    fn test_load_yaml() {
        let registry = AgentRegistry::from_yaml_str(REGISTRY_YAML).unwrap();
        assert_eq!(registry.len(), 2);
        let lumina = registry.lookup(&AgentId::from("lumina")).unwrap();
        assert_eq!(lumina.display_name, "Lumina");
        assert_eq!(lumina.color_hint, "magenta");
    }

    #[test]
    fn test_lookup_is_idempotent() {
        let registry = AgentRegistry::from_yaml_str(REGISTRY_YAML).unwrap();
        let id = AgentId::from("nova");
        let first = registry.lookup(&id).unwrap().clone();
        let second = registry.lookup(&id).unwrap().clone();
        assert_eq!(first, second);
    }

    #[test]
    fn test_lookup_unknown() {
        let registry = AgentRegistry::from_yaml_str(REGISTRY_YAML).unwrap();
        let err = registry.lookup(&AgentId::from("ghost")).unwrap_err();
        assert!(matches!(err, ChorusError::UnknownAgent { .. }));
    }

    #[test]
    fn test_match_by_tag() {
        let registry = AgentRegistry::from_yaml_str(REGISTRY_YAML).unwrap();
        let coders = registry.match_by_tag("code");
        assert_eq!(coders.len(), 1);
        assert_eq!(coders[0].id, AgentId::from("nova"));
        assert!(registry.match_by_tag("billing").is_empty());
    }

    #[test]
    fn test_malformed_source_fails_fast() {
        let err = AgentRegistry::from_yaml_str("agents: [this is: not, valid").unwrap_err();
        assert!(matches!(err, ChorusError::Config(_)));

        let err = AgentRegistry::from_json_str(r#"{"agents": []}"#).unwrap_err();
        assert!(matches!(err, ChorusError::Config(_)));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let agents = vec![Agent::new("echo", "Echo"), Agent::new("echo", "Echo Two")];
        let err = AgentRegistry::from_agents(agents).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_from_path_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"agents": [{{"id": "echo", "display_name": "Echo"}}]}}"#
        )
        .unwrap();

        let registry = AgentRegistry::from_path(file.path()).unwrap();
        assert!(registry.contains(&AgentId::from("echo")));

        let txt = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        assert!(AgentRegistry::from_path(txt.path()).is_err());
    }

    #[test]
    fn test_capability_table_binds_every_agent() {
        let registry = AgentRegistry::from_yaml_str(REGISTRY_YAML).unwrap();
        let mut table = CapabilityTable::for_all(&registry, |agent| agent.display_name.len());
        assert_eq!(*table.get(&AgentId::from("nova")).unwrap(), 4);

        table.replace(&AgentId::from("nova"), 9).unwrap();
        assert_eq!(*table.get(&AgentId::from("nova")).unwrap(), 9);

        assert!(table.replace(&AgentId::from("ghost"), 0).is_err());
        assert!(table.get(&AgentId::from("ghost")).is_err());
    }
}
