use thiserror::Error;

use crate::types::AgentId;

pub type Result<T> = std::result::Result<T, ChorusError>;

#[derive(Debug, Error)]
pub enum ChorusError {
    /// Malformed registry or configuration source. Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown agent: {agent_id}")]
    UnknownAgent { agent_id: String },

    /// Transient failure from a completion backend.
    #[error("Completion failed for {agent_id}: {reason}")]
    Completion { agent_id: AgentId, reason: String },

    #[error("Restore failed for {agent_id}: {reason}")]
    Restore { agent_id: AgentId, reason: String },

    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("Invalid fusion request: {0}")]
    InvalidFusion(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ChorusError {
    pub fn unknown_agent(agent_id: impl Into<String>) -> Self {
        ChorusError::UnknownAgent {
            agent_id: agent_id.into(),
        }
    }

    pub fn completion(agent_id: &AgentId, reason: impl ToString) -> Self {
        ChorusError::Completion {
            agent_id: agent_id.clone(),
            reason: reason.to_string(),
        }
    }

    pub fn restore(agent_id: &AgentId, reason: impl ToString) -> Self {
        ChorusError::Restore {
            agent_id: agent_id.clone(),
            reason: reason.to_string(),
        }
    }
}
