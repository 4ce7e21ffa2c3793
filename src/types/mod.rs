pub mod agent;
pub mod fusion;
pub mod message;

pub use agent::Agent;
pub use fusion::FusionRequest;
pub use message::{Message, Participant, Recipient};

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type FusionId = Uuid;
pub type MessageId = Uuid;
pub type SnapshotId = String;

/// Registry identifier of an agent persona, e.g. `lumina`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AgentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Operational status of an agent as seen by the health monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentStatus {
    Healthy,
    Degraded,     // Thresholds breached, awaiting resurrection
    Resurrecting, // Restore in progress
}

impl AgentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            AgentStatus::Healthy => "Healthy",
            AgentStatus::Degraded => "Degraded",
            AgentStatus::Resurrecting => "Resurrecting",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionStatus {
    Pending,
    Partial,
    Complete,
    Timeout,
}

impl FusionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            FusionStatus::Pending => "pending",
            FusionStatus::Partial => "partial",
            FusionStatus::Complete => "complete",
            FusionStatus::Timeout => "timeout",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FusionStatus::Complete | FusionStatus::Timeout)
    }

    fn rank(&self) -> u8 {
        match self {
            FusionStatus::Pending => 0,
            FusionStatus::Partial => 1,
            FusionStatus::Complete | FusionStatus::Timeout => 2,
        }
    }

    /// Status only ever moves forward.
    pub fn can_advance_to(&self, next: FusionStatus) -> bool {
        next.rank() > self.rank()
    }
}
