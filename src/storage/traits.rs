use async_trait::async_trait;

use crate::error::Result;
use crate::types::{AgentId, SnapshotId};

/// Snapshots of an agent's backing configuration and state.
#[async_trait]
pub trait BackupStore: Send + Sync {
    async fn backup(&self, agent_id: &AgentId) -> Result<SnapshotId>;

    /// Returns false when the snapshot exists but could not be applied.
    async fn restore(&self, agent_id: &AgentId, snapshot: &SnapshotId) -> Result<bool>;

    async fn latest(&self, agent_id: &AgentId) -> Result<Option<SnapshotId>>;
}
