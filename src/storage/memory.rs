use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use super::traits::BackupStore;
use crate::error::{ChorusError, Result};
use crate::types::{AgentId, SnapshotId};

/// Snapshot bookkeeping without any real files behind it.
#[derive(Debug, Default)]
pub struct InMemoryBackupStore {
    snapshots: RwLock<HashMap<AgentId, Vec<SnapshotId>>>,
    fail_restores: AtomicBool,
    restores: AtomicUsize,
}

impl InMemoryBackupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent restore report failure.
    pub fn set_failing(&self, failing: bool) {
        self.fail_restores.store(failing, Ordering::SeqCst);
    }

    pub fn restore_count(&self) -> usize {
        self.restores.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackupStore for InMemoryBackupStore {
    async fn backup(&self, agent_id: &AgentId) -> Result<SnapshotId> {
        let mut snapshots = self.snapshots.write().unwrap_or_else(|e| e.into_inner());
        let list = snapshots.entry(agent_id.clone()).or_default();
        let snapshot = format!("{}-{:04}", agent_id, list.len() + 1);
        list.push(snapshot.clone());
        Ok(snapshot)
    }

    async fn restore(&self, agent_id: &AgentId, snapshot: &SnapshotId) -> Result<bool> {
        self.restores.fetch_add(1, Ordering::SeqCst);
        let snapshots = self.snapshots.read().unwrap_or_else(|e| e.into_inner());
        let known = snapshots
            .get(agent_id)
            .map(|list| list.contains(snapshot))
            .unwrap_or(false);
        if !known {
            return Err(ChorusError::restore(agent_id, format!("unknown snapshot {}", snapshot)));
        }
        Ok(!self.fail_restores.load(Ordering::SeqCst))
    }

    async fn latest(&self, agent_id: &AgentId) -> Result<Option<SnapshotId>> {
        let snapshots = self.snapshots.read().unwrap_or_else(|e| e.into_inner());
        Ok(snapshots.get(agent_id).and_then(|list| list.last().cloned()))
    }
}
