use async_trait::async_trait;
use chrono::Utc;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::traits::BackupStore;
use crate::error::{ChorusError, Result};
use crate::types::{AgentId, SnapshotId};

/// Copies `<agents_dir>/<agent>/` into `<backup_dir>/<agent>/<snapshot>/`.
///
/// Snapshot ids sort lexically in creation order.
#[derive(Debug, Clone)]
pub struct FileBackupStore {
    agents_dir: PathBuf,
    backup_dir: PathBuf,
}

fn copy_dir(from: &Path, to: &Path) -> io::Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

impl FileBackupStore {
    pub fn new(agents_dir: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            agents_dir: agents_dir.into(),
            backup_dir: backup_dir.into(),
        }
    }

    pub fn agent_dir(&self, agent_id: &AgentId) -> PathBuf {
        self.agents_dir.join(agent_id.as_str())
    }

    fn snapshot_root(&self, agent_id: &AgentId) -> PathBuf {
        self.backup_dir.join(agent_id.as_str())
    }

    fn snapshot_dir(&self, agent_id: &AgentId, snapshot: &SnapshotId) -> PathBuf {
        self.snapshot_root(agent_id).join(snapshot)
    }

    async fn blocking<T, F>(agent_id: &AgentId, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> io::Result<T> + Send + 'static,
    {
        tokio::task::spawn_blocking(f)
            .await
            .map_err(|e| ChorusError::restore(agent_id, e))?
            .map_err(ChorusError::from)
    }
}

#[async_trait]
impl BackupStore for FileBackupStore {
    async fn backup(&self, agent_id: &AgentId) -> Result<SnapshotId> {
        let source = self.agent_dir(agent_id);
        let snapshot = format!(
            "{}-{}",
            Utc::now().format("%Y%m%dT%H%M%S%.6fZ"),
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        );
        let target = self.snapshot_dir(agent_id, &snapshot);

        Self::blocking(agent_id, move || {
            if source.is_dir() {
                copy_dir(&source, &target)
            } else {
                fs::create_dir_all(&target)
            }
        })
        .await?;

        log::info!("backed up {} as snapshot {}", agent_id, snapshot);
        Ok(snapshot)
    }

    async fn restore(&self, agent_id: &AgentId, snapshot: &SnapshotId) -> Result<bool> {
        let source = self.snapshot_dir(agent_id, snapshot);
        if !source.is_dir() {
            return Err(ChorusError::restore(agent_id, format!("snapshot {} not found", snapshot)));
        }
        let target = self.agent_dir(agent_id);

        Self::blocking(agent_id, move || {
            if target.exists() {
                fs::remove_dir_all(&target)?;
            }
            copy_dir(&source, &target)
        })
        .await?;

        log::info!("restored {} from snapshot {}", agent_id, snapshot);
        Ok(true)
    }

    async fn latest(&self, agent_id: &AgentId) -> Result<Option<SnapshotId>> {
        let root = self.snapshot_root(agent_id);
        Self::blocking(agent_id, move || {
            if !root.is_dir() {
                return Ok(None);
            }
            let mut names = Vec::new();
            for entry in fs::read_dir(&root)? {
                let entry = entry?;
                if entry.file_type()?.is_dir() {
                    names.push(entry.file_name().to_string_lossy().into_owned());
                }
            }
            Ok(names.into_iter().max())
        })
        .await
    }
}
