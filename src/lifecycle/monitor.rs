use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use super::health::HealthRecord;
use super::state_machine::{AgentStateMachine, LifecycleEvent};
use crate::config::HealthConfig;
use crate::emotion::EmotionStore;
use crate::error::{ChorusError, Result};
use crate::registry::AgentRegistry;
use crate::storage::BackupStore;
use crate::types::{AgentId, AgentStatus};

pub const REASON_ERROR_RATIO: &str = "error_ratio_exceeded";
pub const REASON_LATENCY: &str = "latency_exceeded";
pub const REASON_HEALTHY: &str = "healthy";

type Slot = Arc<Mutex<HealthRecord>>;

/// Result of one health pass over a single agent.
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    pub agent_id: AgentId,
    pub reason: &'static str,
    /// `Some` when a resurrection was attempted.
    pub resurrected: Option<bool>,
    pub status: AgentStatus,
}

/// Tracks per-agent health and restores misbehaving agents from backup.
pub struct HealthMonitor {
    records: RwLock<HashMap<AgentId, Slot>>,
    emotions: Arc<EmotionStore>,
    backups: Arc<dyn BackupStore>,
    /// When each agent was last snapshotted by this monitor.
    snapshotted: Mutex<HashMap<AgentId, Instant>>,
    config: HealthConfig,
}

impl HealthMonitor {
    pub fn new(
        registry: &AgentRegistry,
        emotions: Arc<EmotionStore>,
        backups: Arc<dyn BackupStore>,
        config: HealthConfig,
    ) -> Self {
        let records = registry
            .ids()
            .into_iter()
            .map(|id| {
                let record = HealthRecord::new(id.clone());
                (id, Arc::new(Mutex::new(record)))
            })
            .collect();
        Self {
            records: RwLock::new(records),
            emotions,
            backups,
            snapshotted: Mutex::new(HashMap::new()),
            config,
        }
    }

    fn sorted_ids(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = {
            let records = self.records.read().unwrap_or_else(|e| e.into_inner());
            records.keys().cloned().collect()
        };
        ids.sort();
        ids
    }

    fn slot(&self, agent_id: &AgentId) -> Result<Slot> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records
            .get(agent_id)
            .cloned()
            .ok_or_else(|| ChorusError::unknown_agent(agent_id.as_str()))
    }

    pub fn record_response(&self, agent_id: &AgentId, latency_ms: f64, is_error: bool) -> Result<()> {
        let slot = self.slot(agent_id)?;
        slot.lock()
            .unwrap_or_else(|e| e.into_inner())
            .record(latency_ms, is_error);
        Ok(())
    }

    pub fn check_health(&self, agent_id: &AgentId) -> Result<HealthRecord> {
        let slot = self.slot(agent_id)?;
        let mut record = slot.lock().unwrap_or_else(|e| e.into_inner());
        record.last_checked_at = Utc::now();
        Ok(record.clone())
    }

    pub fn status(&self, agent_id: &AgentId) -> Result<AgentStatus> {
        let slot = self.slot(agent_id)?;
        let status = slot.lock().unwrap_or_else(|e| e.into_inner()).status;
        Ok(status)
    }

    pub fn needs_resurrection(&self, agent_id: &AgentId) -> Result<(bool, &'static str)> {
        let slot = self.slot(agent_id)?;
        let record = slot.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.judge(&record))
    }

    fn judge(&self, record: &HealthRecord) -> (bool, &'static str) {
        let judged = record.response_count > 0 && record.response_count >= self.config.min_responses;
        if judged && record.error_ratio() > self.config.max_error_ratio {
            return (true, REASON_ERROR_RATIO);
        }
        if record.avg_latency_ms > self.config.max_latency_ms {
            return (true, REASON_LATENCY);
        }
        (false, REASON_HEALTHY)
    }

    fn transition(&self, slot: &Slot, event: LifecycleEvent) -> Result<AgentStatus> {
        let mut record = slot.lock().unwrap_or_else(|e| e.into_inner());
        AgentStateMachine::transition(&mut record, event)
    }

    /// Restore the agent from its latest snapshot.
    ///
    /// On success its emotions go back to neutral, its counters are zeroed
    /// and it is Healthy again. Any failure leaves it Degraded.
    pub async fn resurrect(&self, agent_id: &AgentId) -> bool {
        let slot = match self.slot(agent_id) {
            Ok(slot) => slot,
            Err(e) => {
                log::error!("resurrect: {}", e);
                return false;
            }
        };
        if let Err(e) = self.transition(&slot, LifecycleEvent::RestoreStarted) {
            log::warn!("resurrect {}: {}", agent_id, e);
            return false;
        }
        log::info!("resurrecting agent {}", agent_id);

        match self.restore_latest(agent_id).await {
            Ok(()) => {
                self.emotions.reset(agent_id);
                {
                    let mut record = slot.lock().unwrap_or_else(|e| e.into_inner());
                    record.reset_counters();
                    record.last_checked_at = Utc::now();
                }
                let _ = self.transition(&slot, LifecycleEvent::RestoreSucceeded);
                log::info!("agent {} resurrected", agent_id);
                true
            }
            Err(e) => {
                log::error!("{}", e);
                let _ = self.transition(&slot, LifecycleEvent::RestoreFailed);
                false
            }
        }
    }

    async fn restore_latest(&self, agent_id: &AgentId) -> Result<()> {
        let snapshot = self
            .backups
            .latest(agent_id)
            .await?
            .ok_or_else(|| ChorusError::restore(agent_id, "no backup snapshot"))?;
        if self.backups.restore(agent_id, &snapshot).await? {
            Ok(())
        } else {
            Err(ChorusError::restore(
                agent_id,
                format!("backup store rejected snapshot {}", snapshot),
            ))
        }
    }

    async fn take_snapshot(&self, agent_id: &AgentId) -> bool {
        match self.backups.backup(agent_id).await {
            Ok(snapshot) => {
                log::debug!("snapshot {} taken for {}", snapshot, agent_id);
                self.snapshotted
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(agent_id.clone(), Instant::now());
                true
            }
            Err(e) => {
                log::warn!("snapshot {}: {}", agent_id, e);
                false
            }
        }
    }

    /// Give every agent without any snapshot a baseline to resurrect from.
    /// Returns the number of snapshots taken.
    pub async fn ensure_snapshots(&self) -> usize {
        let mut taken = 0;
        for agent_id in self.sorted_ids() {
            match self.backups.latest(&agent_id).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    if self.take_snapshot(&agent_id).await {
                        taken += 1;
                    }
                }
                Err(e) => log::warn!("snapshot lookup {}: {}", agent_id, e),
            }
        }
        taken
    }

    fn snapshot_due(&self, agent_id: &AgentId) -> bool {
        let interval = Duration::from_secs(self.config.snapshot_interval_secs);
        self.snapshotted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(agent_id)
            .map(|at| at.elapsed() >= interval)
            .unwrap_or(true)
    }

    /// One pass over every agent: judge it, mark breaches, resurrect.
    /// Healthy agents get a fresh snapshot once the previous one is old enough.
    pub async fn run_check(&self) -> Vec<CheckOutcome> {
        let ids = self.sorted_ids();

        let mut outcomes = Vec::with_capacity(ids.len());
        for agent_id in ids {
            let Ok(slot) = self.slot(&agent_id) else { continue };
            let (needs, reason) = {
                let mut record = slot.lock().unwrap_or_else(|e| e.into_inner());
                record.last_checked_at = Utc::now();
                self.judge(&record)
            };

            let mut resurrected = None;
            if needs {
                log::warn!("agent {} unhealthy: {}", agent_id, reason);
                if let Err(e) = self.transition(&slot, LifecycleEvent::ThresholdBreached) {
                    log::warn!("health check {}: {}", agent_id, e);
                } else {
                    resurrected = Some(self.resurrect(&agent_id).await);
                }
            }

            let status = slot.lock().unwrap_or_else(|e| e.into_inner()).status;
            if !needs && status == AgentStatus::Healthy && self.snapshot_due(&agent_id) {
                self.take_snapshot(&agent_id).await;
            }
            outcomes.push(CheckOutcome {
                agent_id,
                reason,
                resurrected,
                status,
            });
        }
        outcomes
    }

    pub fn snapshot(&self) -> BTreeMap<AgentId, HealthRecord> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records
            .iter()
            .map(|(id, slot)| (id.clone(), slot.lock().unwrap_or_else(|e| e.into_inner()).clone()))
            .collect()
    }

    /// Load persisted records. Agents no longer in the catalog are dropped,
    /// and an interrupted resurrection comes back as Degraded.
    pub fn restore_snapshot(&self, snapshot: BTreeMap<AgentId, HealthRecord>) {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        for (id, mut record) in snapshot {
            let Some(slot) = records.get(&id) else {
                log::warn!("dropping health record for unknown agent {}", id);
                continue;
            };
            if record.status == AgentStatus::Resurrecting {
                record.status = AgentStatus::Degraded;
            }
            record.agent_id = id;
            *slot.lock().unwrap_or_else(|e| e.into_inner()) = record;
        }
    }
}
