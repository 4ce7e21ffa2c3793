use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AgentId, AgentStatus};

/// Current health snapshot of one agent. Only the latest values are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub agent_id: AgentId,
    pub response_count: u64,
    pub error_count: u64,
    pub avg_latency_ms: f64,
    pub last_checked_at: DateTime<Utc>,
    pub status: AgentStatus,
}

impl HealthRecord {
    pub fn new(agent_id: AgentId) -> Self {
        Self {
            agent_id,
            response_count: 0,
            error_count: 0,
            avg_latency_ms: 0.0,
            last_checked_at: Utc::now(),
            status: AgentStatus::Healthy,
        }
    }

    /// Fold one response into the counters and the running mean latency.
    pub fn record(&mut self, latency_ms: f64, is_error: bool) {
        self.response_count += 1;
        if is_error {
            self.error_count += 1;
        }
        let latency = if latency_ms.is_finite() { latency_ms.max(0.0) } else { 0.0 };
        self.avg_latency_ms += (latency - self.avg_latency_ms) / self.response_count as f64;
    }

    pub fn error_ratio(&self) -> f64 {
        if self.response_count == 0 {
            return 0.0;
        }
        self.error_count as f64 / self.response_count as f64
    }

    /// Zero the counters. Status is left to the state machine.
    pub fn reset_counters(&mut self) {
        self.response_count = 0;
        self.error_count = 0;
        self.avg_latency_ms = 0.0;
    }
}
