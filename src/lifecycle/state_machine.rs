use serde::{Deserialize, Serialize};

use crate::error::{ChorusError, Result};
use crate::lifecycle::HealthRecord;
use crate::types::AgentStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    ThresholdBreached,
    RestoreStarted,
    RestoreSucceeded,
    RestoreFailed,
}

pub struct AgentStateMachine;

impl AgentStateMachine {
    pub fn transition(record: &mut HealthRecord, event: LifecycleEvent) -> Result<AgentStatus> {
        let new_status = match (record.status, event) {
            (AgentStatus::Healthy | AgentStatus::Degraded, LifecycleEvent::ThresholdBreached) => {
                AgentStatus::Degraded
            }

            // Healthy agents may be resurrected on demand
            (AgentStatus::Healthy | AgentStatus::Degraded, LifecycleEvent::RestoreStarted) => {
                AgentStatus::Resurrecting
            }
            (AgentStatus::Resurrecting, LifecycleEvent::RestoreSucceeded) => AgentStatus::Healthy,
            (AgentStatus::Resurrecting, LifecycleEvent::RestoreFailed) => AgentStatus::Degraded,

            (status, event) => {
                return Err(ChorusError::InvalidTransition(format!(
                    "{} cannot handle {:?} for agent {}",
                    status.as_str(),
                    event,
                    record.agent_id
                )));
            }
        };

        record.status = new_status;
        Ok(new_status)
    }
}
