use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{AgentId, FusionId, FusionStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionRequest {
    pub id: FusionId,
    pub requester: String,
    pub agent_ids: Vec<AgentId>,
    pub query: String,
    pub status: FusionStatus,
    pub responses: BTreeMap<AgentId, String>,
    /// Agents that failed or never answered. Filled in once terminal.
    #[serde(default)]
    pub missing: Vec<AgentId>,
    #[serde(default)]
    pub synthesis: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default)]
    failed: Vec<AgentId>,
}

impl FusionRequest {
    /// `agent_ids` must already be de-duplicated and hold at least two agents.
    pub fn new(requester: impl Into<String>, agent_ids: Vec<AgentId>, query: impl Into<String>) -> Self {
        Self {
            id: FusionId::new_v4(),
            requester: requester.into(),
            agent_ids,
            query: query.into(),
            status: FusionStatus::Pending,
            responses: BTreeMap::new(),
            missing: Vec::new(),
            synthesis: None,
            created_at: Utc::now(),
            completed_at: None,
            failed: Vec::new(),
        }
    }

    fn has_arrived(&self, agent_id: &AgentId) -> bool {
        self.responses.contains_key(agent_id) || self.failed.contains(agent_id)
    }

    /// Record one agent's outcome. `None` (or an empty string) is a failed
    /// completion. Returns false when the outcome is discarded: the request is
    /// already terminal, the agent is not part of it, or it already answered.
    pub fn record(&mut self, agent_id: &AgentId, response: Option<String>) -> bool {
        if self.status.is_terminal()
            || !self.agent_ids.contains(agent_id)
            || self.has_arrived(agent_id)
        {
            return false;
        }

        match response.filter(|r| !r.trim().is_empty()) {
            Some(text) => {
                self.responses.insert(agent_id.clone(), text);
                if self.status.can_advance_to(FusionStatus::Partial) {
                    self.status = FusionStatus::Partial;
                }
            }
            None => self.failed.push(agent_id.clone()),
        }
        true
    }

    pub fn all_arrived(&self) -> bool {
        self.agent_ids.iter().all(|id| self.has_arrived(id))
    }

    /// Agents with neither a response nor a recorded failure, in request order.
    pub fn pending(&self) -> Vec<AgentId> {
        self.agent_ids
            .iter()
            .filter(|id| !self.has_arrived(id))
            .cloned()
            .collect()
    }

    /// Responding agents in request order.
    pub fn contributors(&self) -> Vec<AgentId> {
        self.agent_ids
            .iter()
            .filter(|id| self.responses.contains_key(*id))
            .cloned()
            .collect()
    }

    /// Move to a terminal status. Returns false if the transition is not forward.
    pub fn finish(&mut self, status: FusionStatus, synthesis: String) -> bool {
        if !status.is_terminal() || !self.status.can_advance_to(status) {
            return false;
        }

        self.missing = self
            .agent_ids
            .iter()
            .filter(|id| !self.responses.contains_key(*id))
            .cloned()
            .collect();
        self.status = status;
        self.synthesis = Some(synthesis);
        self.completed_at = Some(Utc::now());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> FusionRequest {
        FusionRequest::new(
            "user",
            vec![AgentId::from("a"), AgentId::from("b")],
            "compare",
        )
    }

    #[test]
    fn test_record_advances_to_partial() {
        let mut req = request();
        assert_eq!(req.status, FusionStatus::Pending);

        assert!(req.record(&AgentId::from("a"), Some("answer".to_string())));
        assert_eq!(req.status, FusionStatus::Partial);
        assert!(!req.all_arrived());

        assert!(req.record(&AgentId::from("b"), None));
        assert!(req.all_arrived());
        assert_eq!(req.contributors(), vec![AgentId::from("a")]);
    }

    #[test]
    fn test_duplicate_and_foreign_responses_are_discarded() {
        let mut req = request();
        assert!(req.record(&AgentId::from("a"), Some("first".to_string())));
        assert!(!req.record(&AgentId::from("a"), Some("second".to_string())));
        assert!(!req.record(&AgentId::from("c"), Some("stranger".to_string())));
        assert_eq!(req.responses[&AgentId::from("a")], "first");
    }

    #[test]
    fn test_late_response_after_finish_is_discarded() {
        let mut req = request();
        req.record(&AgentId::from("a"), Some("on time".to_string()));
        assert!(req.finish(FusionStatus::Timeout, "partial".to_string()));

        assert!(!req.record(&AgentId::from("b"), Some("late".to_string())));
        assert_eq!(req.missing, vec![AgentId::from("b")]);
        assert!(!req.finish(FusionStatus::Complete, "again".to_string()));
        assert_eq!(req.status, FusionStatus::Timeout);
    }

    #[test]
    fn test_pending_excludes_failed_agents() {
        let mut req = FusionRequest::new(
            "user",
            vec![AgentId::from("a"), AgentId::from("b"), AgentId::from("c")],
            "compare",
        );
        req.record(&AgentId::from("a"), Some("answer".to_string()));
        req.record(&AgentId::from("b"), None);
        assert_eq!(req.pending(), vec![AgentId::from("c")]);

        req.finish(FusionStatus::Timeout, "partial".to_string());
        assert_eq!(req.missing, vec![AgentId::from("b"), AgentId::from("c")]);
    }

    #[test]
    fn test_empty_response_counts_as_failure() {
        let mut req = request();
        req.record(&AgentId::from("a"), Some("   ".to_string()));
        assert_eq!(req.status, FusionStatus::Pending);
        assert!(req.responses.is_empty());
    }
}
