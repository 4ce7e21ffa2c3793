use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{AgentId, MessageId};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Participant {
    Agent(AgentId),
    User,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recipient {
    Agent(AgentId),
    User,
    System,
    All,
}

impl Participant {
    pub fn agent(id: impl Into<AgentId>) -> Self {
        Participant::Agent(id.into())
    }

    /// Whether a message addressed to `recipient` is addressed to this participant.
    pub fn is_addressed_by(&self, recipient: &Recipient) -> bool {
        match (self, recipient) {
            (Participant::Agent(a), Recipient::Agent(b)) => a == b,
            (Participant::User, Recipient::User) => true,
            (Participant::System, Recipient::System) => true,
            _ => false,
        }
    }
}

impl Recipient {
    pub fn agent(id: impl Into<AgentId>) -> Self {
        Recipient::Agent(id.into())
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Participant::Agent(id) => write!(f, "{}", id),
            Participant::User => write!(f, "user"),
            Participant::System => write!(f, "system"),
        }
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recipient::Agent(id) => write!(f, "{}", id),
            Recipient::User => write!(f, "user"),
            Recipient::System => write!(f, "system"),
            Recipient::All => write!(f, "all"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender: Participant,
    pub receiver: Recipient,
    pub intent: String,
    pub payload: String,
    pub priority: i32,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(
        sender: Participant,
        receiver: Recipient,
        intent: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            id: MessageId::new_v4(),
            sender,
            receiver,
            intent: intent.into(),
            payload: payload.into(),
            priority: 0,
            timestamp: Utc::now(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// True when this message travelled between `a` and `b`, in either direction.
    pub fn is_between(&self, a: &Participant, b: &Participant) -> bool {
        (&self.sender == a && b.is_addressed_by(&self.receiver))
            || (&self.sender == b && a.is_addressed_by(&self.receiver))
    }
}
