use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::AgentId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub display_name: String,
    #[serde(default)]
    pub capability_tags: BTreeSet<String>,
    #[serde(default = "default_color")]
    pub color_hint: String,

    // Phrases the intent router matches against
    #[serde(default)]
    pub trigger_phrases: Vec<String>,
    // System prompt handed to the completion backend
    #[serde(default)]
    pub persona: String,
}

fn default_color() -> String {
    "white".to_string()
}

impl Agent {
    pub fn new(id: impl Into<AgentId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            capability_tags: BTreeSet::new(),
            color_hint: default_color(),
            trigger_phrases: Vec::new(),
            persona: String::new(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capability_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_triggers<I, S>(mut self, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trigger_phrases = phrases.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color_hint = color.into();
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.capability_tags
            .iter()
            .any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// System prompt for this agent, falling back to a generic persona.
    pub fn system_prompt(&self) -> String {
        if self.persona.trim().is_empty() {
            format!("You are {}, a helpful assistant.", self.display_name)
        } else {
            self.persona.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_builder() {
        let agent = Agent::new("lumina", "Lumina")
            .with_tags(["emotion", "empathy"])
            .with_triggers(["feel", "emotional support"])
            .with_color("magenta");

        assert_eq!(agent.id, AgentId::from("lumina"));
        assert!(agent.has_tag("Emotion"));
        assert!(!agent.has_tag("code"));
        assert_eq!(agent.trigger_phrases.len(), 2);
        assert_eq!(agent.color_hint, "magenta");
    }

    #[test]
    fn test_system_prompt_fallback() {
        let agent = Agent::new("nova", "Nova");
        assert!(agent.system_prompt().contains("Nova"));

        let agent = agent.with_persona("You are Nova, a systems engineer.");
        assert_eq!(agent.system_prompt(), "You are Nova, a systems engineer.");
    }

    #[test]
    fn test_agent_deserialize_defaults() {
        let agent: Agent =
            serde_yaml::from_str("id: echo\ndisplay_name: Echo\n").unwrap();
        assert_eq!(agent.color_hint, "white");
        assert!(agent.capability_tags.is_empty());
        assert!(agent.trigger_phrases.is_empty());
    }
}
