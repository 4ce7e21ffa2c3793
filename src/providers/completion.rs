use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ChorusError, Result};
use crate::providers::llm::{ChatMessage, LLMProvider};
use crate::registry::{AgentRegistry, CapabilityTable};
use crate::types::AgentId;

/// Opaque text completion on behalf of one agent.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str, agent_id: &AgentId) -> Result<String>;
}

#[derive(Clone)]
struct Binding {
    system_prompt: String,
    backend: Arc<dyn LLMProvider>,
}

/// Completion through an LLM backend, prefixed with the agent's persona.
pub struct PersonaCompletion {
    bindings: CapabilityTable<Binding>,
}

impl PersonaCompletion {
    /// Bind every registered agent to `backend`.
    pub fn new(registry: &AgentRegistry, backend: Arc<dyn LLMProvider>) -> Self {
        let bindings = CapabilityTable::for_all(registry, |agent| Binding {
            system_prompt: agent.system_prompt(),
            backend: backend.clone(),
        });
        Self { bindings }
    }

    /// Route one agent to a different backend, e.g. the hosted hub.
    pub fn with_backend(mut self, agent_id: &AgentId, backend: Arc<dyn LLMProvider>) -> Result<Self> {
        let system_prompt = self.bindings.get(agent_id)?.system_prompt.clone();
        self.bindings.replace(
            agent_id,
            Binding {
                system_prompt,
                backend,
            },
        )?;
        Ok(self)
    }
}

#[async_trait]
impl CompletionProvider for PersonaCompletion {
    async fn complete(&self, prompt: &str, agent_id: &AgentId) -> Result<String> {
        let binding = self.bindings.get(agent_id)?;
        let messages = vec![
            ChatMessage::system(binding.system_prompt.clone()),
            ChatMessage::user(prompt),
        ];

        binding
            .backend
            .complete(messages)
            .await
            .map_err(|e| ChorusError::completion(agent_id, e))
    }
}

/// Offline backend that answers with a canned acknowledgement.
#[derive(Debug, Default)]
pub struct EchoCompletion;

#[async_trait]
impl CompletionProvider for EchoCompletion {
    async fn complete(&self, prompt: &str, agent_id: &AgentId) -> Result<String> {
        Ok(format!("{} heard: {}", agent_id, prompt.trim()))
    }
}

#[derive(Debug, Clone)]
enum Behavior {
    Reply(String),
    Fail(String),
    Delayed(Duration, String),
}

/// Scripted per-agent behaviour for tests.
#[derive(Debug)]
pub struct MockCompletion {
    behaviors: HashMap<AgentId, Behavior>,
    default_reply: String,
    calls: AtomicUsize,
}

impl MockCompletion {
    pub fn new() -> Self {
        Self {
            behaviors: HashMap::new(),
            default_reply: "Mock response".to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn reply(mut self, agent_id: &str, text: &str) -> Self {
        self.behaviors
            .insert(AgentId::from(agent_id), Behavior::Reply(text.to_string()));
        self
    }

    pub fn fail(mut self, agent_id: &str, reason: &str) -> Self {
        self.behaviors
            .insert(AgentId::from(agent_id), Behavior::Fail(reason.to_string()));
        self
    }

    pub fn delayed(mut self, agent_id: &str, delay: Duration, text: &str) -> Self {
        self.behaviors.insert(
            AgentId::from(agent_id),
            Behavior::Delayed(delay, text.to_string()),
        );
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockCompletion {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionProvider for MockCompletion {
    async fn complete(&self, _prompt: &str, agent_id: &AgentId) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behaviors.get(agent_id) {
            Some(Behavior::Reply(text)) => Ok(text.clone()),
            Some(Behavior::Fail(reason)) => Err(ChorusError::completion(agent_id, reason)),
            Some(Behavior::Delayed(delay, text)) => {
                tokio::time::sleep(*delay).await;
                Ok(text.clone())
            }
            None => Ok(self.default_reply.clone()),
        }
    }
}
