use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::HandlerConfig;
use crate::error::Result;
use crate::providers::CompletionProvider;
use crate::types::AgentId;

/// A routing target that is not an agent persona.
#[async_trait]
pub trait IntentHandler: Send + Sync {
    async fn handle(&self, text: &str) -> Result<String>;
}

/// Answers through an agent's completion backend, framed by a fixed instruction.
pub struct PromptHandler {
    name: String,
    agent_id: AgentId,
    completion: Arc<dyn CompletionProvider>,
}

impl PromptHandler {
    pub fn new(name: impl Into<String>, agent_id: AgentId, completion: Arc<dyn CompletionProvider>) -> Self {
        Self {
            name: name.into(),
            agent_id,
            completion,
        }
    }

    fn prompt(&self, text: &str) -> String {
        match self.name.as_str() {
            "weather" => format!(
                "Act as a weather desk. Answer the question below with what is \
                 generally known about the place and season, and say that live \
                 conditions are not available.\n\n{}",
                text
            ),
            name => format!("Act as the {} desk and answer:\n\n{}", name, text),
        }
    }
}

#[async_trait]
impl IntentHandler for PromptHandler {
    async fn handle(&self, text: &str) -> Result<String> {
        self.completion.complete(&self.prompt(text), &self.agent_id).await
    }
}

/// Name → handler, one entry per configured handler.
pub struct HandlerTable {
    handlers: HashMap<String, Arc<dyn IntentHandler>>,
}

impl HandlerTable {
    /// A [`PromptHandler`] on the default agent for every configured handler.
    pub fn from_config(
        configs: &[HandlerConfig],
        default_agent: &AgentId,
        completion: Arc<dyn CompletionProvider>,
    ) -> Self {
        let handlers = configs
            .iter()
            .map(|c| {
                let handler: Arc<dyn IntentHandler> = Arc::new(PromptHandler::new(
                    c.name.clone(),
                    default_agent.clone(),
                    completion.clone(),
                ));
                (c.name.clone(), handler)
            })
            .collect();
        Self { handlers }
    }

    pub fn insert(&mut self, name: impl Into<String>, handler: Arc<dyn IntentHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn IntentHandler>> {
        self.handlers.get(name).cloned()
    }
}
