use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::handlers::HandlerTable;
use crate::commands::{self, Command};
use crate::config::{BackendKind, Config, ProviderConfig};
use crate::emotion::EmotionStore;
use crate::error::{ChorusError, Result};
use crate::fusion::FusionCoordinator;
use crate::lifecycle::{HealthCheckTask, HealthMonitor, HealthRecord};
use crate::messaging::MessageBridge;
use crate::providers::{
    CompletionProvider, EchoCompletion, HubProvider, LLMProvider, OllamaProvider,
    PersonaCompletion,
};
use crate::registry::AgentRegistry;
use crate::routing::{IntentRouter, RouteTarget, RoutingDecision};
use crate::storage::{BackupStore, FileBackupStore, StateFiles};
use crate::types::{AgentId, FusionId, FusionRequest, Message, Participant, Recipient};

/// Answer to one piece of routed text.
#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub decision: RoutingDecision,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fusion: Option<FusionRequest>,
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Reply(Reply),
    Info(String),
    Quit,
    Nothing,
}

fn llm_backend(kind: BackendKind, config: &ProviderConfig) -> Option<Arc<dyn LLMProvider>> {
    match kind {
        BackendKind::Echo => None,
        BackendKind::Ollama => Some(Arc::new(OllamaProvider::new(
            config.ollama_url.clone(),
            config.ollama_model.clone(),
        ))),
        BackendKind::Hub => {
            let mut hub = HubProvider::new(config.hub_url.clone(), config.hub_model.clone());
            if let Some(key) = &config.hub_api_key {
                hub = hub.with_api_key(key.clone());
            }
            Some(Arc::new(hub))
        }
    }
}

/// Builds the completion backend named by the provider config, with any
/// per-agent overrides applied.
pub fn completion_backend(
    config: &ProviderConfig,
    registry: &AgentRegistry,
) -> Result<Arc<dyn CompletionProvider>> {
    let Some(backend) = llm_backend(config.backend, config) else {
        if !config.agent_backends.is_empty() {
            return Err(ChorusError::Config(
                "per-agent backends need an ollama or hub default backend".to_string(),
            ));
        }
        return Ok(Arc::new(EchoCompletion));
    };

    let mut persona = PersonaCompletion::new(registry, backend);
    for (agent_id, kind) in &config.agent_backends {
        let backend = llm_backend(*kind, config).ok_or_else(|| {
            ChorusError::Config(format!("agent {} cannot use the echo backend", agent_id))
        })?;
        persona = persona.with_backend(agent_id, backend)?;
    }
    Ok(Arc::new(persona))
}

fn log_fusion_queries(bridge: &MessageBridge, agent_ids: &[AgentId], text: &str) -> Result<()> {
    for agent_id in agent_ids {
        bridge.send(Message::new(
            Participant::User,
            Recipient::Agent(agent_id.clone()),
            "fusion_query",
            text,
        ))?;
    }
    Ok(())
}

fn log_fusion_outcome(bridge: &MessageBridge, request: &FusionRequest) -> Result<()> {
    for agent_id in request.contributors() {
        bridge.send(Message::new(
            Participant::Agent(agent_id.clone()),
            Recipient::User,
            "fusion_response",
            request.responses[&agent_id].clone(),
        ))?;
    }
    if let Some(synthesis) = &request.synthesis {
        bridge.send(Message::new(
            Participant::System,
            Recipient::User,
            "fusion_synthesis",
            synthesis.clone(),
        ))?;
    }
    Ok(())
}

/// Owns every service and routes user input through them.
pub struct Dispatcher {
    config: Config,
    registry: Arc<AgentRegistry>,
    router: IntentRouter,
    handlers: HandlerTable,
    completion: Arc<dyn CompletionProvider>,
    emotions: Arc<EmotionStore>,
    bridge: Arc<MessageBridge>,
    fusion: Arc<FusionCoordinator>,
    health: Arc<HealthMonitor>,
    checks: HealthCheckTask,
    state: StateFiles,
    pinned: Mutex<Vec<AgentId>>,
}

impl Dispatcher {
    /// Load the registry, pick the completion backend, restore persisted state.
    pub async fn init(config: Config) -> Result<Self> {
        let registry = match &config.registry_path {
            Some(path) => AgentRegistry::from_path(path)?,
            None => AgentRegistry::builtin()?,
        };
        let completion = completion_backend(&config.provider, &registry)?;
        let backups = Arc::new(FileBackupStore::new(
            config.storage.agents_dir.clone(),
            config.storage.backup_dir.clone(),
        ));
        Self::assemble(config, registry, completion, backups).await
    }

    /// Wire the services around an already-built registry and backends.
    ///
    /// Agents without any snapshot get a baseline one so they can be
    /// resurrected later.
    pub async fn assemble(
        config: Config,
        registry: AgentRegistry,
        completion: Arc<dyn CompletionProvider>,
        backups: Arc<dyn BackupStore>,
    ) -> Result<Self> {
        let registry = Arc::new(registry);
        let router = IntentRouter::new(registry.clone(), config.router.clone())?;
        let handlers = HandlerTable::from_config(
            &config.router.handlers,
            router.default_agent(),
            completion.clone(),
        );
        let state = StateFiles::new(config.storage.state_dir.clone());

        let emotions = Arc::new(EmotionStore::new());
        match state.load_emotions() {
            Ok(saved) => emotions.restore_snapshot(
                saved
                    .into_iter()
                    .filter(|(id, _)| registry.contains(id))
                    .collect(),
            ),
            Err(e) => log::warn!("ignoring unreadable emotion state: {}", e),
        }

        let health = Arc::new(HealthMonitor::new(
            &registry,
            emotions.clone(),
            backups,
            config.health.clone(),
        ));
        match state.load_health() {
            Ok(saved) => health.restore_snapshot(saved),
            Err(e) => log::warn!("ignoring unreadable health state: {}", e),
        }

        let baselines = health.ensure_snapshots().await;
        if baselines > 0 {
            log::info!("took {} baseline agent snapshots", baselines);
        }

        let bridge = Arc::new(MessageBridge::with_journal(
            registry.clone(),
            &state.messages_path(),
        )?);
        let fusion = Arc::new(FusionCoordinator::new(
            registry.clone(),
            completion.clone(),
            emotions.clone(),
            health.clone(),
            config.fusion.clone(),
        ));
        let checks = HealthCheckTask::new(
            health.clone(),
            Duration::from_secs(config.health.check_interval_secs),
        );

        log::info!(
            "dispatcher ready: {} agents, default {}",
            registry.len(),
            router.default_agent()
        );
        Ok(Self {
            config,
            registry,
            router,
            handlers,
            completion,
            emotions,
            bridge,
            fusion,
            health,
            checks,
            state,
            pinned: Mutex::new(Vec::new()),
        })
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn router(&self) -> &IntentRouter {
        &self.router
    }

    pub fn handlers_mut(&mut self) -> &mut HandlerTable {
        &mut self.handlers
    }

    pub fn emotions(&self) -> &Arc<EmotionStore> {
        &self.emotions
    }

    pub fn bridge(&self) -> &MessageBridge {
        &self.bridge
    }

    pub fn fusion(&self) -> &FusionCoordinator {
        &self.fusion
    }

    pub fn health(&self) -> &Arc<HealthMonitor> {
        &self.health
    }

    pub fn pinned(&self) -> Vec<AgentId> {
        self.pinned.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Pin a set of agents for subsequent text. An empty set clears the pin.
    pub fn pin(&self, agent_ids: Vec<AgentId>) -> Result<Vec<AgentId>> {
        let mut distinct: Vec<AgentId> = Vec::with_capacity(agent_ids.len());
        for id in agent_ids {
            self.registry.lookup(&id)?;
            if !distinct.contains(&id) {
                distinct.push(id);
            }
        }
        *self.pinned.lock().unwrap_or_else(|e| e.into_inner()) = distinct.clone();
        Ok(distinct)
    }

    fn pinned_decision(&self) -> Option<RoutingDecision> {
        let pinned = self.pinned.lock().unwrap_or_else(|e| e.into_inner());
        match pinned.as_slice() {
            [] => None,
            [only] => Some(RoutingDecision::Single {
                target: RouteTarget::Agent(only.clone()),
            }),
            many => Some(RoutingDecision::Fusion {
                agent_ids: many.to_vec(),
            }),
        }
    }

    /// Route free text (or use the pinned set) and answer it.
    pub async fn handle_text(&self, text: &str) -> Result<Reply> {
        let decision = self
            .pinned_decision()
            .unwrap_or_else(|| self.router.route(text));
        self.dispatch(decision, text).await
    }

    /// Ask one agent, bypassing the router.
    pub async fn ask_agent(&self, agent_id: &AgentId, text: &str) -> Result<Reply> {
        self.registry.lookup(agent_id)?;
        let decision = RoutingDecision::Single {
            target: RouteTarget::Agent(agent_id.clone()),
        };
        self.dispatch(decision, text).await
    }

    async fn dispatch(&self, decision: RoutingDecision, text: &str) -> Result<Reply> {
        let (text, fusion) = match &decision {
            RoutingDecision::Single {
                target: RouteTarget::Agent(agent_id),
            } => (self.complete_single(agent_id, text).await?, None),
            RoutingDecision::Single {
                target: RouteTarget::Handler(name),
            } => (self.run_handler(name, text).await?, None),
            RoutingDecision::Fusion { agent_ids } => {
                let request = self.run_fusion(agent_ids, text).await?;
                let synthesis = request.synthesis.clone().unwrap_or_default();
                (synthesis, Some(request))
            }
        };
        Ok(Reply {
            decision,
            text,
            fusion,
        })
    }

    async fn complete_single(&self, agent_id: &AgentId, text: &str) -> Result<String> {
        self.bridge.send(Message::new(
            Participant::User,
            Recipient::Agent(agent_id.clone()),
            "query",
            text,
        ))?;

        let started = Instant::now();
        let result = self.completion.complete(text, agent_id).await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        let reply = match result {
            Ok(reply) if !reply.trim().is_empty() => reply,
            Ok(_) => {
                self.note_failure(agent_id, latency_ms);
                return Err(ChorusError::completion(agent_id, "empty response"));
            }
            Err(e) => {
                log::warn!("single dispatch to {} failed: {}", agent_id, e);
                self.note_failure(agent_id, latency_ms);
                return Err(e);
            }
        };

        self.emotions.analyze_response(agent_id, &reply);
        self.health.record_response(agent_id, latency_ms, false)?;
        self.bridge.send(Message::new(
            Participant::Agent(agent_id.clone()),
            Recipient::User,
            "response",
            reply.clone(),
        ))?;
        Ok(reply)
    }

    fn note_failure(&self, agent_id: &AgentId, latency_ms: f64) {
        self.emotions.analyze_response(agent_id, "");
        if let Err(e) = self.health.record_response(agent_id, latency_ms, true) {
            log::warn!("health record for {}: {}", agent_id, e);
        }
    }

    async fn run_handler(&self, name: &str, text: &str) -> Result<String> {
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| ChorusError::Config(format!("no handler registered for {}", name)))?;
        self.bridge.send(Message::new(
            Participant::User,
            Recipient::System,
            "query",
            text,
        ))?;
        let reply = handler.handle(text).await?;
        self.bridge.send(Message::new(
            Participant::System,
            Recipient::User,
            format!("handler:{}", name),
            reply.clone(),
        ))?;
        Ok(reply)
    }

    async fn run_fusion(&self, agent_ids: &[AgentId], text: &str) -> Result<FusionRequest> {
        log_fusion_queries(&self.bridge, agent_ids, text)?;
        let request = self
            .fusion
            .fuse("user", agent_ids, text, self.config.fusion.timeout_ms)
            .await?;
        log_fusion_outcome(&self.bridge, &request)?;
        Ok(request)
    }

    /// Start a fusion without waiting for it. The responses and synthesis are
    /// logged once the request is terminal. Must be called inside a tokio runtime.
    pub fn start_fusion(
        &self,
        requester: &str,
        agent_ids: &[AgentId],
        text: &str,
        timeout_ms: u64,
    ) -> Result<FusionId> {
        let fusion_id = self
            .fusion
            .request_fusion(requester, agent_ids, text, timeout_ms)?;
        let distinct = self
            .fusion
            .status(&fusion_id)
            .map(|request| request.agent_ids)
            .unwrap_or_default();
        log_fusion_queries(&self.bridge, &distinct, text)?;

        let bridge = self.bridge.clone();
        let fusion = self.fusion.clone();
        tokio::spawn(async move {
            match fusion.wait(&fusion_id).await {
                Some(request) => {
                    if let Err(e) = log_fusion_outcome(&bridge, &request) {
                        log::warn!("fusion {} not logged: {}", fusion_id, e);
                    }
                }
                None => log::warn!("fusion {} evicted before it was logged", fusion_id),
            }
        });
        Ok(fusion_id)
    }

    pub async fn handle_line(&self, line: &str) -> Result<Outcome> {
        self.execute(commands::parse(line)).await
    }

    pub async fn execute(&self, command: Command) -> Result<Outcome> {
        let outcome = match command {
            Command::Ask(text) => Outcome::Reply(self.handle_text(&text).await?),
            Command::Direct { agent_id, text } => {
                Outcome::Reply(self.ask_agent(&agent_id, &text).await?)
            }
            Command::Agents => Outcome::Info(self.describe_agents()),
            Command::Emotions => Outcome::Info(self.describe_emotions()),
            Command::Use(ids) => {
                let pinned = self.pin(ids)?;
                if pinned.is_empty() {
                    Outcome::Info("Pinned set cleared".to_string())
                } else {
                    Outcome::Info(format!("Pinned: {}", join(&pinned)))
                }
            }
            Command::Reset => {
                self.emotions.reset_all();
                self.pinned.lock().unwrap_or_else(|e| e.into_inner()).clear();
                Outcome::Info("Emotions reset and pinned set cleared".to_string())
            }
            Command::History { a, b, limit } => {
                Outcome::Info(self.describe_history(&a, &b, limit))
            }
            Command::Health => Outcome::Info(self.describe_health()?),
            Command::Quit => Outcome::Quit,
            Command::Empty => Outcome::Nothing,
            Command::Invalid(reason) => Outcome::Info(format!("{}\n\n{}", reason, commands::HELP)),
        };
        Ok(outcome)
    }

    fn describe_agents(&self) -> String {
        self.registry
            .all()
            .iter()
            .map(|a| {
                let tags: Vec<&str> = a.capability_tags.iter().map(|t| t.as_str()).collect();
                format!("{:<10} {:<12} [{}]", a.id, a.display_name, tags.join(", "))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn describe_emotions(&self) -> String {
        self.registry
            .ids()
            .iter()
            .map(|id| {
                let vector = self.emotions.get(id);
                let (dimension, value) = vector.dominant();
                format!("{:<10} {} {:.2}", id, dimension.as_str(), value)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn describe_history(&self, a: &Participant, b: &Participant, limit: usize) -> String {
        let messages = self.bridge.history(a, b, limit);
        if messages.is_empty() {
            return format!("No messages between {} and {}", a, b);
        }
        messages
            .iter()
            .map(|m| {
                format!(
                    "[{}] {} -> {} ({}): {}",
                    m.timestamp.format("%H:%M:%S"),
                    m.sender,
                    m.receiver,
                    m.intent,
                    m.payload
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn describe_health(&self) -> Result<String> {
        let mut lines = Vec::new();
        for id in self.registry.ids() {
            let record = self.health.check_health(&id)?;
            lines.push(format!(
                "{:<10} {:<12} responses {:<4} errors {:<4} avg {:.0}ms",
                id,
                record.status.as_str(),
                record.response_count,
                record.error_count,
                record.avg_latency_ms
            ));
        }
        Ok(lines.join("\n"))
    }

    pub fn health_snapshot(&self) -> BTreeMap<AgentId, HealthRecord> {
        self.health.snapshot()
    }

    /// Start the periodic health loop. Must be called inside a tokio runtime.
    pub fn start_health_checks(&self) -> bool {
        self.checks.start()
    }

    /// Persist emotion and health state. Messages are journaled as they are sent.
    pub fn flush(&self) -> Result<()> {
        self.state.save_emotions(&self.emotions.snapshot())?;
        self.state.save_health(&self.health.snapshot())?;
        log::debug!("state flushed");
        Ok(())
    }

    /// Stop background work and persist state.
    pub async fn close(&self) -> Result<()> {
        self.checks.stop().await;
        self.bridge.close();
        self.flush()
    }
}

fn join(ids: &[AgentId]) -> String {
    ids.iter().map(|id| id.as_str()).collect::<Vec<_>>().join(", ")
}
