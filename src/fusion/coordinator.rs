use futures::FutureExt;
use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinSet;

use super::synthesis::synthesize;
use crate::config::FusionConfig;
use crate::emotion::EmotionStore;
use crate::error::{ChorusError, Result};
use crate::lifecycle::HealthMonitor;
use crate::providers::CompletionProvider;
use crate::registry::AgentRegistry;
use crate::types::{AgentId, FusionId, FusionRequest, FusionStatus};

struct Entry {
    request: Arc<Mutex<FusionRequest>>,
    done: watch::Receiver<bool>,
}

#[derive(Default)]
struct Requests {
    entries: HashMap<FusionId, Entry>,
    order: VecDeque<FusionId>,
}

struct Shared {
    registry: Arc<AgentRegistry>,
    completion: Arc<dyn CompletionProvider>,
    emotions: Arc<EmotionStore>,
    health: Arc<HealthMonitor>,
}

/// Fans one query out to several agents and merges what comes back.
pub struct FusionCoordinator {
    shared: Arc<Shared>,
    config: FusionConfig,
    requests: RwLock<Requests>,
}

impl FusionCoordinator {
    pub fn new(
        registry: Arc<AgentRegistry>,
        completion: Arc<dyn CompletionProvider>,
        emotions: Arc<EmotionStore>,
        health: Arc<HealthMonitor>,
        config: FusionConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry,
                completion,
                emotions,
                health,
            }),
            config,
            requests: RwLock::new(Requests::default()),
        }
    }

    pub fn default_timeout_ms(&self) -> u64 {
        self.config.timeout_ms
    }

    /// Start a fusion and return its id immediately.
    ///
    /// Duplicate ids are collapsed. Fewer than two distinct agents, or any
    /// unknown agent, rejects the request. Must be called inside a tokio runtime.
    pub fn request_fusion(
        &self,
        requester: &str,
        agent_ids: &[AgentId],
        query: &str,
        timeout_ms: u64,
    ) -> Result<FusionId> {
        let mut distinct: Vec<AgentId> = Vec::with_capacity(agent_ids.len());
        for id in agent_ids {
            if !distinct.contains(id) {
                distinct.push(id.clone());
            }
        }
        if distinct.len() < 2 {
            return Err(ChorusError::InvalidFusion(format!(
                "fusion needs at least two distinct agents, got {}",
                distinct.len()
            )));
        }
        for id in &distinct {
            self.shared.registry.lookup(id)?;
        }

        let request = FusionRequest::new(requester, distinct, query);
        let fusion_id = request.id;
        let request = Arc::new(Mutex::new(request));
        let (done_tx, done_rx) = watch::channel(false);

        self.insert(
            fusion_id,
            Entry {
                request: request.clone(),
                done: done_rx,
            },
        );

        log::info!("fusion {} started for {}", fusion_id, requester);
        tokio::spawn(drive(
            self.shared.clone(),
            request,
            Duration::from_millis(timeout_ms),
            done_tx,
        ));
        Ok(fusion_id)
    }

    fn insert(&self, fusion_id: FusionId, entry: Entry) {
        let mut requests = self.requests.write().unwrap_or_else(|e| e.into_inner());
        requests.entries.insert(fusion_id, entry);
        requests.order.push_back(fusion_id);

        // Evict the oldest finished requests beyond the retention limit
        let mut excess = requests.entries.len().saturating_sub(self.config.max_retained.max(1));
        let mut kept = VecDeque::with_capacity(requests.order.len());
        while let Some(id) = requests.order.pop_front() {
            let terminal = requests
                .entries
                .get(&id)
                .map(|e| *e.done.borrow())
                .unwrap_or(true);
            if excess > 0 && terminal {
                requests.entries.remove(&id);
                excess -= 1;
            } else {
                kept.push_back(id);
            }
        }
        requests.order = kept;
    }

    pub fn status(&self, fusion_id: &FusionId) -> Option<FusionRequest> {
        let requests = self.requests.read().unwrap_or_else(|e| e.into_inner());
        requests
            .entries
            .get(fusion_id)
            .map(|e| e.request.lock().unwrap_or_else(|p| p.into_inner()).clone())
    }

    /// Resolve once the request is complete or timed out.
    pub async fn wait(&self, fusion_id: &FusionId) -> Option<FusionRequest> {
        let mut done = {
            let requests = self.requests.read().unwrap_or_else(|e| e.into_inner());
            requests.entries.get(fusion_id)?.done.clone()
        };
        if done.wait_for(|finished| *finished).await.is_err() {
            log::warn!("fusion {} driver went away before finishing", fusion_id);
        }
        self.status(fusion_id)
    }

    /// `request_fusion` followed by `wait`.
    pub async fn fuse(
        &self,
        requester: &str,
        agent_ids: &[AgentId],
        query: &str,
        timeout_ms: u64,
    ) -> Result<FusionRequest> {
        let fusion_id = self.request_fusion(requester, agent_ids, query, timeout_ms)?;
        self.wait(&fusion_id)
            .await
            .ok_or_else(|| ChorusError::InvalidFusion(format!("fusion {} was evicted", fusion_id)))
    }

    pub fn len(&self) -> usize {
        self.requests
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

type Arrival = (AgentId, Result<String>, f64);

async fn drive(
    shared: Arc<Shared>,
    request: Arc<Mutex<FusionRequest>>,
    timeout: Duration,
    done: watch::Sender<bool>,
) {
    let (fusion_id, agent_ids, query) = {
        let req = request.lock().unwrap_or_else(|e| e.into_inner());
        (req.id, req.agent_ids.clone(), req.query.clone())
    };

    let mut pending: JoinSet<Arrival> = JoinSet::new();
    for agent_id in agent_ids {
        let completion = shared.completion.clone();
        let query = query.clone();
        pending.spawn(async move {
            let started = Instant::now();
            let result = match AssertUnwindSafe(completion.complete(&query, &agent_id))
                .catch_unwind()
                .await
            {
                Ok(result) => result,
                Err(_) => Err(ChorusError::completion(&agent_id, "provider panicked")),
            };
            (agent_id, result, started.elapsed().as_secs_f64() * 1000.0)
        });
    }

    let deadline = tokio::time::Instant::now() + timeout;
    let status = loop {
        match tokio::time::timeout_at(deadline, pending.join_next()).await {
            Ok(Some(Ok((agent_id, result, latency_ms)))) => {
                arrive(&shared, &request, fusion_id, agent_id, result, latency_ms);
            }
            Ok(Some(Err(e))) => {
                log::error!("fusion {} sub-request aborted: {}", fusion_id, e);
            }
            Ok(None) => break FusionStatus::Complete,
            Err(_) => break FusionStatus::Timeout,
        }
        if request
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .all_arrived()
        {
            break FusionStatus::Complete;
        }
    };
    pending.abort_all();

    {
        let mut req = request.lock().unwrap_or_else(|e| e.into_inner());
        if status == FusionStatus::Timeout {
            // Agents that already failed were counted when they arrived
            let late = req.pending();
            for agent_id in &late {
                let elapsed = timeout.as_secs_f64() * 1000.0;
                if let Err(e) = shared.health.record_response(agent_id, elapsed, true) {
                    log::warn!("fusion {}: {}", fusion_id, e);
                }
            }
            log::warn!("fusion {} timed out waiting on {:?}", fusion_id, late);
        }
        let synthesis = synthesize(&shared.registry, &req);
        req.finish(status, synthesis);
        log::info!(
            "fusion {} {} with {} of {} responses",
            fusion_id,
            req.status.as_str(),
            req.responses.len(),
            req.agent_ids.len()
        );
    }
    let _ = done.send(true);
}

fn arrive(
    shared: &Shared,
    request: &Mutex<FusionRequest>,
    fusion_id: FusionId,
    agent_id: AgentId,
    result: Result<String>,
    latency_ms: f64,
) {
    let text = match result {
        Ok(text) => Some(text),
        Err(e) => {
            log::warn!("fusion {}: {}", fusion_id, e);
            None
        }
    };
    let is_error = text.as_ref().map(|t| t.trim().is_empty()).unwrap_or(true);

    shared
        .emotions
        .analyze_response(&agent_id, text.as_deref().unwrap_or(""));
    if let Err(e) = shared.health.record_response(&agent_id, latency_ms, is_error) {
        log::warn!("fusion {}: {}", fusion_id, e);
    }

    request
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .record(&agent_id, text);
}
