use async_trait::async_trait;
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::journal::Journal;
use crate::error::{ChorusError, Result};
use crate::registry::AgentRegistry;
use crate::types::{Message, Participant, Recipient};

/// Receives messages delivered to one subscriber.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn handle(&self, message: Message) -> anyhow::Result<()>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F> MessageHandler for FnHandler<F>
where
    F: Fn(Message) -> anyhow::Result<()> + Send + Sync + 'static,
{
    async fn handle(&self, message: Message) -> anyhow::Result<()> {
        (self.0)(message)
    }
}

/// Wrap a synchronous closure as a handler.
pub fn handler_fn<F>(f: F) -> Arc<dyn MessageHandler>
where
    F: Fn(Message) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(FnHandler(f))
}

struct Subscription {
    tx: mpsc::UnboundedSender<Message>,
    task: JoinHandle<()>,
}

struct Log {
    messages: Vec<Message>,
    journal: Option<Journal>,
}

/// Append-only message log with per-subscriber delivery queues.
///
/// Appends are serialised by one lock and reach the journal before any
/// subscriber sees the message. Each subscriber drains its own queue on its
/// own task, so a failing handler only affects itself.
pub struct MessageBridge {
    registry: Arc<AgentRegistry>,
    log: Mutex<Log>,
    subscribers: RwLock<HashMap<Participant, Subscription>>,
}

impl MessageBridge {
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self {
            registry,
            log: Mutex::new(Log {
                messages: Vec::new(),
                journal: None,
            }),
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Bridge backed by a journal file; previously journaled messages are loaded.
    pub fn with_journal(registry: Arc<AgentRegistry>, path: &Path) -> Result<Self> {
        let (journal, existing) = Journal::open(path)?;
        log::info!(
            "loaded {} messages from {}",
            existing.len(),
            journal.path().display()
        );
        Ok(Self {
            registry,
            log: Mutex::new(Log {
                messages: existing,
                journal: Some(journal),
            }),
            subscribers: RwLock::new(HashMap::new()),
        })
    }

    fn validate(&self, message: &Message) -> Result<()> {
        if let Participant::Agent(id) = &message.sender {
            if !self.registry.contains(id) {
                return Err(ChorusError::unknown_agent(id.as_str()));
            }
        }
        if let Recipient::Agent(id) = &message.receiver {
            if !self.registry.contains(id) {
                return Err(ChorusError::unknown_agent(id.as_str()));
            }
        }
        Ok(())
    }

    /// Append a message and enqueue it for matching subscribers.
    ///
    /// The stored copy is returned; its timestamp is never earlier than the
    /// previous append's.
    pub fn send(&self, mut message: Message) -> Result<Message> {
        self.validate(&message)?;

        {
            let mut log = self.log.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(last) = log.messages.last() {
                if message.timestamp < last.timestamp {
                    message.timestamp = last.timestamp;
                }
            }
            if let Some(journal) = log.journal.as_mut() {
                journal.append(&message)?;
            }
            log.messages.push(message.clone());
        }

        self.deliver(&message);
        Ok(message)
    }

    fn deliver(&self, message: &Message) {
        let subscribers = self.subscribers.read().unwrap_or_else(|e| e.into_inner());
        for (owner, subscription) in subscribers.iter() {
            let wanted = match &message.receiver {
                Recipient::All => true,
                receiver => owner.is_addressed_by(receiver),
            };
            if wanted && subscription.tx.send(message.clone()).is_err() {
                log::warn!("subscriber {:?} queue closed, message {} dropped", owner, message.id);
            }
        }
    }

    /// Subscribe `owner` to messages addressed to it (and broadcasts).
    /// Replaces any existing subscription for the same owner. Must be called
    /// from within a tokio runtime.
    pub fn register_callback(&self, owner: Participant, handler: Arc<dyn MessageHandler>) -> Result<()> {
        if let Participant::Agent(id) = &owner {
            if !self.registry.contains(id) {
                return Err(ChorusError::unknown_agent(id.as_str()));
            }
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        let label = format!("{:?}", owner);
        let task = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let id = message.id;
                match AssertUnwindSafe(handler.handle(message)).catch_unwind().await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => log::error!("subscriber {} failed on message {}: {}", label, id, e),
                    Err(_) => log::error!("subscriber {} panicked on message {}", label, id),
                }
            }
        });

        let previous = self
            .subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(owner, Subscription { tx, task });
        if previous.is_some() {
            log::debug!("replaced existing subscription");
        }
        Ok(())
    }

    /// Drop the subscription. Messages already queued are still handled.
    pub fn unregister_callback(&self, owner: &Participant) -> bool {
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(owner)
            .is_some()
    }

    /// Most recent `limit` messages exchanged between `a` and `b`, newest first.
    pub fn history(&self, a: &Participant, b: &Participant, limit: usize) -> Vec<Message> {
        let log = self.log.lock().unwrap_or_else(|e| e.into_inner());
        log.messages
            .iter()
            .rev()
            .filter(|m| m.is_between(a, b))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Most recent `limit` messages of any kind, newest first.
    pub fn recent(&self, limit: usize) -> Vec<Message> {
        let log = self.log.lock().unwrap_or_else(|e| e.into_inner());
        log.messages.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the whole log, oldest first, as one JSON document.
    pub fn export(&self, path: &Path) -> Result<usize> {
        let messages = {
            let log = self.log.lock().unwrap_or_else(|e| e.into_inner());
            log.messages.clone()
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let doc = serde_json::json!({ "messages": messages });
        std::fs::write(path, serde_json::to_vec_pretty(&doc)?)?;
        Ok(messages.len())
    }

    /// Stop every subscriber task without waiting for queued messages.
    pub fn close(&self) {
        let mut subscribers = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        for (_, subscription) in subscribers.drain() {
            subscription.task.abort();
        }
    }
}

impl Drop for MessageBridge {
    fn drop(&mut self) {
        self.close();
    }
}
