use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::monitor::{CheckOutcome, HealthMonitor};

/// Periodic health checks over every agent.
pub struct HealthCheckTask {
    monitor: Arc<HealthMonitor>,
    interval: Duration,
    token: Mutex<CancellationToken>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl HealthCheckTask {
    pub fn new(monitor: Arc<HealthMonitor>, interval: Duration) -> Self {
        Self {
            monitor,
            interval: interval.max(Duration::from_millis(1)),
            token: Mutex::new(CancellationToken::new()),
            handle: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Spawn the check loop. Returns false if it is already running.
    pub fn start(&self) -> bool {
        let mut handle = self.handle.lock().unwrap_or_else(|e| e.into_inner());
        if handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false) {
            return false;
        }

        let token = self.token.lock().unwrap_or_else(|e| e.into_inner()).clone();
        let monitor = self.monitor.clone();
        let period = self.interval;

        *handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        log::info!("health check loop stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let outcomes = monitor.run_check().await;
                        let unhealthy = outcomes.iter().filter(|o| o.resurrected.is_some()).count();
                        log::debug!("health pass over {} agents, {} unhealthy", outcomes.len(), unhealthy);
                    }
                }
            }
        }));
        log::info!("health check loop started, every {:?}", period);
        true
    }

    /// Cancel the loop and wait for it to exit. The task can be started again.
    pub async fn stop(&self) {
        let handle = self.handle.lock().unwrap_or_else(|e| e.into_inner()).take();
        {
            let mut token = self.token.lock().unwrap_or_else(|e| e.into_inner());
            token.cancel();
            *token = CancellationToken::new();
        }
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                log::error!("health check loop ended abnormally: {}", e);
            }
        }
    }

    /// A single pass, outside the loop.
    pub async fn tick(&self) -> Vec<CheckOutcome> {
        self.monitor.run_check().await
    }
}
