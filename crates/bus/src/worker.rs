//! Worker lifecycle.
//!
//! A [`Worker`] owns its own message loop; [`WorkerRunner`] starts it,
//! publishes health pings while it runs, and stops it on SIGINT/SIGTERM or
//! a programmatic shutdown.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::error::BusError;
use crate::message::Message;
use crate::messages::health::{WorkerHealth, WorkerStatus};
use crate::messages::topics::WORKER_HEALTH;
use crate::traits::EventPublisher;

// ── Worker trait ─────────────────────────────────────────────────────

#[async_trait]
pub trait Worker: Send + Sync {
    /// Subscribe and spawn the message loop. Must return once running.
    async fn start(&self) -> Result<(), BusError>;

    /// Stop the message loop and wait for it to finish.
    async fn stop(&self) -> Result<(), BusError>;

    fn name(&self) -> &str;

    /// Messages handled so far, reported in health pings.
    fn handled(&self) -> u64 {
        0
    }
}

// ── WorkerBuilder ────────────────────────────────────────────────────

/// Builder for [`WorkerRunnerConfig`].
pub struct WorkerBuilder {
    name: String,
    health_interval: Duration,
    shutdown_timeout: Duration,
}

impl WorkerBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            health_interval: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(5),
        }
    }

    /// Interval between health pings (default: 30s).
    pub fn health_interval(mut self, interval: Duration) -> Self {
        self.health_interval = interval;
        self
    }

    /// How long `stop()` may take before the runner gives up (default: 5s).
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn build(self) -> WorkerRunnerConfig {
        WorkerRunnerConfig {
            name: self.name,
            health_interval: self.health_interval,
            shutdown_timeout: self.shutdown_timeout,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerRunnerConfig {
    pub name: String,
    pub health_interval: Duration,
    pub shutdown_timeout: Duration,
}

// ── WorkerRunner ─────────────────────────────────────────────────────

pub struct WorkerRunner;

impl WorkerRunner {
    /// Run `worker` until an OS signal or `shutdown_notify` fires.
    ///
    /// Health pings go out through `publisher`; a failed ping is logged and
    /// otherwise ignored.
    pub async fn run(
        worker: Arc<dyn Worker>,
        publisher: Arc<dyn EventPublisher>,
        config: WorkerRunnerConfig,
        shutdown_notify: Option<Arc<Notify>>,
    ) -> Result<(), BusError> {
        let started_at = Instant::now();
        let name = config.name.clone();
        info!(worker = %name, "starting worker");

        worker.start().await?;
        info!(worker = %name, "worker started");
        Self::publish_health(&*publisher, &*worker, &name, WorkerStatus::Healthy, started_at).await;

        let stop_pings = Arc::new(Notify::new());
        let health_interval = config.health_interval;
        let health_handle = tokio::spawn({
            let publisher = publisher.clone();
            let worker = worker.clone();
            let name = name.clone();
            let stop_pings = stop_pings.clone();
            async move {
                let mut ticker = tokio::time::interval(health_interval);
                // first tick fires immediately; the initial ping is already out
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            Self::publish_health(&*publisher, &*worker, &name, WorkerStatus::Healthy, started_at).await;
                        }
                        _ = stop_pings.notified() => break,
                    }
                }
            }
        });

        Self::wait_for_shutdown(shutdown_notify).await;
        info!(worker = %name, "shutdown signal received");
        stop_pings.notify_waiters();
        health_handle.abort();

        info!(worker = %name, timeout = ?config.shutdown_timeout, "stopping worker");
        match tokio::time::timeout(config.shutdown_timeout, worker.stop()).await {
            Ok(Ok(())) => info!(worker = %name, handled = worker.handled(), "worker stopped gracefully"),
            Ok(Err(e)) => warn!(worker = %name, error = %e, "worker stop returned error"),
            Err(_) => warn!(worker = %name, "worker stop timed out, forcing shutdown"),
        }

        Self::publish_health(&*publisher, &*worker, &name, WorkerStatus::Unhealthy, started_at).await;
        info!(worker = %name, "worker shutdown complete");
        Ok(())
    }

    async fn publish_health(
        publisher: &dyn EventPublisher,
        worker: &dyn Worker,
        name: &str,
        status: WorkerStatus,
        started_at: Instant,
    ) {
        let health = WorkerHealth {
            worker_id: name.to_string(),
            status,
            handled: worker.handled(),
            uptime_secs: started_at.elapsed().as_secs(),
        };

        let result = match Message::new(WORKER_HEALTH, &health) {
            Ok(msg) => publisher.publish(msg).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            warn!(worker = %name, error = %e, "failed to publish health ping");
        }
    }

    async fn wait_for_shutdown(external: Option<Arc<Notify>>) {
        match external {
            Some(notify) => {
                tokio::select! {
                    _ = Self::os_signal() => {}
                    _ = notify.notified() => {}
                }
            }
            None => Self::os_signal().await,
        }
    }

    /// Resolve on SIGINT or SIGTERM (Ctrl+C elsewhere).
    ///
    /// If the handlers cannot be installed this never resolves, leaving
    /// programmatic shutdown as the only way out.
    async fn os_signal() {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
                (Ok(mut sigint), Ok(mut sigterm)) => {
                    tokio::select! {
                        _ = sigint.recv() => {}
                        _ = sigterm.recv() => {}
                    }
                }
                (Err(e), _) | (_, Err(e)) => {
                    warn!(error = %e, "failed to install signal handlers");
                    std::future::pending::<()>().await;
                }
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for ctrl_c");
                std::future::pending::<()>().await;
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
