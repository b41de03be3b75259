//! notify-worker: relays uptime check events to the configured notification channel.
//!
//! Subscribes to events:
//! - `uptime.check_event.created`: renders and publishes a notification
//!
//! Publishes events:
//! - `uptime.worker.health`: periodic health pings

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::info;

use uptime_bus::{BusError, Transport, Worker, WorkerBuilder, WorkerRunner, ZmqPublisher, ZmqSubscriber};
use uptime_core::config::{load_dotenv, DeliveryConfig};
use uptime_core::NotifyConfig;
use uptime_notify::{
    CheckEventListener, Dispatcher, HttpCheckLookup, Notifier, SnsNotifier, TemplateRenderer,
    WebhookNotifier,
};

// ── CLI ─────────────────────────────────────────────────────────────

/// Uptime notify worker, publishes check event notifications.
#[derive(Parser, Debug)]
#[command(name = "notify-worker", version, about)]
struct Cli {
    /// Path to the notify.toml config file. Without it, `config/notify.toml`
    /// is used when present, otherwise the environment alone.
    #[arg(long, env = "UPTIME_NOTIFY_CONFIG")]
    config: Option<String>,

    /// Health ping interval in seconds.
    #[arg(long, env = "NOTIFY_HEALTH_INTERVAL", default_value_t = 30)]
    health_interval: u64,

    /// Shutdown timeout in seconds.
    #[arg(long, env = "NOTIFY_SHUTDOWN_TIMEOUT", default_value_t = 10)]
    shutdown_timeout: u64,

    /// Send one test notification to the configured destination and exit.
    #[arg(long)]
    send_test: bool,
}

// ── NotifyWorker ────────────────────────────────────────────────────

struct NotifyWorker {
    listener: Arc<CheckEventListener>,
    shutdown: Arc<Notify>,
    task: Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl Worker for NotifyWorker {
    async fn start(&self) -> Result<(), BusError> {
        self.listener.subscribe().await?;
        let listener = self.listener.clone();
        let shutdown = self.shutdown.clone();
        *self.task.lock().await = Some(tokio::spawn(async move {
            listener.run(shutdown).await;
        }));
        info!("notify worker listening for check events");
        Ok(())
    }

    async fn stop(&self) -> Result<(), BusError> {
        // a stored permit covers a listener task that has not polled yet
        self.shutdown.notify_one();
        if let Some(task) = self.task.lock().await.take() {
            task.await
                .map_err(|e| BusError::Worker(format!("listener task failed: {e}")))?;
        }
        info!("notify worker stopped");
        Ok(())
    }

    fn name(&self) -> &str {
        "notify-worker"
    }

    fn handled(&self) -> u64 {
        self.listener.handled()
    }
}

// ── main ────────────────────────────────────────────────────────────

const DEFAULT_CONFIG_PATH: &str = "config/notify.toml";

fn load_config(path: Option<&str>) -> anyhow::Result<NotifyConfig> {
    let path = path.or_else(|| Path::new(DEFAULT_CONFIG_PATH).exists().then_some(DEFAULT_CONFIG_PATH));
    match path {
        Some(path) => {
            let config = NotifyConfig::from_file(path)
                .with_context(|| format!("failed to load config from {path}"))?;
            info!(%path, "loaded notify config");
            Ok(config)
        }
        None => {
            let config = NotifyConfig::from_env().context("failed to load config from environment")?;
            info!("no config file, loaded notify config from environment");
            Ok(config)
        }
    }
}

fn build_notifier(config: &NotifyConfig) -> anyhow::Result<Arc<dyn Notifier>> {
    let notifier: Arc<dyn Notifier> = match &config.delivery {
        DeliveryConfig::Sns(sns) => Arc::new(SnsNotifier::new(sns)?),
        DeliveryConfig::Webhook(hook) => Arc::new(WebhookNotifier::from_config(hook)?),
    };
    Ok(notifier)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    config.log_summary();

    let notifier = build_notifier(&config)?;

    if cli.send_test {
        notifier
            .test(config.delivery.destination())
            .await
            .context("test notification failed")?;
        info!(channel = notifier.channel_name(), "test notification sent");
        return Ok(());
    }

    let renderer = Arc::new(TemplateRenderer::from_config(&config.templates)?);
    let checks = Arc::new(HttpCheckLookup::new(
        &config.checks_api_url(),
        Duration::from_secs(config.checks.timeout_secs),
    )?);
    let dispatcher = Arc::new(Dispatcher::from_config(&config, checks, renderer, notifier.clone()));

    let backend = Transport::parse(&config.broker.backend)?;
    let frontend = Transport::parse(&config.broker.frontend)?;
    let subscriber = Arc::new(ZmqSubscriber::connect(&backend).await?);
    let publisher = Arc::new(ZmqPublisher::connect(&frontend).await?);

    let worker = Arc::new(NotifyWorker {
        listener: Arc::new(CheckEventListener::new(dispatcher, subscriber)),
        shutdown: Arc::new(Notify::new()),
        task: Mutex::new(None),
    });

    let runner_config = WorkerBuilder::new("notify-worker")
        .health_interval(Duration::from_secs(cli.health_interval))
        .shutdown_timeout(Duration::from_secs(cli.shutdown_timeout))
        .build();

    if matches!(config.delivery, DeliveryConfig::Sns(_)) {
        info!("Enabled AWS SNS notifications");
    } else {
        info!(channel = notifier.channel_name(), "Enabled webhook notifications");
    }

    WorkerRunner::run(worker, publisher, runner_config, None).await?;
    info!("notify-worker exited cleanly");

    Ok(())
}
