//! Feeds check events from the bus into the [`Dispatcher`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use uptime_bus::{topics, BusError, EventSubscriber, Message};
use uptime_core::CheckEvent;

use crate::dispatcher::Dispatcher;

const RECV_BACKOFF_START: Duration = Duration::from_millis(100);
const RECV_BACKOFF_MAX: Duration = Duration::from_secs(5);

/// Delay after the `failures`-th consecutive receive error, doubling up to a cap.
fn recv_backoff(failures: u32) -> Duration {
    let factor = 1u32 << failures.saturating_sub(1).min(16);
    RECV_BACKOFF_START.saturating_mul(factor).min(RECV_BACKOFF_MAX)
}

/// Receives `check_event.created` messages and dispatches each on its own
/// task, so a slow delivery never holds up the next event.
pub struct CheckEventListener {
    dispatcher: Arc<Dispatcher>,
    subscriber: Arc<dyn EventSubscriber>,
    handled: AtomicU64,
}

impl CheckEventListener {
    pub fn new(dispatcher: Arc<Dispatcher>, subscriber: Arc<dyn EventSubscriber>) -> Self {
        Self {
            dispatcher,
            subscriber,
            handled: AtomicU64::new(0),
        }
    }

    /// Events taken off the bus and handed to the dispatcher.
    pub fn handled(&self) -> u64 {
        self.handled.load(Ordering::Relaxed)
    }

    pub async fn subscribe(&self) -> Result<(), BusError> {
        self.subscriber.subscribe(topics::CHECK_EVENT_CREATED).await
    }

    /// Receive until `shutdown` fires or the bus closes, then wait for
    /// in-flight dispatches to finish.
    pub async fn run(&self, shutdown: Arc<Notify>) {
        let stop = shutdown.notified();
        tokio::pin!(stop);
        stop.as_mut().enable();

        let mut in_flight = JoinSet::new();
        let mut failures = 0u32;
        loop {
            let mut backoff = None;
            tokio::select! {
                _ = &mut stop => {
                    debug!("listener shutdown requested");
                    break;
                }
                received = self.subscriber.recv() => match received {
                    Ok(message) => {
                        failures = 0;
                        self.handle(message, &mut in_flight);
                    }
                    Err(BusError::Closed) => {
                        info!("event bus closed, listener exiting");
                        break;
                    }
                    Err(e) => {
                        failures = failures.saturating_add(1);
                        let delay = recv_backoff(failures);
                        warn!(error = %e, failures, retry_in = ?delay, "failed to receive check event");
                        backoff = Some(delay);
                    }
                },
                // reap finished dispatches so the set stays small
                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
            }

            if let Some(delay) = backoff {
                tokio::select! {
                    _ = &mut stop => {
                        debug!("listener shutdown requested");
                        break;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        while in_flight.join_next().await.is_some() {}
    }

    fn handle(&self, message: Message, in_flight: &mut JoinSet<()>) {
        if message.topic != topics::CHECK_EVENT_CREATED {
            debug!(topic = %message.topic, "ignoring message");
            return;
        }

        let event: CheckEvent = match message.decode() {
            Ok(event) => event,
            Err(e) => {
                warn!(message_id = %message.id, error = %e, "undecodable check event dropped");
                return;
            }
        };

        self.handled.fetch_add(1, Ordering::Relaxed);
        let dispatcher = self.dispatcher.clone();
        let message_id = message.id;
        in_flight.spawn(async move {
            let outcome = dispatcher.on_check_event_created(&event).await;
            debug!(%message_id, check_id = %event.check_id, ?outcome, "check event handled");
        });
    }
}
