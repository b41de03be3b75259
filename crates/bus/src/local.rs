//! In-process bus on top of a tokio broadcast channel.
//!
//! Lets a host run notification handlers inside its own process with the
//! same publisher/subscriber contract the ZeroMQ transport offers.

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, warn};

use crate::error::BusError;
use crate::message::Message;
use crate::traits::{EventPublisher, EventSubscriber};

/// Fan-out bus: every [`LocalSubscriber`] sees every published message and
/// keeps the ones matching its prefixes.
#[derive(Debug, Clone)]
pub struct LocalBus {
    sender: broadcast::Sender<Message>,
}

impl LocalBus {
    /// `capacity` bounds how far a slow subscriber may fall behind before
    /// it starts losing messages.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscriber(&self) -> LocalSubscriber {
        LocalSubscriber {
            receiver: Mutex::new(self.sender.subscribe()),
            prefixes: RwLock::new(Vec::new()),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl EventPublisher for LocalBus {
    async fn publish(&self, message: Message) -> Result<(), BusError> {
        let topic = message.topic.clone();
        match self.sender.send(message) {
            Ok(receivers) => debug!(%topic, receivers, "published message"),
            // pub/sub semantics: nobody listening is not a failure
            Err(_) => debug!(%topic, "published message with no subscribers"),
        }
        Ok(())
    }
}

/// Receiving end of a [`LocalBus`].
#[derive(Debug)]
pub struct LocalSubscriber {
    receiver: Mutex<broadcast::Receiver<Message>>,
    prefixes: RwLock<Vec<String>>,
}

impl LocalSubscriber {
    async fn wanted(&self, message: &Message) -> bool {
        self.prefixes
            .read()
            .await
            .iter()
            .any(|prefix| message.matches(prefix))
    }
}

#[async_trait]
impl EventSubscriber for LocalSubscriber {
    async fn subscribe(&self, topic_prefix: &str) -> Result<(), BusError> {
        let mut prefixes = self.prefixes.write().await;
        if !prefixes.iter().any(|p| p == topic_prefix) {
            prefixes.push(topic_prefix.to_string());
        }
        Ok(())
    }

    async fn recv(&self) -> Result<Message, BusError> {
        let mut receiver = self.receiver.lock().await;
        loop {
            match receiver.recv().await {
                Ok(message) => {
                    if self.wanted(&message).await {
                        return Ok(message);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "local subscriber lagged, messages dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return Err(BusError::Closed),
            }
        }
    }
}
