use std::sync::Arc;

use async_trait::async_trait;

use crate::error::BusError;
use crate::message::Message;

/// Publishes messages to every subscriber whose prefix matches the topic.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a message. Having no subscribers is not an error.
    async fn publish(&self, message: Message) -> Result<(), BusError>;
}

#[async_trait]
impl<T: EventPublisher + ?Sized> EventPublisher for Arc<T> {
    async fn publish(&self, message: Message) -> Result<(), BusError> {
        (**self).publish(message).await
    }
}

/// Receives messages whose topics match the subscribed prefixes.
///
/// A subscriber with no subscriptions receives nothing.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Subscribe to topics starting with `topic_prefix` (`""` matches all).
    async fn subscribe(&self, topic_prefix: &str) -> Result<(), BusError>;

    /// Wait for the next matching message.
    ///
    /// Returns [`BusError::Closed`] once no more messages can arrive.
    async fn recv(&self) -> Result<Message, BusError>;
}

#[async_trait]
impl<T: EventSubscriber + ?Sized> EventSubscriber for Arc<T> {
    async fn subscribe(&self, topic_prefix: &str) -> Result<(), BusError> {
        (**self).subscribe(topic_prefix).await
    }

    async fn recv(&self) -> Result<Message, BusError> {
        (**self).recv().await
    }
}
