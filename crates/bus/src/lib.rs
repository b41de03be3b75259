//! Typed event channel between the monitoring host and its notification relays.
//!
//! Hosts publish [`Message`] envelopes on namespaced topics; relays subscribe
//! by topic prefix. Two transports implement the same
//! [`EventPublisher`]/[`EventSubscriber`] pair:
//! - [`LocalBus`] for handlers running inside the host process
//! - [`ZmqPublisher`]/[`ZmqSubscriber`] for relays running as separate workers

pub mod error;
pub mod local;
pub mod message;
pub mod messages;
pub mod pubsub;
pub mod traits;
pub mod transport;
pub mod worker;

pub use error::BusError;
pub use local::{LocalBus, LocalSubscriber};
pub use message::Message;
pub use messages::health;
pub use messages::topics;
pub use pubsub::{ZmqPublisher, ZmqSubscriber};
pub use traits::{EventPublisher, EventSubscriber};
pub use transport::Transport;
pub use worker::{Worker, WorkerBuilder, WorkerRunner, WorkerRunnerConfig};
