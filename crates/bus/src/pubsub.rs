//! ZeroMQ PUB/SUB transport.
//!
//! Each message goes out as two frames: the topic (so SUB sockets can
//! prefix-filter without decoding) and the MessagePack [`Message`] envelope.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use zeromq::prelude::*;
use zeromq::{PubSocket, SubSocket, ZmqMessage};

use crate::error::BusError;
use crate::message::Message;
use crate::traits::{EventPublisher, EventSubscriber};
use crate::transport::Transport;

/// PUB socket, usually connected to the host broker's frontend.
pub struct ZmqPublisher {
    socket: Mutex<PubSocket>,
}

impl ZmqPublisher {
    #[instrument(skip_all, fields(endpoint = %transport))]
    pub async fn connect(transport: &Transport) -> Result<Self, BusError> {
        let mut socket = PubSocket::new();
        info!("connecting PUB socket");
        socket.connect(&transport.endpoint()).await?;
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }

    /// Bind instead of connect, for brokerless setups where subscribers dial in.
    #[instrument(skip_all, fields(endpoint = %transport))]
    pub async fn bind(transport: &Transport) -> Result<Self, BusError> {
        transport
            .ensure_ipc_dir()
            .map_err(|e| BusError::Transport(format!("cannot create IPC dir: {e}")))?;
        let mut socket = PubSocket::new();
        info!("binding PUB socket");
        socket.bind(&transport.endpoint()).await?;
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }
}

#[async_trait]
impl EventPublisher for ZmqPublisher {
    async fn publish(&self, message: Message) -> Result<(), BusError> {
        let envelope = message.to_bytes()?;

        let mut frames = ZmqMessage::from(message.topic.as_str());
        frames.push_back(envelope.into());

        self.socket.lock().await.send(frames).await?;
        debug!(topic = %message.topic, id = %message.id, "published message");
        Ok(())
    }
}

/// SUB socket, usually connected to the host broker's backend.
pub struct ZmqSubscriber {
    socket: Mutex<SubSocket>,
}

impl ZmqSubscriber {
    #[instrument(skip_all, fields(endpoint = %transport))]
    pub async fn connect(transport: &Transport) -> Result<Self, BusError> {
        let mut socket = SubSocket::new();
        info!("connecting SUB socket");
        socket.connect(&transport.endpoint()).await?;
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }
}

#[async_trait]
impl EventSubscriber for ZmqSubscriber {
    async fn subscribe(&self, topic_prefix: &str) -> Result<(), BusError> {
        self.socket.lock().await.subscribe(topic_prefix).await?;
        info!(topic_prefix, "subscribed to topic prefix");
        Ok(())
    }

    async fn recv(&self) -> Result<Message, BusError> {
        let frames = self.socket.lock().await.recv().await?;

        // [topic, envelope]; a lone frame is taken as the envelope itself
        let envelope = match frames.len() {
            0 => return Err(BusError::Transport("empty ZMQ message".into())),
            1 => frames.get(0),
            _ => frames.get(1),
        }
        .ok_or_else(|| BusError::Transport("missing envelope frame".into()))?;

        let message = Message::from_bytes(envelope.as_ref())?;
        debug!(topic = %message.topic, id = %message.id, "received message");
        Ok(message)
    }
}
