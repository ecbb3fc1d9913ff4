//! Reasoning Channel
//!
//! Engine adapters only know how to establish a duplex connection of JSON text
//! messages. The handshake that every session performs on top of it lives
//! here, so it behaves the same regardless of which engine is behind the
//! connection.

use crate::{
    error::BridgeError,
    events::{EventVocabulary, event_type},
    guardrail::ControlPolicy,
    persona::PersonaConfig,
};
use async_trait::async_trait;
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde_json::Value;
use std::{pin::Pin, time::Duration};
use tracing::{error, info};

/// Incoming half of a JSON text connection.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<String, BridgeError>> + Send>>;
/// Outgoing half of a JSON text connection.
pub type EventSink = Pin<Box<dyn Sink<String, Error = BridgeError> + Send>>;

/// Both halves of an open connection.
pub struct Connection {
    pub sink: EventSink,
    pub stream: EventStream,
}

#[async_trait]
pub trait ReasoningChannel: Send + Sync {
    /// Opens a raw connection to the engine for `persona`.
    async fn connect(&self, persona: &PersonaConfig) -> Result<Connection, BridgeError>;

    /// Event names this engine uses.
    fn vocabulary(&self) -> &EventVocabulary;

    /// The session update announcing the persona's fixed identity.
    fn session_update(&self, policy: &ControlPolicy) -> Result<Value, BridgeError>;
}

/// Connects and performs the session handshake.
///
/// Connecting and receiving the first event must together finish within
/// `timeout`. The first event has to be the engine's session-created
/// acknowledgement; it is returned so the caller can replay it to the client.
pub async fn open(
    channel: &dyn ReasoningChannel,
    persona: &PersonaConfig,
    timeout: Duration,
) -> Result<(Connection, Value), BridgeError> {
    let handshake = async {
        let mut conn = channel.connect(persona).await?;
        let first = conn.stream.next().await.ok_or(BridgeError::ChannelClosed)??;
        Ok::<_, BridgeError>((conn, first))
    };
    let (mut conn, first) = tokio::time::timeout(timeout, handshake)
        .await
        .map_err(|_| BridgeError::HandshakeTimeout(timeout))??;

    let vocabulary = channel.vocabulary();
    let ack: Option<Value> = serde_json::from_str(&first).ok();
    let got = ack.as_ref().and_then(event_type).map(str::to_string);
    let ack = match ack {
        Some(ack) if got.as_deref() == Some(vocabulary.session_created.as_str()) => ack,
        _ => {
            let got = got.unwrap_or_else(|| "<unparseable>".to_string());
            error!(%got, "Reasoning engine did not acknowledge session");
            let _ = conn.sink.close().await;
            return Err(BridgeError::ProtocolMismatch {
                expected: vocabulary.session_created.clone(),
                got,
            });
        }
    };
    info!("Reasoning engine acknowledged session");

    let update = channel.session_update(&persona.policy)?;
    conn.sink.send(update.to_string()).await?;
    info!(persona = %persona.key, "Sent session update");

    Ok((conn, ack))
}
