use std::time::Duration;
use thiserror::Error;

/// Failures raised anywhere along the speech bridge.
///
/// Only some of these end a session: connect, handshake and channel-closed
/// errors are fatal, while synthesis and JSON errors are scoped to a single
/// sentence or message and are logged by the caller.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Failed to connect to reasoning engine: {0}")]
    Connect(String),

    #[error("Reasoning engine handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    #[error("Expected `{expected}` from reasoning engine, got `{got}`")]
    ProtocolMismatch { expected: String, got: String },

    #[error("Connection closed")]
    ChannelClosed,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("Persona not found: {0}")]
    PersonaNotFound(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for BridgeError {
    fn from(e: reqwest::Error) -> Self {
        BridgeError::Synthesis(e.to_string())
    }
}
