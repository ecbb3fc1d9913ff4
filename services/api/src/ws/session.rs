//! Accepts meeting-client WebSocket connections and hands each one to its own
//! session bridge.

use super::{bridge::SessionBridge, protocol::REALTIME_SUBPROTOCOL};
use crate::state::AppState;
use axum::{
    extract::{
        Query, State,
        rejection::QueryRejection,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt, future};
use persona_core::{
    BridgeError,
    channel::{EventSink, EventStream},
    persona::PersonaConfig,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    pub persona: Option<String>,
}

/// Axum handler to upgrade an HTTP connection to a WebSocket.
///
/// The persona is resolved before upgrading so an unknown one is rejected
/// with a plain 404 instead of a socket that closes immediately.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    params: Result<Query<ConnectParams>, QueryRejection>,
) -> Response {
    // A malformed query string is treated like a missing persona.
    let requested = params.ok().and_then(|Query(p)| p.persona);
    let persona = match state.personas.resolve(requested.as_deref()) {
        Ok(persona) => persona,
        Err(e) => {
            warn!(error = %e, "Rejecting WebSocket connection");
            return (StatusCode::NOT_FOUND, e.to_string()).into_response();
        }
    };

    ws.protocols([REALTIME_SUBPROTOCOL])
        .on_upgrade(move |socket| handle_socket(socket, state, persona))
}

/// Runs one bridged session over an upgraded client socket.
#[instrument(name = "bridge", skip_all, fields(session_id, persona = %persona.key))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, persona: Arc<PersonaConfig>) {
    let session_id = Uuid::new_v4();
    tracing::Span::current().record("session_id", tracing::field::display(session_id));
    info!("New WebSocket connection");

    let (socket_tx, socket_rx) = socket.split();
    let bridge = SessionBridge::new(
        session_id,
        persona,
        state.reasoning.clone(),
        state.synthesizer.clone(),
        state.bridge,
    );

    match bridge.run(client_sink(socket_tx), client_stream(socket_rx)).await {
        Ok(()) => info!("Session finished"),
        Err(e) => error!(error = %e, "Session terminated with error"),
    }
}

fn client_sink(tx: futures_util::stream::SplitSink<WebSocket, Message>) -> EventSink {
    Box::pin(
        tx.sink_map_err(|e| BridgeError::Transport(e.to_string()))
            .with(|text: String| future::ready(Ok::<_, BridgeError>(Message::Text(text.into())))),
    )
}

fn client_stream(rx: futures_util::stream::SplitStream<WebSocket>) -> EventStream {
    Box::pin(
        rx.take_while(|msg| future::ready(!matches!(msg, Ok(Message::Close(_)))))
            .filter_map(|msg| {
                future::ready(match msg {
                    Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                    Ok(Message::Binary(data)) => {
                        warn!(bytes = data.len(), "Ignoring binary frame from client");
                        None
                    }
                    Ok(other) => {
                        debug!(kind = ?other, "Ignoring control frame from client");
                        None
                    }
                    Err(e) => Some(Err(BridgeError::Transport(e.to_string()))),
                })
            }),
    )
}
