//! Reasoning channel backed by the OpenAI Realtime WebSocket API.

use crate::ws::protocol::{REALTIME_SUBPROTOCOL, SessionUpdate};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt, future};
use persona_core::{
    BridgeError,
    channel::{Connection, ReasoningChannel},
    events::EventVocabulary,
    guardrail::ControlPolicy,
    persona::PersonaConfig,
};
use reqwest::Url;
use serde_json::Value;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        http::HeaderValue,
        protocol::Message as WsMessage,
    },
};
use tracing::{debug, info};

pub struct OpenAIRealtime {
    url: String,
    api_key: String,
    vocabulary: EventVocabulary,
}

impl OpenAIRealtime {
    pub fn new(url: String, api_key: String) -> Self {
        Self {
            url,
            api_key,
            vocabulary: EventVocabulary::default(),
        }
    }
}

fn header(value: String) -> Result<HeaderValue, BridgeError> {
    HeaderValue::from_str(&value).map_err(|e| BridgeError::Connect(e.to_string()))
}

/// Adds the model to the configured endpoint, keeping any query it already has.
fn session_url(base: &str, model: &str) -> Result<Url, BridgeError> {
    let mut url = Url::parse(base)
        .map_err(|e| BridgeError::Connect(format!("Invalid realtime URL {base}: {e}")))?;
    url.query_pairs_mut().append_pair("model", model);
    Ok(url)
}

#[async_trait]
impl ReasoningChannel for OpenAIRealtime {
    async fn connect(&self, persona: &PersonaConfig) -> Result<Connection, BridgeError> {
        let url = session_url(&self.url, &persona.policy.model)?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| BridgeError::Connect(e.to_string()))?;
        let headers = request.headers_mut();
        headers.insert("Authorization", header(format!("Bearer {}", self.api_key))?);
        headers.insert("OpenAI-Beta", header("realtime=v1".to_string())?);
        headers.insert(
            "Sec-WebSocket-Protocol",
            header(REALTIME_SUBPROTOCOL.to_string())?,
        );

        let (ws_stream, _) = connect_async(request)
            .await
            .map_err(|e| BridgeError::Connect(e.to_string()))?;
        info!(model = %persona.policy.model, "Connected to OpenAI Realtime API.");

        let (tx, rx) = ws_stream.split();
        let sink = tx
            .sink_map_err(|e| BridgeError::Transport(e.to_string()))
            .with(|text: String| future::ready(Ok::<_, BridgeError>(WsMessage::Text(text.into()))));
        let stream = rx
            .take_while(|msg| future::ready(!matches!(msg, Ok(WsMessage::Close(_)))))
            .filter_map(|msg| {
                future::ready(match msg {
                    Ok(WsMessage::Text(text)) => Some(Ok(text.as_str().to_owned())),
                    Ok(other) => {
                        debug!(kind = ?other, "Ignoring non-text frame from reasoning engine");
                        None
                    }
                    Err(e) => Some(Err(BridgeError::Transport(e.to_string()))),
                })
            });

        Ok(Connection {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }

    fn vocabulary(&self) -> &EventVocabulary {
        &self.vocabulary
    }

    fn session_update(&self, policy: &ControlPolicy) -> Result<Value, BridgeError> {
        Ok(serde_json::to_value(SessionUpdate::new(
            &self.vocabulary.session_update,
            policy,
        ))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_url_appends_model() {
        let url = session_url("wss://api.openai.com/v1/realtime", "gpt-4o-realtime-preview").unwrap();
        assert_eq!(
            url.as_str(),
            "wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview"
        );
    }

    #[test]
    fn test_session_url_keeps_existing_query() {
        let url = session_url("wss://proxy.example.com/realtime?region=eu", "gpt-4o").unwrap();
        assert_eq!(url.as_str(), "wss://proxy.example.com/realtime?region=eu&model=gpt-4o");
    }

    #[test]
    fn test_session_url_rejects_garbage() {
        assert!(matches!(
            session_url("not a url", "gpt-4o"),
            Err(BridgeError::Connect(_))
        ));
    }
}
