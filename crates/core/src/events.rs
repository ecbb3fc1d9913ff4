//! Engine-independent view of reasoning-engine events.
//!
//! The bridge only needs to recognise a handful of event kinds; everything
//! else is relayed verbatim. `EventVocabulary` holds the engine-specific type
//! names so the relay logic never hard-codes them.

use serde_json::Value;

/// Event type names spoken by a particular reasoning engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventVocabulary {
    /// First event the engine sends on a new connection.
    pub session_created: String,
    /// Session configuration update (sent by the bridge, guarded for clients).
    pub session_update: String,
    /// Events carrying a text fragment of a conversation item.
    pub text_delta: Vec<String>,
    /// Events marking a conversation item as finished.
    pub item_done: Vec<String>,
    /// Type used for the audio envelopes the bridge emits to the client.
    pub audio_out: String,
}

impl Default for EventVocabulary {
    fn default() -> Self {
        Self {
            session_created: "session.created".into(),
            session_update: "session.update".into(),
            text_delta: vec![
                "response.text.delta".into(),
                "response.audio_transcript.delta".into(),
            ],
            item_done: vec!["response.output_item.done".into()],
            audio_out: "conversation.item.updated".into(),
        }
    }
}

/// What the outbound relay should do with an upstream event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    TextDelta { item_id: String, delta: String },
    ItemCompleted { item_id: String },
    Other,
}

impl EventVocabulary {
    pub fn classify(&self, event: &Value) -> EventKind {
        let Some(kind) = event_type(event) else {
            return EventKind::Other;
        };
        let Some(item_id) = item_id(event) else {
            return EventKind::Other;
        };

        if self.text_delta.iter().any(|t| t == kind) {
            return match event.get("delta").and_then(Value::as_str) {
                Some(delta) => EventKind::TextDelta {
                    item_id,
                    delta: delta.to_string(),
                },
                None => EventKind::Other,
            };
        }
        if self.item_done.iter().any(|t| t == kind) {
            // Items that end as `incomplete` or `cancelled` still end the turn.
            return EventKind::ItemCompleted { item_id };
        }
        if is_completed_status(event) {
            return EventKind::ItemCompleted { item_id };
        }
        EventKind::Other
    }
}

/// The `type` tag of a control event, if present.
pub fn event_type(event: &Value) -> Option<&str> {
    event.get("type").and_then(Value::as_str)
}

fn item_id(event: &Value) -> Option<String> {
    event
        .get("item_id")
        .or_else(|| event.get("item").and_then(|item| item.get("id")))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn is_completed_status(event: &Value) -> bool {
    event
        .get("status")
        .or_else(|| event.get("item").and_then(|item| item.get("status")))
        .and_then(Value::as_str)
        .is_some_and(|status| status == "completed" || status == "complete")
}
