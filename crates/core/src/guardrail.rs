//! Session Identity Protection
//!
//! A persona's identity (instructions, voice, model and output modalities) is
//! fixed by the bridge when the session is established. The remote peer may
//! still tune everything else about the session, so client updates are not
//! rejected outright; the identity fields are simply removed from them.

use crate::events::{EventVocabulary, event_type};
use serde_json::{Map, Value};
use tracing::debug;

/// Session fields the remote peer is never allowed to set.
pub const PROTECTED_FIELDS: [&str; 5] = [
    "instructions",
    "voice",
    "model",
    "modalities",
    "output_modalities",
];

/// The identity a session is pinned to for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlPolicy {
    pub instructions: String,
    pub voice: String,
    pub model: String,
    pub output_modalities: Vec<String>,
}

impl ControlPolicy {
    /// The protected fields with their fixed values, as sent in the bridge's
    /// own session update.
    pub fn fixed_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("model".into(), Value::from(self.model.as_str()));
        fields.insert("instructions".into(), Value::from(self.instructions.as_str()));
        fields.insert("voice".into(), Value::from(self.voice.as_str()));
        fields.insert("modalities".into(), Value::from(self.output_modalities.clone()));
        fields
    }
}

/// Filters client-originated control events before they go upstream.
#[derive(Debug, Clone)]
pub struct GuardRail {
    session_update_type: String,
}

impl GuardRail {
    pub fn new(vocabulary: &EventVocabulary) -> Self {
        Self {
            session_update_type: vocabulary.session_update.clone(),
        }
    }

    /// Strips protected fields from session updates; any other event is
    /// returned untouched.
    pub fn filter(&self, mut event: Value) -> Value {
        if event_type(&event) != Some(self.session_update_type.as_str()) {
            return event;
        }
        if let Some(session) = event.get_mut("session").and_then(Value::as_object_mut) {
            let stripped: Vec<&str> = PROTECTED_FIELDS
                .into_iter()
                .filter(|field| session.remove(*field).is_some())
                .collect();
            if !stripped.is_empty() {
                debug!(?stripped, "Removed protected fields from client session update");
            }
        }
        event
    }
}
