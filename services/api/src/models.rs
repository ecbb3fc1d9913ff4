//! API Models
//!
//! Request and response bodies of the REST API, annotated for OpenAPI
//! generation with `utoipa`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema, Debug)]
pub struct CreateBotPayload {
    #[schema(example = "https://us02web.zoom.us/j/1234567890")]
    pub meeting_url: String,
    /// Persona key; the default persona when omitted.
    #[schema(example = "munffett")]
    pub persona: Option<String>,
    /// Name shown in the meeting; the persona's display name when omitted.
    pub bot_name: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct BotCreated {
    pub participant_id: String,
    #[schema(example = "munffett")]
    pub persona: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_bot_payload_optional_fields() {
        let payload: CreateBotPayload =
            serde_json::from_value(json!({"meeting_url": "https://meet.example.com/abc"})).unwrap();
        assert_eq!(payload.meeting_url, "https://meet.example.com/abc");
        assert!(payload.persona.is_none());
        assert!(payload.bot_name.is_none());
    }

    #[test]
    fn test_create_bot_payload_requires_meeting_url() {
        let result = serde_json::from_value::<CreateBotPayload>(json!({"persona": "munffett"}));
        assert!(result.is_err());
    }
}
