//! JSON envelopes exchanged with the reasoning engine and the meeting client.

use crate::audio_utils::encode_base64;
use persona_core::{guardrail::ControlPolicy, synthesis::AudioFrame};
use serde::Serialize;

/// Sub-protocol negotiated on both WebSocket legs.
pub const REALTIME_SUBPROTOCOL: &str = "realtime";

/// The bridge's own `session.update`, pinning the persona's identity.
#[derive(Serialize, Debug)]
pub struct SessionUpdate<'a> {
    #[serde(rename = "type")]
    pub kind: &'a str,
    pub session: SessionConfig<'a>,
}

#[derive(Serialize, Debug)]
pub struct SessionConfig<'a> {
    pub model: &'a str,
    pub instructions: &'a str,
    pub voice: &'a str,
    pub modalities: &'a [String],
    pub input_audio_format: &'static str,
    pub output_audio_format: &'static str,
    pub input_audio_transcription: AudioTranscription,
    pub turn_detection: TurnDetection,
}

#[derive(Serialize, Debug)]
pub struct AudioTranscription {
    pub model: &'static str,
}

#[derive(Serialize, Debug)]
pub struct TurnDetection {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub threshold: f32,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
}

impl<'a> SessionUpdate<'a> {
    pub fn new(kind: &'a str, policy: &'a ControlPolicy) -> Self {
        Self {
            kind,
            session: SessionConfig {
                model: &policy.model,
                instructions: &policy.instructions,
                voice: &policy.voice,
                modalities: &policy.output_modalities,
                input_audio_format: "pcm16",
                output_audio_format: "pcm16",
                input_audio_transcription: AudioTranscription { model: "whisper-1" },
                turn_detection: TurnDetection {
                    kind: "server_vad",
                    threshold: 0.5,
                    prefix_padding_ms: 300,
                    silence_duration_ms: 500,
                },
            },
        }
    }
}

/// Audio for one conversation item, sent to the client.
#[derive(Serialize, Debug)]
pub struct AudioEnvelope<'a> {
    #[serde(rename = "type")]
    pub kind: &'a str,
    pub item: AudioItem<'a>,
}

#[derive(Serialize, Debug)]
pub struct AudioItem<'a> {
    pub id: &'a str,
    pub delta: AudioDelta,
}

#[derive(Serialize, Debug)]
pub struct AudioDelta {
    /// Base64-encoded PCM16.
    pub audio: String,
}

impl<'a> AudioEnvelope<'a> {
    pub fn new(kind: &'a str, frame: &'a AudioFrame) -> Self {
        Self {
            kind,
            item: AudioItem {
                id: &frame.turn_id,
                delta: AudioDelta {
                    audio: encode_base64(&frame.data),
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::{Value, json};

    #[test]
    fn test_session_update_shape() {
        let policy = ControlPolicy {
            instructions: "Be Munffett.".into(),
            voice: "alloy".into(),
            model: "gpt-4o-realtime-preview".into(),
            output_modalities: vec!["text".into()],
        };
        let value = serde_json::to_value(SessionUpdate::new("session.update", &policy)).unwrap();
        assert_eq!(value["type"], "session.update");
        assert_eq!(value["session"]["instructions"], "Be Munffett.");
        assert_eq!(value["session"]["modalities"], json!(["text"]));
        assert_eq!(value["session"]["turn_detection"]["type"], "server_vad");
        assert_eq!(value["session"]["input_audio_format"], "pcm16");
    }

    #[test]
    fn test_audio_envelope_shape() {
        let frame = AudioFrame {
            turn_id: "item_1".into(),
            sequence: 0,
            data: Bytes::from_static(&[0x00, 0x40]),
        };
        let value: Value =
            serde_json::to_value(AudioEnvelope::new("conversation.item.updated", &frame)).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "conversation.item.updated",
                "item": {"id": "item_1", "delta": {"audio": "AEA="}}
            })
        );
    }
}
