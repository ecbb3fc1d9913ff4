//! Speech Synthesis
//!
//! A `SpeechSynthesizer` turns one sentence into a stream of raw audio chunks.
//! Providers are interchangeable behind the trait and chosen by configuration.

pub mod elevenlabs;
pub mod openai;

use crate::error::BridgeError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt, future};
use serde::Serialize;
use std::pin::Pin;

pub use elevenlabs::ElevenLabsSynthesizer;
pub use openai::OpenAISpeechSynthesizer;

/// Raw audio chunks for one sentence, in generation order.
pub type AudioStream = Pin<Box<dyn Stream<Item = Result<Bytes, BridgeError>> + Send>>;

/// One chunk of synthesized audio on its way to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    pub turn_id: String,
    /// Monotonic within the turn, starting at 0.
    pub sequence: u64,
    pub data: Bytes,
}

/// Fine-tuning knobs sent along with every synthesis request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
    pub use_speaker_boost: bool,
    pub speed: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.15,
            similarity_boost: 0.9,
            style: 0.0,
            use_speaker_boost: true,
            speed: 1.0,
        }
    }
}

/// Fixed synthesis parameters for a persona.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceConfig {
    pub voice_id: String,
    pub model_id: String,
    /// Provider output format, e.g. `pcm_24000`.
    pub output_format: String,
    pub settings: VoiceSettings,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            voice_id: "JBFqnCBsd6RMkjVDRZzb".into(),
            model_id: "eleven_multilingual_v2".into(),
            output_format: "pcm_24000".into(),
            settings: VoiceSettings::default(),
        }
    }
}

/// Sample rate encoded in a `pcm_<rate>` output format.
pub fn pcm_sample_rate(output_format: &str) -> Option<u32> {
    output_format.strip_prefix("pcm_")?.parse().ok()
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Starts synthesis of a single sentence.
    ///
    /// Each call issues a fresh request, so a sentence can be re-synthesized
    /// by calling this again.
    async fn synthesize(&self, sentence: &str, voice: &VoiceConfig) -> Result<AudioStream, BridgeError>;

    /// Sample rate of the 16-bit mono PCM this provider produces for `voice`.
    fn sample_rate(&self, voice: &VoiceConfig) -> u32;
}

/// Drops zero-length chunks, which some providers emit as keep-alives.
pub fn skip_empty(stream: AudioStream) -> AudioStream {
    Box::pin(stream.filter(|chunk| future::ready(!matches!(chunk, Ok(bytes) if bytes.is_empty()))))
}
