//! ElevenLabs streaming text-to-speech.

use super::{AudioStream, SpeechSynthesizer, VoiceConfig, VoiceSettings, pcm_sample_rate};
use crate::error::BridgeError;
use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io";
const FALLBACK_SAMPLE_RATE: u32 = 24_000;

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: &'a VoiceSettings,
}

pub struct ElevenLabsSynthesizer {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ElevenLabsSynthesizer {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Points the client at another host, e.g. a local stand-in.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    async fn synthesize(&self, sentence: &str, voice: &VoiceConfig) -> Result<AudioStream, BridgeError> {
        let url = format!(
            "{}/v1/text-to-speech/{}/stream",
            self.base_url, voice.voice_id
        );
        debug!(voice_id = %voice.voice_id, chars = sentence.len(), "Requesting ElevenLabs synthesis");

        let response = self
            .client
            .post(url)
            .query(&[("output_format", voice.output_format.as_str())])
            .header("xi-api-key", &self.api_key)
            .json(&SpeechRequest {
                text: sentence.trim(),
                model_id: &voice.model_id,
                voice_settings: &voice.settings,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(BridgeError::Synthesis(format!(
                "ElevenLabs returned {status}: {detail}"
            )));
        }

        Ok(Box::pin(
            response.bytes_stream().map(|chunk| chunk.map_err(BridgeError::from)),
        ))
    }

    fn sample_rate(&self, voice: &VoiceConfig) -> u32 {
        pcm_sample_rate(&voice.output_format).unwrap_or(FALLBACK_SAMPLE_RATE)
    }
}
