//! OpenAI speech endpoint, streamed as raw 24 kHz PCM16.

use super::{AudioStream, SpeechSynthesizer, VoiceConfig};
use crate::error::BridgeError;
use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const PCM_SAMPLE_RATE: u32 = 24_000;

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'static str,
    speed: f32,
}

pub struct OpenAISpeechSynthesizer {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAISpeechSynthesizer {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAISpeechSynthesizer {
    async fn synthesize(&self, sentence: &str, voice: &VoiceConfig) -> Result<AudioStream, BridgeError> {
        let response = self
            .client
            .post(format!("{}/v1/audio/speech", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&SpeechRequest {
                model: &voice.model_id,
                voice: &voice.voice_id,
                input: sentence.trim(),
                response_format: "pcm",
                speed: voice.settings.speed,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(BridgeError::Synthesis(format!(
                "OpenAI speech returned {status}: {detail}"
            )));
        }

        Ok(Box::pin(
            response.bytes_stream().map(|chunk| chunk.map_err(BridgeError::from)),
        ))
    }

    fn sample_rate(&self, _voice: &VoiceConfig) -> u32 {
        PCM_SAMPLE_RATE
    }
}
