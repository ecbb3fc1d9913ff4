//! Selects the upstream engines the bridge talks to.

pub mod openai;

use crate::config::{Config, TtsProvider};
use anyhow::{Context, Result};
use persona_core::{
    channel::ReasoningChannel,
    synthesis::{ElevenLabsSynthesizer, OpenAISpeechSynthesizer, SpeechSynthesizer},
};
use std::sync::Arc;
use tracing::info;

/// Builds the reasoning-engine adapter.
pub fn reasoning_channel(config: &Config) -> Arc<dyn ReasoningChannel> {
    Arc::new(openai::OpenAIRealtime::new(
        config.realtime_url.clone(),
        config.openai_api_key.clone(),
    ))
}

/// Builds the speech synthesizer for the configured provider.
pub fn speech_synthesizer(config: &Config) -> Result<Arc<dyn SpeechSynthesizer>> {
    let synthesizer: Arc<dyn SpeechSynthesizer> = match config.tts_provider {
        TtsProvider::ElevenLabs => {
            info!("Using ElevenLabs speech synthesis.");
            let api_key = config
                .elevenlabs_api_key
                .clone()
                .context("ElevenLabs API key not found")?;
            Arc::new(ElevenLabsSynthesizer::new(api_key))
        }
        TtsProvider::OpenAI => {
            info!("Using OpenAI speech synthesis.");
            Arc::new(OpenAISpeechSynthesizer::new(config.openai_api_key.clone()))
        }
    };
    Ok(synthesizer)
}
