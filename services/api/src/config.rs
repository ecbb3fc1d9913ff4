use persona_core::{
    guardrail::ControlPolicy,
    synthesis::{VoiceConfig, VoiceSettings, pcm_sample_rate},
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Defines the supported speech-synthesis providers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TtsProvider {
    ElevenLabs,
    OpenAI,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,

    pub openai_api_key: String,
    pub realtime_url: String,
    pub realtime_model: String,
    pub realtime_voice: String,
    pub realtime_modalities: Vec<String>,
    pub handshake_timeout: Duration,

    pub tts_provider: TtsProvider,
    pub elevenlabs_api_key: Option<String>,
    pub eleven_voice_id: String,
    pub eleven_model_id: String,
    pub eleven_output_format: String,
    pub openai_tts_model: String,
    pub openai_tts_voice: String,
    pub client_sample_rate: u32,

    pub personas_path: PathBuf,
    pub default_persona: String,

    pub recall_api_key: Option<String>,
    pub recall_api_url: String,
    pub bot_page_url: String,
    pub public_ws_url: Option<String>,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T: std::str::FromStr>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    let raw = var_or(name, default);
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("'{}': {}", raw, e)))
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address = parse_var::<SocketAddr>("BIND_ADDRESS", "0.0.0.0:3000")?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))?;
        let realtime_url = var_or("REALTIME_URL", "wss://api.openai.com/v1/realtime");
        let realtime_model = var_or("REALTIME_MODEL", "gpt-4o-realtime-preview-2024-12-17");
        let realtime_voice = var_or("REALTIME_VOICE", "alloy");
        let realtime_modalities: Vec<String> = var_or("REALTIME_MODALITIES", "text")
            .split(',')
            .map(|m| m.trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .collect();
        if realtime_modalities.is_empty()
            || realtime_modalities.iter().any(|m| m != "text" && m != "audio")
        {
            return Err(ConfigError::InvalidValue(
                "REALTIME_MODALITIES".to_string(),
                "expected a comma separated list of 'text' and 'audio'".to_string(),
            ));
        }
        let handshake_timeout =
            Duration::from_secs(parse_var::<u64>("HANDSHAKE_TIMEOUT_SECS", "10")?);

        let tts_provider = match var_or("TTS_PROVIDER", "elevenlabs").to_lowercase().as_str() {
            "elevenlabs" => TtsProvider::ElevenLabs,
            "openai" => TtsProvider::OpenAI,
            other => {
                return Err(ConfigError::InvalidValue(
                    "TTS_PROVIDER".to_string(),
                    format!("'{}' is not one of 'elevenlabs', 'openai'", other),
                ));
            }
        };
        let elevenlabs_api_key = std::env::var("ELEVENLABS_API_KEY").ok();
        if tts_provider == TtsProvider::ElevenLabs && elevenlabs_api_key.is_none() {
            return Err(ConfigError::MissingVar(
                "ELEVENLABS_API_KEY must be set for 'elevenlabs' provider".to_string(),
            ));
        }
        let eleven_voice_id = var_or("ELEVEN_VOICE_ID", "JBFqnCBsd6RMkjVDRZzb");
        let eleven_model_id = var_or("ELEVEN_MODEL_ID", "eleven_multilingual_v2");
        let eleven_output_format = var_or("ELEVEN_OUTPUT_FORMAT", "pcm_24000");
        if pcm_sample_rate(&eleven_output_format).is_none() {
            return Err(ConfigError::InvalidValue(
                "ELEVEN_OUTPUT_FORMAT".to_string(),
                format!("'{}' is not a pcm_<rate> format", eleven_output_format),
            ));
        }
        let openai_tts_model = var_or("OPENAI_TTS_MODEL", "gpt-4o-mini-tts");
        let openai_tts_voice = var_or("OPENAI_TTS_VOICE", "alloy");
        let client_sample_rate = parse_var::<u32>("CLIENT_SAMPLE_RATE", "24000")?;

        let personas_path = PathBuf::from(var_or("PERSONAS_PATH", "./personas"));
        let default_persona = var_or("DEFAULT_PERSONA", "munffett");

        let recall_api_key = std::env::var("RECALL_API_KEY").ok();
        let recall_api_url = var_or("RECALL_API_URL", "https://us-west-2.recall.ai/api/v1");
        let bot_page_url = var_or("BOT_PAGE_URL", "https://recallai-demo.netlify.app");
        let public_ws_url = std::env::var("PUBLIC_WS_URL").ok();
        if recall_api_key.is_some() && public_ws_url.is_none() {
            return Err(ConfigError::MissingVar(
                "PUBLIC_WS_URL must be set when RECALL_API_KEY is set".to_string(),
            ));
        }

        Ok(Self {
            bind_address,
            log_level,
            openai_api_key,
            realtime_url,
            realtime_model,
            realtime_voice,
            realtime_modalities,
            handshake_timeout,
            tts_provider,
            elevenlabs_api_key,
            eleven_voice_id,
            eleven_model_id,
            eleven_output_format,
            openai_tts_model,
            openai_tts_voice,
            client_sample_rate,
            personas_path,
            default_persona,
            recall_api_key,
            recall_api_url,
            bot_page_url,
            public_ws_url,
        })
    }

    /// Synthesis parameters for the configured provider.
    pub fn voice_config(&self) -> VoiceConfig {
        match self.tts_provider {
            TtsProvider::ElevenLabs => VoiceConfig {
                voice_id: self.eleven_voice_id.clone(),
                model_id: self.eleven_model_id.clone(),
                output_format: self.eleven_output_format.clone(),
                settings: VoiceSettings::default(),
            },
            TtsProvider::OpenAI => VoiceConfig {
                voice_id: self.openai_tts_voice.clone(),
                model_id: self.openai_tts_model.clone(),
                output_format: "pcm_24000".to_string(),
                settings: VoiceSettings::default(),
            },
        }
    }

    /// The fixed session identity for a persona with the given instructions.
    pub fn control_policy(&self, instructions: String) -> ControlPolicy {
        ControlPolicy {
            instructions,
            voice: self.realtime_voice.clone(),
            model: self.realtime_model.clone(),
            output_modalities: self.realtime_modalities.clone(),
        }
    }
}
