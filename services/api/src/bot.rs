//! Meeting Bot Lifecycle
//!
//! A meeting participant is a bot that joins a call and renders a web page as
//! its camera. That page connects back to this service's WebSocket endpoint,
//! which is how a call ends up talking to a persona.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BotClient: Send + Sync {
    /// Sends a participant into `meeting_url` and returns its id.
    async fn create_participant(
        &self,
        meeting_url: &str,
        display_name: &str,
        callback_url: &str,
    ) -> Result<String>;

    /// Makes the participant leave its call.
    async fn end_participant(&self, participant_id: &str) -> Result<()>;
}

/// Builds the page URL the participant renders, pointing it at our socket
/// for `persona_key`.
pub fn callback_url(page_url: &str, public_ws_url: &str, persona_key: &str) -> Result<String> {
    let mut socket = Url::parse(&format!("{}/ws", public_ws_url.trim_end_matches('/')))
        .context("Invalid public WebSocket URL")?;
    socket.query_pairs_mut().append_pair("persona", persona_key);

    let mut page = Url::parse(page_url).context("Invalid bot page URL")?;
    page.query_pairs_mut().append_pair("wss", socket.as_str());
    Ok(page.into())
}

/// A bot client plus the addresses its participants need to find us.
#[derive(Clone)]
pub struct BotLauncher {
    pub client: Arc<dyn BotClient>,
    pub page_url: String,
    pub public_ws_url: String,
}

impl BotLauncher {
    /// Sends a participant for `persona_key` into `meeting_url`.
    pub async fn launch(
        &self,
        meeting_url: &str,
        display_name: &str,
        persona_key: &str,
    ) -> Result<String> {
        let callback = callback_url(&self.page_url, &self.public_ws_url, persona_key)?;
        self.client
            .create_participant(meeting_url, display_name, &callback)
            .await
    }
}

#[derive(Deserialize)]
struct CreatedBot {
    id: String,
}

/// `BotClient` for the Recall.ai meeting bot API.
pub struct RecallBotClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl RecallBotClient {
    pub fn new(api_url: String, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl BotClient for RecallBotClient {
    async fn create_participant(
        &self,
        meeting_url: &str,
        display_name: &str,
        callback_url: &str,
    ) -> Result<String> {
        let body = json!({
            "meeting_url": meeting_url,
            "bot_name": display_name,
            "output_media": {
                "camera": {
                    "kind": "webpage",
                    "config": { "url": callback_url }
                }
            },
            "variant": { "zoom": "web_4_core" }
        });
        let response = self
            .http
            .post(format!("{}/bot/", self.api_url))
            .header("Authorization", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to reach bot API")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("Bot API returned {status}: {detail}"));
        }
        let created: CreatedBot = response.json().await.context("Unexpected bot API response")?;
        info!(participant_id = %created.id, %meeting_url, "Meeting participant created");
        Ok(created.id)
    }

    async fn end_participant(&self, participant_id: &str) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/bot/{}/leave_call/", self.api_url, participant_id))
            .header("Authorization", &self.api_key)
            .send()
            .await
            .context("Failed to reach bot API")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("Bot API returned {status}: {detail}"));
        }
        info!(%participant_id, "Meeting participant left the call");
        Ok(())
    }
}
