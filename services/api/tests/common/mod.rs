//! In-memory stand-ins for the meeting client, the reasoning engine and the
//! speech provider.

#![allow(dead_code)]

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use futures::{SinkExt, StreamExt, channel::mpsc, stream};
use persona_bridge_api::{
    bot::{BotClient, BotLauncher},
    state::AppState,
    ws::bridge::BridgeSettings,
};
use persona_core::{
    BridgeError,
    channel::{Connection, EventSink, EventStream, ReasoningChannel},
    events::EventVocabulary,
    guardrail::ControlPolicy,
    persona::{PersonaCatalog, PersonaConfig, display_name},
    synthesis::{AudioStream, SpeechSynthesizer, VoiceConfig},
};
use serde_json::{Value, json};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

pub const SAMPLE_RATE: u32 = 24_000;

pub fn persona(key: &str) -> PersonaConfig {
    PersonaConfig {
        key: key.into(),
        display_name: display_name(key),
        policy: ControlPolicy {
            instructions: format!("You are {}.", display_name(key)),
            voice: "alloy".into(),
            model: "gpt-4o-realtime-preview".into(),
            output_modalities: vec!["text".into()],
        },
        voice: VoiceConfig::default(),
    }
}

pub fn catalog() -> PersonaCatalog {
    PersonaCatalog::new([persona("munffett"), persona("warren_buffett")], "munffett").unwrap()
}

pub fn settings() -> BridgeSettings {
    BridgeSettings {
        handshake_timeout: Duration::from_secs(1),
        client_sample_rate: SAMPLE_RATE,
    }
}

/// The test's handle on a fake engine connection.
pub struct EngineHandle {
    /// Events the engine sends to the bridge.
    pub events: mpsc::UnboundedSender<Result<String, BridgeError>>,
    /// Everything the bridge sent to the engine.
    pub received: mpsc::UnboundedReceiver<String>,
}

impl EngineHandle {
    pub fn emit(&self, event: Value) {
        self.events.unbounded_send(Ok(event.to_string())).unwrap();
    }

    pub fn emit_raw(&self, text: &str) {
        self.events.unbounded_send(Ok(text.to_string())).unwrap();
    }

    pub async fn next_received(&mut self) -> Option<Value> {
        let text = tokio::time::timeout(Duration::from_secs(1), self.received.next())
            .await
            .ok()??;
        Some(serde_json::from_str(&text).unwrap())
    }
}

/// Reasoning engine that hands out one prepared connection.
pub struct FakeEngine {
    vocabulary: EventVocabulary,
    connection: Mutex<Option<Connection>>,
}

impl FakeEngine {
    pub fn new() -> (Arc<Self>, EngineHandle) {
        let (events_tx, events_rx) = mpsc::unbounded();
        let (received_tx, received_rx) = mpsc::unbounded();
        let sink: EventSink =
            Box::pin(received_tx.sink_map_err(|e| BridgeError::Transport(e.to_string())));
        let stream: EventStream = Box::pin(events_rx);
        let engine = Arc::new(Self {
            vocabulary: EventVocabulary::default(),
            connection: Mutex::new(Some(Connection { sink, stream })),
        });
        let handle = EngineHandle {
            events: events_tx,
            received: received_rx,
        };
        (engine, handle)
    }

    /// Like `new`, with the session acknowledgement already queued.
    pub fn acknowledged() -> (Arc<Self>, EngineHandle) {
        let (engine, handle) = Self::new();
        handle.emit(json!({"type": "session.created", "session": {"id": "sess_1"}}));
        (engine, handle)
    }
}

#[async_trait]
impl ReasoningChannel for FakeEngine {
    async fn connect(&self, _persona: &PersonaConfig) -> Result<Connection, BridgeError> {
        self.connection
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| BridgeError::Connect("already connected".into()))
    }

    fn vocabulary(&self) -> &EventVocabulary {
        &self.vocabulary
    }

    fn session_update(&self, policy: &ControlPolicy) -> Result<Value, BridgeError> {
        Ok(json!({"type": "session.update", "session": policy.fixed_fields()}))
    }
}

/// The PCM a `FakeSynthesizer` produces for a sentence: its UTF-8 bytes,
/// padded to whole samples.
pub fn pcm_for(sentence: &str) -> Vec<u8> {
    let mut pcm = sentence.as_bytes().to_vec();
    if pcm.len() % 2 == 1 {
        pcm.push(b' ');
    }
    pcm
}

/// Speech provider whose audio is the sentence text itself, delivered in
/// chunks that split a sample in two.
#[derive(Default)]
pub struct FakeSynthesizer {
    pub spoken: Mutex<Vec<String>>,
    pub fail_on: Option<String>,
}

impl FakeSynthesizer {
    pub fn failing_on(sentence: &str) -> Self {
        Self {
            fail_on: Some(sentence.to_string()),
            ..Self::default()
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(&self, sentence: &str, _voice: &VoiceConfig) -> Result<AudioStream, BridgeError> {
        if self.fail_on.as_deref() == Some(sentence) {
            return Err(BridgeError::Synthesis("provider returned 500".into()));
        }
        self.spoken.lock().unwrap().push(sentence.to_string());
        let pcm = Bytes::from(pcm_for(sentence));
        let split = 3.min(pcm.len());
        let chunks = vec![
            Ok(pcm.slice(..split)),
            Ok(Bytes::new()),
            Ok(pcm.slice(split..)),
        ];
        Ok(Box::pin(stream::iter(chunks)))
    }

    fn sample_rate(&self, _voice: &VoiceConfig) -> u32 {
        SAMPLE_RATE
    }
}

/// The test's side of the meeting client socket.
pub struct ClientHandle {
    pub sends: mpsc::UnboundedSender<Result<String, BridgeError>>,
    pub receives: mpsc::UnboundedReceiver<String>,
}

impl ClientHandle {
    pub fn send(&self, event: Value) {
        self.sends.unbounded_send(Ok(event.to_string())).unwrap();
    }

    pub fn send_raw(&self, text: &str) {
        self.sends.unbounded_send(Ok(text.to_string())).unwrap();
    }

    pub async fn next(&mut self) -> Option<Value> {
        let text = tokio::time::timeout(Duration::from_secs(1), self.receives.next())
            .await
            .ok()??;
        Some(serde_json::from_str(&text).unwrap())
    }

    /// Reads until the bridge closes the client connection.
    pub async fn drain(&mut self) -> Vec<Value> {
        let mut events = Vec::new();
        while let Some(event) = self.next().await {
            events.push(event);
        }
        events
    }
}

/// Builds the client-facing halves handed to the bridge.
pub fn client() -> (EventSink, EventStream, ClientHandle) {
    let (to_bridge_tx, to_bridge_rx) = mpsc::unbounded();
    let (from_bridge_tx, from_bridge_rx) = mpsc::unbounded();
    let sink: EventSink =
        Box::pin(from_bridge_tx.sink_map_err(|e| BridgeError::Transport(e.to_string())));
    let stream: EventStream = Box::pin(to_bridge_rx);
    let handle = ClientHandle {
        sends: to_bridge_tx,
        receives: from_bridge_rx,
    };
    (sink, stream, handle)
}

/// What the client observed, with consecutive audio frames of one turn
/// merged.
#[derive(Debug, PartialEq)]
pub enum Heard {
    Audio { item_id: String, pcm: Vec<u8> },
    Done(String),
    Event(String),
}

pub fn transcript(events: &[Value]) -> Vec<Heard> {
    let mut heard: Vec<Heard> = Vec::new();
    for event in events {
        let kind = event["type"].as_str().unwrap_or_default().to_string();
        if kind == "response.output_item.done" {
            heard.push(Heard::Done(event["item"]["id"].as_str().unwrap().to_string()));
            continue;
        }
        if kind != "conversation.item.updated" {
            heard.push(Heard::Event(kind));
            continue;
        }
        let item_id = event["item"]["id"].as_str().unwrap().to_string();
        let pcm = base64::engine::general_purpose::STANDARD
            .decode(event["item"]["delta"]["audio"].as_str().unwrap())
            .unwrap();
        if let Some(Heard::Audio { item_id: last, pcm: buffer }) = heard.last_mut() {
            if *last == item_id {
                buffer.extend(pcm);
                continue;
            }
        }
        heard.push(Heard::Audio { item_id, pcm });
    }
    heard
}

pub fn audio(item_id: &str, sentences: &[&str]) -> Heard {
    Heard::Audio {
        item_id: item_id.to_string(),
        pcm: sentences.iter().flat_map(|s| pcm_for(s)).collect(),
    }
}

pub fn text_delta(item_id: &str, delta: &str) -> Value {
    json!({"type": "response.text.delta", "item_id": item_id, "delta": delta})
}

pub fn item_done(item_id: &str) -> Value {
    json!({
        "type": "response.output_item.done",
        "item": {"id": item_id, "status": "completed"}
    })
}

/// Bot client that remembers what it was asked to do.
#[derive(Default)]
pub struct RecordingBots {
    pub created: Mutex<Vec<(String, String, String)>>,
    pub ended: Mutex<Vec<String>>,
}

#[async_trait]
impl BotClient for RecordingBots {
    async fn create_participant(
        &self,
        meeting_url: &str,
        display_name: &str,
        callback_url: &str,
    ) -> anyhow::Result<String> {
        let mut created = self.created.lock().unwrap();
        created.push((meeting_url.into(), display_name.into(), callback_url.into()));
        Ok(format!("bot-{}", created.len()))
    }

    async fn end_participant(&self, participant_id: &str) -> anyhow::Result<()> {
        self.ended.lock().unwrap().push(participant_id.into());
        Ok(())
    }
}

pub fn app_state(
    reasoning: Arc<dyn ReasoningChannel>,
    bots: Option<Arc<RecordingBots>>,
) -> Arc<AppState> {
    Arc::new(AppState {
        personas: Arc::new(catalog()),
        reasoning,
        synthesizer: Arc::new(FakeSynthesizer::default()),
        bridge: settings(),
        bots: bots.map(|client| BotLauncher {
            client,
            page_url: "https://page.example.com".into(),
            public_ws_url: "wss://bridge.example.com".into(),
        }),
    })
}
