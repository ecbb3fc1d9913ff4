//! The session bridge: one reasoning-engine connection per client connection,
//! relayed in both directions, with the engine's text turned into speech on
//! the way back.

use super::protocol::AudioEnvelope;
use crate::audio_utils::PcmConverter;
use futures_util::{SinkExt, StreamExt};
use persona_core::{
    BridgeError,
    channel::{self, Connection, EventSink, EventStream, ReasoningChannel},
    events::{EventKind, EventVocabulary, event_type},
    guardrail::GuardRail,
    persona::PersonaConfig,
    segmenter::SentenceSegmenter,
    synthesis::{AudioFrame, SpeechSynthesizer, skip_empty},
};
use serde_json::Value;
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Duration,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// How many finished turn ids are remembered to reject late text.
const FINISHED_TURNS_KEPT: usize = 64;

/// Lifecycle of a bridged call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Connecting,
    Active,
    Closing,
    Closed,
}

/// Per-deployment knobs shared by every session.
#[derive(Debug, Clone, Copy)]
pub struct BridgeSettings {
    pub handshake_timeout: Duration,
    pub client_sample_rate: u32,
}

pub struct SessionBridge {
    session_id: Uuid,
    persona: Arc<PersonaConfig>,
    channel: Arc<dyn ReasoningChannel>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    settings: BridgeSettings,
    state: BridgeState,
}

impl SessionBridge {
    pub fn new(
        session_id: Uuid,
        persona: Arc<PersonaConfig>,
        channel: Arc<dyn ReasoningChannel>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        settings: BridgeSettings,
    ) -> Self {
        Self {
            session_id,
            persona,
            channel,
            synthesizer,
            settings,
            state: BridgeState::Connecting,
        }
    }

    fn transition(&mut self, next: BridgeState) {
        info!(session_id = %self.session_id, from = ?self.state, to = ?next, "Bridge state change");
        self.state = next;
    }

    /// Runs the session to completion.
    ///
    /// Returns `Ok` when the client hung up, and an error when the session
    /// could not start or the engine side failed. Both connections are closed
    /// before this returns.
    pub async fn run(
        mut self,
        mut client_tx: EventSink,
        client_rx: EventStream,
    ) -> Result<(), BridgeError> {
        let opened = channel::open(
            self.channel.as_ref(),
            &self.persona,
            self.settings.handshake_timeout,
        )
        .await;
        let (Connection { sink: mut upstream_tx, stream: upstream_rx }, ack) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                error!(error = %e, "Could not open reasoning channel");
                self.transition(BridgeState::Closing);
                let _ = client_tx.close().await;
                self.transition(BridgeState::Closed);
                return Err(e);
            }
        };

        let result = match client_tx.send(ack.to_string()).await {
            Ok(()) => {
                self.transition(BridgeState::Active);
                info!("Session active");
                self.relay(&mut client_tx, client_rx, &mut upstream_tx, upstream_rx)
                    .await
            }
            Err(e) => Err(e),
        };

        self.transition(BridgeState::Closing);
        let _ = upstream_tx.close().await;
        let _ = client_tx.close().await;
        self.transition(BridgeState::Closed);
        result
    }

    /// Runs both relay loops until either one ends; the other is dropped at
    /// that point.
    async fn relay(
        &self,
        client_tx: &mut EventSink,
        client_rx: EventStream,
        upstream_tx: &mut EventSink,
        upstream_rx: EventStream,
    ) -> Result<(), BridgeError> {
        let vocabulary = self.channel.vocabulary();
        let guard = GuardRail::new(vocabulary);
        let mut speaker = Speaker {
            client_tx,
            synthesizer: self.synthesizer.as_ref(),
            persona: &self.persona,
            vocabulary,
            client_sample_rate: self.settings.client_sample_rate,
            turns: HashMap::new(),
            order: VecDeque::new(),
            finished: VecDeque::new(),
        };

        tokio::select! {
            result = inbound_relay(client_rx, upstream_tx, &guard) => {
                info!("Client side of the bridge ended");
                result
            }
            result = speaker.run(upstream_rx) => {
                info!("Engine side of the bridge ended");
                result
            }
        }
    }
}

/// Client -> engine: guard every control event and pass it upstream.
async fn inbound_relay(
    mut client_rx: EventStream,
    upstream_tx: &mut EventSink,
    guard: &GuardRail,
) -> Result<(), BridgeError> {
    while let Some(message) = client_rx.next().await {
        let text = message?;
        let event: Value = match serde_json::from_str(&text) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Dropping malformed JSON from client");
                continue;
            }
        };
        let event = guard.filter(event);
        debug!(event_type = ?event_type(&event), "Relaying client event upstream");
        upstream_tx.send(event.to_string()).await?;
    }
    info!("Client closed the connection");
    Ok(())
}

/// A conversation item whose text is being turned into speech.
#[derive(Default)]
struct Turn {
    segmenter: SentenceSegmenter,
    /// Sentences waiting for earlier turns to finish speaking.
    queued: VecDeque<String>,
    /// The engine's completion event, held back until this turn has spoken.
    completion: Option<String>,
    next_sequence: u64,
}

/// Engine -> client: text deltas become audio, everything else passes
/// through.
///
/// Turns speak strictly one after another in order of first appearance. The
/// front of `order` is the speaking turn; later turns buffer their sentences
/// until it completes.
struct Speaker<'a> {
    client_tx: &'a mut EventSink,
    synthesizer: &'a dyn SpeechSynthesizer,
    persona: &'a PersonaConfig,
    vocabulary: &'a EventVocabulary,
    client_sample_rate: u32,
    turns: HashMap<String, Turn>,
    order: VecDeque<String>,
    /// Recently finished turns, oldest first.
    finished: VecDeque<String>,
}

impl Speaker<'_> {
    async fn run(&mut self, mut upstream_rx: EventStream) -> Result<(), BridgeError> {
        while let Some(message) = upstream_rx.next().await {
            let text = message?;
            let event: Value = match serde_json::from_str(&text) {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "Dropping malformed JSON from reasoning engine");
                    continue;
                }
            };
            match self.vocabulary.classify(&event) {
                EventKind::TextDelta { item_id, delta } => self.on_delta(item_id, &delta).await?,
                EventKind::ItemCompleted { item_id } => self.on_completed(item_id, text).await?,
                EventKind::Other => {
                    debug!(event_type = ?event_type(&event), "Relaying engine event to client");
                    self.client_tx.send(text).await?;
                }
            }
        }
        info!("Reasoning engine closed the connection");
        Err(BridgeError::ChannelClosed)
    }

    fn is_speaking(&self, item_id: &str) -> bool {
        self.order.front().is_some_and(|id| id == item_id)
    }

    async fn on_delta(&mut self, item_id: String, delta: &str) -> Result<(), BridgeError> {
        if self.finished.contains(&item_id) {
            warn!(%item_id, "Ignoring text for a turn that already finished speaking");
            return Ok(());
        }
        if !self.turns.contains_key(&item_id) {
            debug!(%item_id, "Turn opened");
            self.order.push_back(item_id.clone());
        }
        let speaking = self.is_speaking(&item_id);
        let turn = self.turns.entry(item_id.clone()).or_default();
        if turn.completion.is_some() {
            warn!(%item_id, "Ignoring text for a turn that already completed");
            return Ok(());
        }
        let sentences: Vec<String> = turn.segmenter.push(delta).collect();
        if !speaking {
            turn.queued.extend(sentences);
            return Ok(());
        }

        for sentence in &sentences {
            self.speak(&item_id, sentence).await?;
        }
        Ok(())
    }

    async fn on_completed(&mut self, item_id: String, event: String) -> Result<(), BridgeError> {
        match self.turns.get_mut(&item_id) {
            Some(turn) => turn.completion = Some(event),
            None => {
                // An item that never carried text has nothing to speak.
                return self.client_tx.send(event).await;
            }
        }
        self.drain().await
    }

    /// Lets the speaking turn finish, then hands over to the next turn, as
    /// long as turns at the front of the queue have completed.
    async fn drain(&mut self) -> Result<(), BridgeError> {
        while let Some(item_id) = self.order.front().cloned() {
            let Some(turn) = self.turns.get_mut(&item_id) else {
                self.order.pop_front();
                continue;
            };
            let completion = turn.completion.take();
            let mut pending: Vec<String> = turn.queued.drain(..).collect();
            if completion.is_some() {
                pending.extend(turn.segmenter.flush());
            }

            for sentence in &pending {
                self.speak(&item_id, sentence).await?;
            }

            let Some(completion) = completion else {
                return Ok(());
            };
            self.turns.remove(&item_id);
            self.order.pop_front();
            if self.finished.len() == FINISHED_TURNS_KEPT {
                self.finished.pop_front();
            }
            self.finished.push_back(item_id.clone());
            self.client_tx.send(completion).await?;
            info!(%item_id, "Turn finished speaking");
        }
        Ok(())
    }

    /// Synthesizes one sentence and streams its audio to the client.
    ///
    /// Synthesis problems only cost this sentence; a failed client write is
    /// returned because the session cannot continue without the client.
    async fn speak(&mut self, item_id: &str, sentence: &str) -> Result<(), BridgeError> {
        if !sentence.chars().any(char::is_alphanumeric) {
            debug!(%item_id, %sentence, "Nothing to say");
            return Ok(());
        }
        let voice = &self.persona.voice;
        let audio = match self.synthesizer.synthesize(sentence, voice).await {
            Ok(audio) => audio,
            Err(e) => {
                warn!(%item_id, error = %e, "Synthesis failed, skipping sentence");
                return Ok(());
            }
        };
        let mut converter =
            match PcmConverter::new(self.synthesizer.sample_rate(voice), self.client_sample_rate) {
                Ok(converter) => converter,
                Err(e) => {
                    warn!(%item_id, error = %e, "Audio conversion unavailable, skipping sentence");
                    return Ok(());
                }
            };

        let mut audio = skip_empty(audio);
        while let Some(chunk) = audio.next().await {
            let converted = match chunk.map_err(anyhow::Error::from).and_then(|c| converter.push(&c)) {
                Ok(converted) => converted,
                Err(e) => {
                    warn!(%item_id, error = %e, "Synthesis stream failed, dropping rest of sentence");
                    return Ok(());
                }
            };
            self.send_frame(item_id, converted).await?;
        }
        match converter.finish() {
            Ok(rest) => self.send_frame(item_id, rest).await,
            Err(e) => {
                warn!(%item_id, error = %e, "Could not flush resampler");
                Ok(())
            }
        }
    }

    async fn send_frame(&mut self, item_id: &str, data: bytes::Bytes) -> Result<(), BridgeError> {
        if data.is_empty() {
            return Ok(());
        }
        let Some(turn) = self.turns.get_mut(item_id) else {
            return Ok(());
        };
        let frame = AudioFrame {
            turn_id: item_id.to_string(),
            sequence: turn.next_sequence,
            data,
        };
        turn.next_sequence += 1;

        let envelope = serde_json::to_string(&AudioEnvelope::new(&self.vocabulary.audio_out, &frame))?;
        debug!(%item_id, sequence = frame.sequence, bytes = frame.data.len(), "Sending audio frame");
        self.client_tx.send(envelope).await
    }
}
