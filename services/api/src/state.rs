//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the shared,
//! clonable resources every request and session needs: the persona catalog
//! and the clients for the upstream services.

use crate::{bot::BotLauncher, ws::bridge::BridgeSettings};
use persona_core::{
    channel::ReasoningChannel, persona::PersonaCatalog, synthesis::SpeechSynthesizer,
};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
/// All fields are public to be accessible from other modules.
#[derive(Clone)]
pub struct AppState {
    pub personas: Arc<PersonaCatalog>,
    pub reasoning: Arc<dyn ReasoningChannel>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub bridge: BridgeSettings,
    /// `None` when no meeting-bot credentials are configured.
    pub bots: Option<BotLauncher>,
}
