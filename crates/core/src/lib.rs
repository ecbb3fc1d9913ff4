//! Persona Core
//!
//! Engine-independent building blocks of the realtime speech bridge: sentence
//! segmentation, session identity protection, persona configuration, the
//! reasoning-channel handshake and speech-synthesis providers.

pub mod channel;
pub mod error;
pub mod events;
pub mod guardrail;
pub mod persona;
pub mod segmenter;
pub mod synthesis;

pub use error::BridgeError;
