//! Persona Bridge API Library Crate
//!
//! This library contains all the service-side logic of the persona bridge:
//! configuration, application state, the REST handlers for meeting bots, the
//! WebSocket bridge, and routing. The `api` binary is a thin wrapper around
//! this library.

pub mod audio_utils;
pub mod bot;
pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod ws;
