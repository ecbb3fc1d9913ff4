//! WebSocket Session Management
//!
//! This module contains the realtime bridge between meeting clients and the
//! reasoning engine. It is structured into submodules:
//!
//! - `protocol`: JSON envelopes the bridge itself produces.
//! - `session`: Accepts client sockets and starts a bridge for each.
//! - `bridge`: The two relay loops, guard rail and speech scheduling.
//! - `provider`: Connections to the third-party engines behind the bridge.

pub mod bridge;
pub mod protocol;
pub mod provider;
pub mod session;

pub use session::ws_handler;
