//! Arena Sync Server - authoritative state synchronization for real-time arenas
//!
//! The server tracks every connected participant's transient state, resolves
//! movement, damage and respawn events under concurrent access, and fans
//! state out to every participant at a fixed cadence over WebSockets.

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod util;
pub mod ws;
