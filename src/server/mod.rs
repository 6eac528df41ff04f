//! Tally TCP server
//!
//! Accepts tally clients, registers them with the broadcaster's registry and
//! keeps one task per client alive until it disconnects.

pub mod config;
pub mod connection;
pub mod listener;

pub use config::{ServerConfig, DEFAULT_TALLY_PORT};
pub use listener::TallyServer;
