//! OBS Studio switcher (obs-websocket v5)
//!
//! Implements [`crate::bridge::Switcher`] on top of obs-websocket.
//! `InputActiveStateChanged` drives the program flag and
//! `InputShowStateChanged` the preview flag.

pub mod client;
pub mod config;
pub mod protocol;

pub use client::ObsClient;
pub use config::{ObsConfig, DEFAULT_OBS_PORT};
pub use protocol::ObsVersion;
