//! Tally client wire protocol
//!
//! The server pushes one frame on connect and one per transition. Anything
//! the client sends back is decoded, logged and dropped.

pub mod frame;
pub mod inbound;

pub use frame::FrameEncoding;
pub use inbound::{ClientMessage, LineDecoder};
