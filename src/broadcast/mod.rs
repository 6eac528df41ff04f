//! Tally broadcasting

pub mod broadcaster;

pub use broadcaster::{Broadcaster, PublishReport};
