//! Service statistics

pub mod metrics;

pub use metrics::{StatsSnapshot, TallyStats};
