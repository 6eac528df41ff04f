//! Statistics for the tally service

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Process-wide counters
///
/// Shared between the accept loop, connection tasks and the broadcaster.
#[derive(Debug)]
pub struct TallyStats {
    started_at: Instant,
    connections_accepted: AtomicU64,
    connections_rejected: AtomicU64,
    connections_closed: AtomicU64,
    transitions: AtomicU64,
    frames_sent: AtomicU64,
    write_failures: AtomicU64,
}

impl TallyStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            connections_accepted: AtomicU64::new(0),
            connections_rejected: AtomicU64::new(0),
            connections_closed: AtomicU64::new(0),
            transitions: AtomicU64::new(0),
            frames_sent: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
        }
    }

    pub fn connection_accepted(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_rejected(&self) {
        self.connections_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transition(&self) {
        self.transitions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_sent(&self, count: u64) {
        self.frames_sent.fetch_add(count, Ordering::Relaxed);
    }

    pub fn write_failures(&self, count: u64) {
        self.write_failures.fetch_add(count, Ordering::Relaxed);
    }

    /// Copy the counters into a plain struct
    pub fn snapshot(&self) -> StatsSnapshot {
        let accepted = self.connections_accepted.load(Ordering::Relaxed);
        let closed = self.connections_closed.load(Ordering::Relaxed);

        StatsSnapshot {
            uptime: self.started_at.elapsed(),
            connections_accepted: accepted,
            connections_rejected: self.connections_rejected.load(Ordering::Relaxed),
            active_connections: accepted.saturating_sub(closed),
            transitions: self.transitions.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for TallyStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of [`TallyStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub uptime: Duration,
    /// Total connections ever accepted
    pub connections_accepted: u64,
    /// Connections turned away by the connection limit
    pub connections_rejected: u64,
    /// Accepted connections not yet closed
    pub active_connections: u64,
    /// Tally transitions published
    pub transitions: u64,
    /// Frames written to clients, including on-connect pushes
    pub frames_sent: u64,
    /// Writes that failed or timed out
    pub write_failures: u64,
}
