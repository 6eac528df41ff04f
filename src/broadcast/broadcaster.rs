//! Tally fan-out
//!
//! Pushes each tally transition to every registered client. Writes run
//! concurrently and each one is bounded by the write timeout, so a stalled
//! client costs at most one timeout per publish and is then evicted.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::watch;

use crate::protocol::FrameEncoding;
use crate::registry::{ClientConnection, ConnectionRegistry, WriteOutcome};
use crate::stats::TallyStats;
use crate::tally::TallyState;

/// Result of a single publish
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Clients that received the frame
    pub delivered: usize,
    /// Clients that already held this state
    pub skipped: usize,
    /// Clients evicted after a failed or timed-out write
    pub failed: usize,
}

impl PublishReport {
    /// Number of clients in the snapshot
    pub fn recipients(&self) -> usize {
        self.delivered + self.skipped + self.failed
    }
}

/// Broadcasts tally state to connected clients
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
    encoding: FrameEncoding,
    write_timeout: Duration,
    state_tx: watch::Sender<TallyState>,
    stats: Arc<TallyStats>,
}

impl Broadcaster {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        encoding: FrameEncoding,
        write_timeout: Duration,
        stats: Arc<TallyStats>,
    ) -> Self {
        let (state_tx, _) = watch::channel(TallyState::Off);

        Self {
            registry,
            encoding,
            write_timeout,
            state_tx,
            stats,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn encoding(&self) -> FrameEncoding {
        self.encoding
    }

    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    pub fn stats(&self) -> &Arc<TallyStats> {
        &self.stats
    }

    /// State offered to newly connecting clients
    pub fn current(&self) -> TallyState {
        *self.state_tx.borrow()
    }

    /// Register a new client and push the current state to it
    ///
    /// The client's writer lock is held across registration and the initial
    /// write, so a publish racing with this call either sees the client in
    /// its snapshot and writes after us, or ran early enough that we read
    /// its state here. Either way the client never sees a stale state last.
    pub async fn attach(&self, conn: &Arc<ClientConnection>) -> io::Result<()> {
        let attach = async {
            let mut writer = conn.writer().await;

            if let Some(replaced) = self.registry.add(Arc::clone(conn)).await {
                tracing::warn!(
                    peer = %conn.identity(),
                    old_session = replaced.id(),
                    new_session = conn.id(),
                    "Replacing connection with duplicate identity"
                );
                replaced.close();
            }

            let state = self.current();
            let frame = self.encoding.encode(state);
            writer.send(state, &frame).await.map(|outcome| (state, outcome))
        };

        match tokio::time::timeout(self.write_timeout, attach).await {
            Ok(Ok((state, outcome))) => {
                if outcome == WriteOutcome::Sent {
                    self.stats.frames_sent(1);
                }
                tracing::debug!(
                    peer = %conn.identity(),
                    session_id = conn.id(),
                    state = %state,
                    "Initial tally sent"
                );
                Ok(())
            }
            Ok(Err(e)) => {
                self.stats.write_failures(1);
                Err(e)
            }
            Err(_) => {
                self.stats.write_failures(1);
                Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "initial tally write timed out",
                ))
            }
        }
    }

    /// Answer a client request with the current state
    ///
    /// Writes `preamble` followed by the current frame, even if the client
    /// already holds that state. The state is read under the writer lock,
    /// as in [`attach`](Self::attach), so a concurrent publish still lands
    /// after this reply.
    pub async fn resync(&self, conn: &ClientConnection, preamble: &[u8]) -> io::Result<TallyState> {
        let resync = async {
            let mut writer = conn.writer().await;
            let state = self.current();
            let frame = self.encoding.encode(state);
            writer.resend(state, preamble, &frame).await.map(|_| state)
        };

        match tokio::time::timeout(self.write_timeout, resync).await {
            Ok(Ok(state)) => {
                self.stats.frames_sent(1);
                Ok(state)
            }
            Ok(Err(e)) => {
                self.stats.write_failures(1);
                Err(e)
            }
            Err(_) => {
                self.stats.write_failures(1);
                Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "tally reply write timed out",
                ))
            }
        }
    }

    /// Publish a new tally state to every registered client
    ///
    /// Completes only after every write has finished or timed out. Clients
    /// whose write fails are removed from the registry and closed.
    pub async fn publish(&self, state: TallyState) -> PublishReport {
        self.state_tx.send_replace(state);
        self.stats.transition();

        let frame = self.encoding.encode(state);
        let connections = self.registry.snapshot().await;

        let writes = connections.iter().map(|conn| {
            let frame = &frame;
            async move {
                let result = conn.send_frame(state, frame, self.write_timeout).await;
                (conn, result)
            }
        });

        let mut report = PublishReport::default();

        for (conn, result) in join_all(writes).await {
            match result {
                Ok(WriteOutcome::Sent) => report.delivered += 1,
                Ok(WriteOutcome::Unchanged) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!(
                        peer = %conn.identity(),
                        session_id = conn.id(),
                        error = %e,
                        "Tally write failed, dropping client"
                    );
                    report.failed += 1;
                    self.registry.remove_connection(conn).await;
                    conn.close();
                }
            }
        }

        self.stats.frames_sent(report.delivered as u64);
        self.stats.write_failures(report.failed as u64);

        tracing::info!(
            state = %state,
            clients = report.recipients(),
            delivered = report.delivered,
            failed = report.failed,
            "Tally published"
        );

        report
    }
}
