//! Registered client connection
//!
//! A [`ClientConnection`] owns the outbound half of a tally client's socket.
//! The read half stays with the connection task in [`crate::server`], which
//! watches [`ClientConnection::closed`] to learn when the broadcaster has
//! given up on the client.

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, MutexGuard, Notify};

use crate::tally::TallyState;

/// Type-erased outbound byte stream
pub type BoxedWriter = Pin<Box<dyn AsyncWrite + Send>>;

/// Outcome of a frame write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Frame written and flushed
    Sent,
    /// Client already has this state
    Unchanged,
}

/// Writer half plus the last state this client was told about
pub struct FrameWriter {
    inner: BoxedWriter,
    last_sent: Option<TallyState>,
}

impl FrameWriter {
    /// Write `frame` unless the client already holds `state`
    ///
    /// Skipping repeats keeps the on-connect push and a concurrent
    /// broadcast from delivering the same state twice.
    pub async fn send(&mut self, state: TallyState, frame: &[u8]) -> std::io::Result<WriteOutcome> {
        if self.last_sent == Some(state) {
            return Ok(WriteOutcome::Unchanged);
        }

        self.inner.write_all(frame).await?;
        self.inner.flush().await?;
        self.last_sent = Some(state);

        Ok(WriteOutcome::Sent)
    }

    /// Write `preamble` then `frame`, even if the client already holds `state`
    ///
    /// Used to answer client requests.
    pub async fn resend(
        &mut self,
        state: TallyState,
        preamble: &[u8],
        frame: &[u8],
    ) -> std::io::Result<()> {
        self.inner.write_all(preamble).await?;
        self.inner.write_all(frame).await?;
        self.inner.flush().await?;
        self.last_sent = Some(state);

        Ok(())
    }

    /// Last state successfully written
    pub fn last_sent(&self) -> Option<TallyState> {
        self.last_sent
    }

    /// Shut down the outbound stream
    pub async fn shutdown(&mut self) -> std::io::Result<()> {
        self.inner.shutdown().await
    }
}

/// A tally client registered with the server
pub struct ClientConnection {
    /// Unique session ID
    id: u64,

    /// Remote peer address
    peer_addr: SocketAddr,

    /// Registry key (`ip:port` of the peer)
    identity: String,

    writer: Mutex<FrameWriter>,

    closed: AtomicBool,
    close_notify: Notify,

    /// When the client connected
    pub connected_at: Instant,
}

impl ClientConnection {
    /// Wrap an outbound stream
    pub fn new<W>(id: u64, peer_addr: SocketAddr, writer: W) -> Self
    where
        W: AsyncWrite + Send + 'static,
    {
        Self {
            id,
            peer_addr,
            identity: peer_addr.to_string(),
            writer: Mutex::new(FrameWriter {
                inner: Box::pin(writer),
                last_sent: None,
            }),
            closed: AtomicBool::new(false),
            close_notify: Notify::new(),
            connected_at: Instant::now(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Lock the writer
    ///
    /// Writes to one client are serialized through this lock.
    pub async fn writer(&self) -> MutexGuard<'_, FrameWriter> {
        self.writer.lock().await
    }

    /// Write a frame with an upper bound on the whole operation
    ///
    /// Waiting for the writer lock counts against the timeout.
    pub async fn send_frame(
        &self,
        state: TallyState,
        frame: &[u8],
        timeout: Duration,
    ) -> std::io::Result<WriteOutcome> {
        let write = async {
            let mut writer = self.writer.lock().await;
            writer.send(state, frame).await
        };

        match tokio::time::timeout(timeout, write).await {
            Ok(result) => result,
            Err(_) => Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "tally frame write timed out",
            )),
        }
    }

    /// Signal the connection task to stop
    ///
    /// Idempotent.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            // notify_one stores a permit if the task is not waiting yet
            self.close_notify.notify_one();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Resolves once [`close`](Self::close) has been called
    pub async fn closed(&self) {
        if self.is_closed() {
            return;
        }
        self.close_notify.notified().await;
    }

    /// How long the client has been connected
    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}
