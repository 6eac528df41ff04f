//! Tally server listener
//!
//! Handles TCP accept loop and spawns connection handlers.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::broadcast::Broadcaster;
use crate::error::Result;
use crate::registry::ConnectionRegistry;
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;
use crate::stats::TallyStats;

const ACCEPT_BACKOFF_MIN: Duration = Duration::from_millis(5);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Tally server
pub struct TallyServer {
    config: ServerConfig,
    broadcaster: Arc<Broadcaster>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl TallyServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        let broadcaster = Broadcaster::new(
            Arc::new(ConnectionRegistry::new()),
            config.encoding,
            config.write_timeout,
            Arc::new(TallyStats::new()),
        );

        Self {
            config,
            broadcaster: Arc::new(broadcaster),
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// Broadcaster feeding this server's clients
    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    /// Get a reference to the connection registry
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        self.broadcaster.registry()
    }

    pub fn stats(&self) -> &Arc<TallyStats> {
        self.broadcaster.stats()
    }

    /// Bind the listening socket
    ///
    /// A bind failure is a startup error and is not retried.
    pub async fn bind(&self) -> Result<TcpListener> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(
            component = "tally",
            addr = %listener.local_addr()?,
            encoding = %self.config.encoding,
            "Tally server listening"
        );
        Ok(listener)
    }

    /// Accept on an already bound listener until `shutdown` resolves
    ///
    /// Connected clients are closed on shutdown.
    pub async fn serve_until<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!(component = "tally", "Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        };

        drop(listener);
        self.registry().close_all().await;

        result
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        let mut consecutive_errors = 0u32;

        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    consecutive_errors = 0;
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    // Transient (e.g. EMFILE); back off and keep accepting
                    consecutive_errors = consecutive_errors.saturating_add(1);
                    let delay = accept_backoff(consecutive_errors);
                    tracing::error!(
                        component = "tally",
                        error = %e,
                        retry_in_ms = delay.as_millis() as u64,
                        "Failed to accept connection"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    self.stats().connection_rejected();
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        // Generate session ID
        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        tracing::info!(
            session_id = session_id,
            peer = %peer_addr,
            "New connection accepted"
        );

        // Configure socket
        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        self.stats().connection_accepted();

        // Spawn connection handler
        let config = self.config.clone();
        let broadcaster = Arc::clone(&self.broadcaster);

        tokio::spawn(async move {
            let _permit = permit;
            let stats = Arc::clone(broadcaster.stats());
            let mut connection =
                Connection::new(session_id, socket, peer_addr, config, broadcaster);

            if let Err(e) = connection.run().await {
                tracing::debug!(
                    session_id = session_id,
                    error = %e,
                    "Connection error"
                );
            }

            stats.connection_closed();
            tracing::info!(session_id = session_id, peer = %peer_addr, "Connection closed");
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }

        Ok(())
    }
}

/// Delay before retrying after `consecutive_errors` failed accepts
///
/// Doubles from 5ms up to 1s.
fn accept_backoff(consecutive_errors: u32) -> Duration {
    let exponent = consecutive_errors.saturating_sub(1).min(8);
    (ACCEPT_BACKOFF_MIN * 2u32.pow(exponent)).min(ACCEPT_BACKOFF_MAX)
}
