//! Service wiring
//!
//! Startup order: bind the tally listener, then (in the binary) connect to
//! the switcher, then check the link, subscribe and start bridging events.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::bridge::{BridgeExit, EventBridge, Switcher};
use crate::broadcast::Broadcaster;
use crate::error::{ObsError, Result};
use crate::server::{ServerConfig, TallyServer};
use crate::stats::StatsSnapshot;

/// Everything the service needs to run
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Name of the monitored source (exact match)
    pub source: String,
    pub server: ServerConfig,
}

impl AppConfig {
    pub fn new(source: impl Into<String>, server: ServerConfig) -> Self {
        Self {
            source: source.into(),
            server,
        }
    }
}

/// A bound tally service, ready to be attached to a switcher
pub struct TallyService {
    source: String,
    server: Arc<TallyServer>,
    listener: TcpListener,
}

impl TallyService {
    /// Bind the tally listener
    pub async fn bind(config: AppConfig) -> Result<Self> {
        let server = Arc::new(TallyServer::new(config.server));
        let listener = server.bind().await?;

        Ok(Self {
            source: config.source,
            server,
            listener,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        self.server.broadcaster()
    }

    /// Serve tally clients from `switcher` events until `shutdown` resolves
    ///
    /// A failed version check is logged and ignored. Losing the switcher's
    /// event stream stops the service and is reported as an error. The
    /// switcher is disconnected before this returns.
    pub async fn run<S, F>(self, mut switcher: S, shutdown: F) -> Result<StatsSnapshot>
    where
        S: Switcher,
        F: Future<Output = ()>,
    {
        match switcher.version().await {
            Ok(version) => tracing::info!(
                component = "obs",
                version = %version.application,
                protocol = %version.protocol,
                "Connected to switcher"
            ),
            Err(e) => tracing::error!(
                component = "obs",
                error = %e,
                "Unable to get switcher version, there may be a problem with the connection"
            ),
        }

        let mut events = switcher.subscribe()?;

        let (stop_tx, stop_rx) = watch::channel(false);
        let server_task = {
            let server = Arc::clone(&self.server);
            let listener = self.listener;
            tokio::spawn(async move { server.serve_until(listener, stopped(stop_rx)).await })
        };

        let mut bridge = EventBridge::new(self.source, Arc::clone(self.server.broadcaster()));
        let exit = bridge.run_until(&mut events, shutdown).await;

        let _ = stop_tx.send(true);
        match server_task.await {
            Ok(Err(e)) => tracing::warn!(error = %e, "Tally server stopped with error"),
            Err(e) => tracing::warn!(error = %e, "Tally server task failed"),
            Ok(Ok(())) => {}
        }

        if let Err(e) = switcher.disconnect().await {
            tracing::debug!(component = "obs", error = %e, "Switcher disconnect failed");
        }

        let stats = self.server.stats().snapshot();
        tracing::info!(
            uptime_secs = stats.uptime.as_secs(),
            connections = stats.connections_accepted,
            transitions = stats.transitions,
            frames_sent = stats.frames_sent,
            write_failures = stats.write_failures,
            "Tally service stopped"
        );

        match exit {
            BridgeExit::Shutdown => Ok(stats),
            BridgeExit::StreamEnded => Err(ObsError::ConnectionClosed.into()),
        }
    }
}

async fn stopped(mut rx: watch::Receiver<bool>) {
    // Sender dropped counts as stop too
    let _ = rx.wait_for(|stop| *stop).await;
}
