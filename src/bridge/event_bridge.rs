//! Switcher event processing
//!
//! Consumes switcher events one at a time, in arrival order, and turns
//! changes of the monitored source into tally broadcasts.

use std::future::Future;
use std::sync::Arc;

use crate::broadcast::Broadcaster;
use crate::tally::{reconcile, SourceSignal, TallyState};

use super::event::{EventStream, SwitcherEvent};

/// Why [`EventBridge::run_until`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeExit {
    /// Shutdown was requested
    Shutdown,
    /// The switcher closed its event stream
    StreamEnded,
}

/// Feeds switcher events for one source into the tally state machine
pub struct EventBridge {
    source: String,
    signal: SourceSignal,
    state: TallyState,
    broadcaster: Arc<Broadcaster>,
}

impl EventBridge {
    /// Create a bridge monitoring `source`
    ///
    /// Starts in `OFF` with both flags cleared.
    pub fn new(source: impl Into<String>, broadcaster: Arc<Broadcaster>) -> Self {
        Self {
            source: source.into(),
            signal: SourceSignal::default(),
            state: TallyState::Off,
            broadcaster,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Current tally state
    pub fn state(&self) -> TallyState {
        self.state
    }

    /// Current raw flags
    pub fn signal(&self) -> SourceSignal {
        self.signal
    }

    /// Apply one event
    ///
    /// Returns the new state if the event caused a transition, in which case
    /// the transition has already been published when this returns.
    pub async fn handle_event(&mut self, event: &SwitcherEvent) -> Option<TallyState> {
        let source = match event.source() {
            Some(source) => source,
            None => {
                tracing::trace!(event = ?event, "Ignoring switcher event");
                return None;
            }
        };

        // Exact match, no normalization
        if source != self.source {
            tracing::trace!(source = %source, "Ignoring event for other source");
            return None;
        }

        match event {
            SwitcherEvent::ProgramChanged { active, .. } => self.signal.program_active = *active,
            SwitcherEvent::PreviewChanged { active, .. } => self.signal.preview_active = *active,
            SwitcherEvent::Other(_) => return None,
        }

        let (next, changed) = reconcile(
            self.state,
            self.signal.preview_active,
            self.signal.program_active,
        );

        tracing::debug!(
            source = %self.source,
            preview = self.signal.preview_active,
            program = self.signal.program_active,
            changed,
            "Source signal updated"
        );

        if !changed {
            return None;
        }

        let previous = std::mem::replace(&mut self.state, next);
        tracing::info!(
            source = %self.source,
            from = %previous,
            to = %next,
            "Tally transition"
        );

        self.broadcaster.publish(next).await;
        Some(next)
    }

    /// Process events until the stream ends
    pub async fn run(&mut self, events: &mut EventStream) -> BridgeExit {
        self.run_until(events, std::future::pending()).await
    }

    /// Process events until the stream ends or `shutdown` resolves
    ///
    /// Shutdown is only observed between events, so a publish that has
    /// started always runs to completion.
    pub async fn run_until<F>(&mut self, events: &mut EventStream, shutdown: F) -> BridgeExit
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        tracing::info!(source = %self.source, "Listening for switcher events");

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::debug!("Event bridge shutting down");
                    return BridgeExit::Shutdown;
                }
                event = events.recv() => match event {
                    Some(event) => {
                        self.handle_event(&event).await;
                    }
                    None => {
                        tracing::warn!("Switcher event stream ended");
                        return BridgeExit::StreamEnded;
                    }
                },
            }
        }
    }
}
