//! Switcher events and the upstream collaborator

use std::future::Future;

use tokio::sync::mpsc;

use crate::error::Result;

/// Event delivered by the switcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitcherEvent {
    /// A source became active or inactive in program
    ProgramChanged { source: String, active: bool },
    /// A source started or stopped showing in preview
    PreviewChanged { source: String, active: bool },
    /// Anything else the switcher reports
    Other(String),
}

impl SwitcherEvent {
    pub fn program(source: impl Into<String>, active: bool) -> Self {
        SwitcherEvent::ProgramChanged {
            source: source.into(),
            active,
        }
    }

    pub fn preview(source: impl Into<String>, active: bool) -> Self {
        SwitcherEvent::PreviewChanged {
            source: source.into(),
            active,
        }
    }

    /// Source name, for events that carry one
    pub fn source(&self) -> Option<&str> {
        match self {
            SwitcherEvent::ProgramChanged { source, .. }
            | SwitcherEvent::PreviewChanged { source, .. } => Some(source),
            SwitcherEvent::Other(_) => None,
        }
    }
}

/// Receiving end of the switcher's event stream
pub type EventStream = mpsc::UnboundedReceiver<SwitcherEvent>;

/// Version details reported by the switcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitcherVersion {
    /// Switcher application version
    pub application: String,
    /// Control protocol version
    pub protocol: String,
}

/// A connected production switcher
///
/// Connecting and authenticating is the implementor's business; the tally
/// service only needs a health check and the event stream.
pub trait Switcher: Send {
    /// Query the switcher version to confirm the link is usable
    fn version(&self) -> impl Future<Output = Result<SwitcherVersion>> + Send;

    /// Take the event stream
    ///
    /// The stream is lazy, unbounded and cannot be restarted: a second call
    /// fails.
    fn subscribe(&mut self) -> Result<EventStream>;

    /// Close the link to the switcher
    ///
    /// Called once when the service stops. The link may already be gone.
    fn disconnect(&self) -> impl Future<Output = Result<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_source() {
        assert_eq!(SwitcherEvent::program("Cam1", true).source(), Some("Cam1"));
        assert_eq!(SwitcherEvent::preview("Cam2", false).source(), Some("Cam2"));
        assert_eq!(SwitcherEvent::Other("SceneCreated".into()).source(), None);
    }
}
