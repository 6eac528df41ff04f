//! Switcher to tally bridge
//!
//! ```text
//!  Switcher ──► EventStream ──► EventBridge ──► reconcile() ──► Broadcaster
//!  (OBS)        (mpsc)          (one event      (changed?)      (publish)
//!                                at a time)
//! ```

pub mod event;
pub mod event_bridge;

pub use event::{EventStream, Switcher, SwitcherEvent, SwitcherVersion};
pub use event_bridge::{BridgeExit, EventBridge};
