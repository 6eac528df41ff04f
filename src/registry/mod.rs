//! Connection registry
//!
//! Tracks every connected tally client so the broadcaster can fan out state
//! changes.
//!
//! # Architecture
//!
//! ```text
//!                     Arc<ConnectionRegistry>
//!                   ┌──────────────────────────┐
//!                   │ connections: HashMap<    │
//!                   │   "ip:port",             │
//!                   │   Arc<ClientConnection>  │
//!                   │ >                        │
//!                   └────────────┬─────────────┘
//!                                │
//!        ┌───────────────────────┼───────────────────────┐
//!        │                       │                       │
//!        ▼                       ▼                       ▼
//!  [accept loop]           [Broadcaster]          [connection task]
//!  add() on connect        snapshot() per         remove_connection()
//!                          publish, remove()      on EOF / error
//!                          on failed write
//! ```
//!
//! Each `ClientConnection` keeps its own writer lock, so the registry lock is
//! only ever held for map operations and never across socket I/O.

pub mod entry;
pub mod store;

pub use entry::{BoxedWriter, ClientConnection, FrameWriter, WriteOutcome};
pub use store::ConnectionRegistry;
