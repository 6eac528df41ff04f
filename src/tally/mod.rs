//! Tally state model

pub mod state;

pub use state::{reconcile, SourceSignal, TallyState};
