//! Tally state machine
//!
//! The switcher reports "active in program" and "showing in preview" as two
//! separate events. This module folds them into a single tally value.

use std::fmt;

/// Tally state of the monitored source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TallyState {
    /// Source is neither live nor staged
    #[default]
    Off,
    /// Source is staged to go live next
    Preview,
    /// Source is currently live
    Program,
}

impl TallyState {
    /// Derive the tally value from the raw signals
    ///
    /// Program always wins over preview.
    pub fn from_signal(preview_active: bool, program_active: bool) -> Self {
        if program_active {
            TallyState::Program
        } else if preview_active {
            TallyState::Preview
        } else {
            TallyState::Off
        }
    }

    /// Canonical upper-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            TallyState::Off => "OFF",
            TallyState::Preview => "PREVIEW",
            TallyState::Program => "PROGRAM",
        }
    }
}

impl fmt::Display for TallyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw preview/program flags for the monitored source
///
/// The two flags arrive at different times and are never observed
/// atomically; each event updates exactly one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceSignal {
    pub preview_active: bool,
    pub program_active: bool,
}

impl SourceSignal {
    pub fn new(preview_active: bool, program_active: bool) -> Self {
        Self {
            preview_active,
            program_active,
        }
    }

    /// Tally value implied by the current flags
    pub fn tally(&self) -> TallyState {
        TallyState::from_signal(self.preview_active, self.program_active)
    }
}

/// Reconcile the current state with a fresh pair of flags
///
/// Returns the next state and whether it differs from `current`. Callers
/// notify downstream only when the second element is `true`.
pub fn reconcile(
    current: TallyState,
    preview_active: bool,
    program_active: bool,
) -> (TallyState, bool) {
    let next = TallyState::from_signal(preview_active, program_active);
    (next, next != current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconcile_truth_table() {
        let cases = [
            (false, false, TallyState::Off),
            (true, false, TallyState::Preview),
            (false, true, TallyState::Program),
            (true, true, TallyState::Program),
        ];

        for (preview, program, expected) in cases {
            let (next, _) = reconcile(TallyState::Off, preview, program);
            assert_eq!(next, expected, "preview={} program={}", preview, program);
        }
    }

    #[test]
    fn test_reconcile_ignores_prior_state() {
        for current in [TallyState::Off, TallyState::Preview, TallyState::Program] {
            assert_eq!(reconcile(current, false, false).0, TallyState::Off);
            assert_eq!(reconcile(current, true, true).0, TallyState::Program);
        }
    }

    #[test]
    fn test_reconcile_idempotent() {
        let (first, changed) = reconcile(TallyState::Off, true, false);
        assert!(changed);

        let (second, changed) = reconcile(first, true, false);
        assert_eq!(second, TallyState::Preview);
        assert!(!changed);
    }

    #[test]
    fn test_direct_jump_to_program() {
        let (next, changed) = reconcile(TallyState::Off, false, true);

        assert_eq!(next, TallyState::Program);
        assert!(changed);
    }

    #[test]
    fn test_program_to_off() {
        let (next, changed) = reconcile(TallyState::Program, false, false);

        assert_eq!(next, TallyState::Off);
        assert!(changed);
    }

    #[test]
    fn test_source_signal_tally() {
        let mut signal = SourceSignal::default();
        assert_eq!(signal.tally(), TallyState::Off);

        signal.preview_active = true;
        assert_eq!(signal.tally(), TallyState::Preview);

        signal.program_active = true;
        assert_eq!(signal.tally(), TallyState::Program);

        signal.program_active = false;
        assert_eq!(signal.tally(), TallyState::Preview);
    }

    #[test]
    fn test_display() {
        assert_eq!(TallyState::Off.to_string(), "OFF");
        assert_eq!(TallyState::Preview.to_string(), "PREVIEW");
        assert_eq!(TallyState::Program.to_string(), "PROGRAM");
        assert_eq!(TallyState::default(), TallyState::Off);
    }
}
