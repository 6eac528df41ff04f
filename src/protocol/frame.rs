//! Outbound tally frames
//!
//! Every frame is a single line of ASCII. The token set is fixed per
//! deployment:
//!
//! ```text
//! State     word        numeric   vmix
//! OFF       "OFF\n"     "0\n"     "TALLY OK 0\r\n"
//! PREVIEW   "PREVIEW\n" "1\n"     "TALLY OK 2\r\n"
//! PROGRAM   "PROGRAM\n" "2\n"     "TALLY OK 1\r\n"
//! ```
//!
//! The `vmix` encoding mimics the vMix TCP API (one input, so one digit):
//! `SUBSCRIBE TALLY` is acknowledged with `SUBSCRIBE OK TALLY` and a `TALLY`
//! query is answered with the current frame.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;

use crate::tally::TallyState;

const VMIX_SUBSCRIBE_ACK: &[u8] = b"SUBSCRIBE OK TALLY\r\n";

/// Frame encoding used on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameEncoding {
    /// `OFF` / `PREVIEW` / `PROGRAM`
    #[default]
    Word,
    /// `0` / `1` / `2`
    Numeric,
    /// vMix TCP API: `TALLY OK <digit>`, 1 = program, 2 = preview
    Vmix,
}

impl FrameEncoding {
    /// Encode a state into a frame
    ///
    /// Frames are static, so the returned `Bytes` never allocates.
    pub fn encode(&self, state: TallyState) -> Bytes {
        let frame: &'static [u8] = match (self, state) {
            (FrameEncoding::Word, TallyState::Off) => b"OFF\n",
            (FrameEncoding::Word, TallyState::Preview) => b"PREVIEW\n",
            (FrameEncoding::Word, TallyState::Program) => b"PROGRAM\n",
            (FrameEncoding::Numeric, TallyState::Off) => b"0\n",
            (FrameEncoding::Numeric, TallyState::Preview) => b"1\n",
            (FrameEncoding::Numeric, TallyState::Program) => b"2\n",
            (FrameEncoding::Vmix, TallyState::Off) => b"TALLY OK 0\r\n",
            (FrameEncoding::Vmix, TallyState::Preview) => b"TALLY OK 2\r\n",
            (FrameEncoding::Vmix, TallyState::Program) => b"TALLY OK 1\r\n",
        };
        Bytes::from_static(frame)
    }

    /// Acknowledgement for a `SUBSCRIBE <topic>` line, if this encoding sends one
    pub fn subscribe_ack(&self, topic: &str) -> Option<Bytes> {
        match self {
            FrameEncoding::Vmix if topic.eq_ignore_ascii_case("TALLY") => {
                Some(Bytes::from_static(VMIX_SUBSCRIBE_ACK))
            }
            _ => None,
        }
    }

    /// Whether a `TALLY` query line is answered with the current frame
    pub fn answers_query(&self) -> bool {
        matches!(self, FrameEncoding::Vmix)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FrameEncoding::Word => "word",
            FrameEncoding::Numeric => "numeric",
            FrameEncoding::Vmix => "vmix",
        }
    }
}

impl fmt::Display for FrameEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FrameEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "word" | "text" => Ok(FrameEncoding::Word),
            "numeric" | "number" => Ok(FrameEncoding::Numeric),
            "vmix" => Ok(FrameEncoding::Vmix),
            other => Err(format!(
                "unknown frame encoding '{}' (expected 'word', 'numeric' or 'vmix')",
                other
            )),
        }
    }
}
