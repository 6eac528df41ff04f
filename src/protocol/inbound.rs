//! Inbound client data
//!
//! Tally clients are mostly silent, but some send keep-alives, a
//! subscription handshake or a one-shot `TALLY` query. Nothing a client
//! sends changes server state; the decoder only classifies lines so the
//! connection can log them or, for vMix clients, answer them.

use bytes::{Buf, BytesMut};

/// One line received from a tally client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Empty line, `PING` or `KEEPALIVE`
    KeepAlive,
    /// `SUBSCRIBE <topic>` handshake
    Subscribe(String),
    /// `TALLY` request for the current state
    Query,
    /// Well-formed text we do not recognize
    Unknown(String),
    /// Line that is not valid UTF-8
    Malformed,
    /// Line longer than the configured limit (discarded)
    Oversized,
}

/// Splits the inbound byte stream into lines
#[derive(Debug)]
pub struct LineDecoder {
    buf: BytesMut,
    max_line_length: usize,
    discarding: bool,
}

impl LineDecoder {
    pub fn new(max_line_length: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(max_line_length.min(4096)),
            max_line_length,
            discarding: false,
        }
    }

    /// Append received bytes
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Take the next complete line, if any
    ///
    /// Call repeatedly after [`extend`](Self::extend) until it returns `None`.
    pub fn decode(&mut self) -> Option<ClientMessage> {
        match self.buf.iter().position(|b| *b == b'\n') {
            Some(pos) => {
                let line = self.buf.split_to(pos + 1);
                if self.discarding {
                    self.discarding = false;
                    return Some(ClientMessage::Oversized);
                }
                if pos > self.max_line_length {
                    return Some(ClientMessage::Oversized);
                }
                Some(parse_line(&line[..pos]))
            }
            None => {
                // Drop the partial line but remember to swallow its tail
                if self.buf.len() > self.max_line_length {
                    self.buf.advance(self.buf.len());
                    self.discarding = true;
                }
                None
            }
        }
    }
}

fn parse_line(line: &[u8]) -> ClientMessage {
    let line = line.strip_suffix(b"\r").unwrap_or(line);

    let text = match std::str::from_utf8(line) {
        Ok(text) => text.trim(),
        Err(_) => return ClientMessage::Malformed,
    };

    if text.is_empty()
        || text.eq_ignore_ascii_case("PING")
        || text.eq_ignore_ascii_case("KEEPALIVE")
    {
        return ClientMessage::KeepAlive;
    }

    if text.eq_ignore_ascii_case("TALLY") {
        return ClientMessage::Query;
    }

    let mut parts = text.splitn(2, char::is_whitespace);
    match parts.next() {
        Some(cmd) if cmd.eq_ignore_ascii_case("SUBSCRIBE") => {
            ClientMessage::Subscribe(parts.next().unwrap_or("").trim().to_string())
        }
        _ => ClientMessage::Unknown(text.to_string()),
    }
}
