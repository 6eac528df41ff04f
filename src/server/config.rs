//! Server configuration

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::protocol::FrameEncoding;

/// Default tally listener port
pub const DEFAULT_TALLY_PORT: u16 = 8099;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Upper bound for a single frame write to one client
    pub write_timeout: Duration,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Application-level read buffer size
    pub read_buffer_size: usize,

    /// Longest inbound line kept before it is discarded
    pub max_line_length: usize,

    /// Frame encoding on the wire
    pub encoding: FrameEncoding,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_TALLY_PORT)),
            max_connections: 0, // Unlimited
            write_timeout: Duration::from_secs(1),
            tcp_nodelay: true, // Tally changes should leave immediately
            read_buffer_size: 1024,
            max_line_length: 512,
            encoding: FrameEncoding::Word,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the per-write timeout
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the frame encoding
    pub fn encoding(mut self, encoding: FrameEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Set the inbound line limit
    pub fn max_line_length(mut self, len: usize) -> Self {
        self.max_line_length = len.max(1);
        self
    }
}
