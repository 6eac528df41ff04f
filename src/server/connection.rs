//! Per-client connection task
//!
//! Registers the client, pushes the current tally, then reads until the
//! client goes away or the broadcaster gives up on it. Client lines are
//! logged; vMix-style subscriptions and queries are answered.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use crate::broadcast::Broadcaster;
use crate::error::Result;
use crate::protocol::{ClientMessage, LineDecoder};
use crate::registry::ClientConnection;
use crate::server::config::ServerConfig;

/// A single tally client session
pub struct Connection {
    session_id: u64,
    peer_addr: SocketAddr,
    socket: Option<TcpStream>,
    config: ServerConfig,
    broadcaster: Arc<Broadcaster>,
}

impl Connection {
    pub fn new(
        session_id: u64,
        socket: TcpStream,
        peer_addr: SocketAddr,
        config: ServerConfig,
        broadcaster: Arc<Broadcaster>,
    ) -> Self {
        Self {
            session_id,
            peer_addr,
            socket: Some(socket),
            config,
            broadcaster,
        }
    }

    /// Run the session to completion
    ///
    /// The client is always deregistered before this returns.
    pub async fn run(&mut self) -> Result<()> {
        let socket = match self.socket.take() {
            Some(socket) => socket,
            None => return Ok(()),
        };

        let (mut reader, writer) = socket.into_split();
        let client = Arc::new(ClientConnection::new(self.session_id, self.peer_addr, writer));

        let result = self.serve(&client, &mut reader).await;

        self.broadcaster.registry().remove_connection(&client).await;
        client.close();
        tracing::debug!(
            session_id = self.session_id,
            connected_secs = client.duration().as_secs(),
            "Client deregistered"
        );
        // Best effort FIN; the peer may already be gone
        let _ = tokio::time::timeout(self.config.write_timeout, async {
            client.writer().await.shutdown().await
        })
        .await;

        result
    }

    async fn serve<R>(&self, client: &Arc<ClientConnection>, reader: &mut R) -> Result<()>
    where
        R: tokio::io::AsyncRead + Unpin,
    {
        self.broadcaster.attach(client).await?;

        let mut decoder = LineDecoder::new(self.config.max_line_length);
        let mut buf = vec![0u8; self.config.read_buffer_size.max(1)];

        loop {
            tokio::select! {
                _ = client.closed() => {
                    tracing::debug!(session_id = self.session_id, "Connection closed by server");
                    return Ok(());
                }
                read = reader.read(&mut buf) => {
                    let n = read?;
                    if n == 0 {
                        tracing::debug!(session_id = self.session_id, "Peer closed connection");
                        return Ok(());
                    }

                    decoder.extend(&buf[..n]);
                    while let Some(message) = decoder.decode() {
                        self.on_message(client, message).await?;
                    }
                }
            }
        }
    }

    /// Log a client line, answering it if the encoding expects a reply
    async fn on_message(&self, client: &ClientConnection, message: ClientMessage) -> Result<()> {
        let encoding = self.broadcaster.encoding();

        match message {
            ClientMessage::KeepAlive => {
                tracing::trace!(session_id = self.session_id, "Keep-alive");
            }
            ClientMessage::Subscribe(topic) => {
                tracing::debug!(session_id = self.session_id, topic = %topic, "Subscribe received");
                if let Some(ack) = encoding.subscribe_ack(&topic) {
                    let state = self.broadcaster.resync(client, &ack).await?;
                    tracing::debug!(session_id = self.session_id, state = %state, "Subscription acknowledged");
                }
            }
            ClientMessage::Query => {
                tracing::debug!(session_id = self.session_id, "Tally query received");
                if encoding.answers_query() {
                    self.broadcaster.resync(client, &[]).await?;
                }
            }
            ClientMessage::Unknown(text) => {
                tracing::debug!(session_id = self.session_id, payload = %text, "Payload received");
            }
            ClientMessage::Malformed => {
                tracing::debug!(session_id = self.session_id, "Dropped non-UTF-8 line");
            }
            ClientMessage::Oversized => {
                tracing::debug!(
                    session_id = self.session_id,
                    limit = self.config.max_line_length,
                    "Dropped oversized line"
                );
            }
        }

        Ok(())
    }
}
