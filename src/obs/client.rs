//! obs-websocket client
//!
//! Connects, authenticates, then hands the read half of the socket to a
//! background task. That task forwards events to an unbounded channel and
//! completes pending requests by `requestId`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::bridge::{EventStream, Switcher, SwitcherEvent, SwitcherVersion};
use crate::error::{Error, ObsError, Result};

use super::config::ObsConfig;
use super::protocol::{
    auth_response, decode, encode, op, subscription, Event, Hello, Identified, Identify,
    ObsVersion, Request, RequestResponse, RPC_VERSION,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;
type PendingRequests = Arc<StdMutex<HashMap<String, oneshot::Sender<RequestResponse>>>>;

/// Connected obs-websocket session
pub struct ObsClient {
    sink: Mutex<WsSink>,
    pending: PendingRequests,
    events: StdMutex<Option<EventStream>>,
    next_request_id: AtomicU64,
    request_timeout: Duration,
    rpc_version: u32,
    server_version: String,
    reader: JoinHandle<()>,
}

impl ObsClient {
    /// Connect and complete the Hello/Identify handshake
    ///
    /// Events are buffered from this point on, so nothing is lost between
    /// connecting and [`take_events`](Self::take_events).
    pub async fn connect(config: &ObsConfig) -> Result<Self> {
        let url = config.url();
        tracing::debug!(component = "obs", url = %url, "Connecting to obs-websocket");

        let handshake = async {
            let (ws, _) = connect_async(url.as_str()).await?;
            let (mut sink, mut source) = ws.split();

            let hello: Hello = expect_op(&mut source, op::HELLO).await?;

            let authentication = match (&hello.authentication, &config.password) {
                (Some(challenge), Some(password)) => Some(auth_response(password, challenge)),
                (Some(_), None) => return Err(ObsError::AuthRequired.into()),
                (None, _) => None,
            };

            let identify = Identify {
                rpc_version: RPC_VERSION,
                authentication,
                event_subscriptions: subscription::TALLY,
            };
            sink.send(Message::Text(encode(op::IDENTIFY, &identify)?))
                .await?;

            let identified: Identified = expect_op(&mut source, op::IDENTIFIED).await?;

            Ok::<_, Error>((sink, source, hello, identified))
        };

        let (sink, source, hello, identified) =
            tokio::time::timeout(config.connect_timeout, handshake)
                .await
                .map_err(|_| ObsError::Timeout("obs-websocket handshake"))??;

        tracing::info!(
            component = "obs",
            url = %url,
            server_version = %hello.obs_web_socket_version,
            rpc_version = identified.negotiated_rpc_version,
            authenticated = hello.authentication.is_some(),
            "Identified with obs-websocket"
        );

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let pending = PendingRequests::default();
        let reader = tokio::spawn(read_loop(source, events_tx, Arc::clone(&pending)));

        Ok(Self {
            sink: Mutex::new(sink),
            pending,
            events: StdMutex::new(Some(events_rx)),
            next_request_id: AtomicU64::new(1),
            request_timeout: config.request_timeout,
            rpc_version: identified.negotiated_rpc_version,
            server_version: hello.obs_web_socket_version,
            reader,
        })
    }

    /// RPC version negotiated during Identify
    pub fn rpc_version(&self) -> u32 {
        self.rpc_version
    }

    /// obs-websocket version announced in Hello
    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    /// Send a request and wait for its response data
    pub async fn request(&self, request_type: &str, request_data: Option<Value>) -> Result<Value> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed).to_string();
        let text = encode(
            op::REQUEST,
            &Request {
                request_type: request_type.to_string(),
                request_id: request_id.clone(),
                request_data,
            },
        )?;

        let (tx, rx) = oneshot::channel();
        self.pending().insert(request_id.clone(), tx);

        let sent = self.sink.lock().await.send(Message::Text(text)).await;
        if let Err(e) = sent {
            self.pending().remove(&request_id);
            return Err(e.into());
        }

        let response = match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(ObsError::ConnectionClosed.into()),
            Err(_) => {
                self.pending().remove(&request_id);
                return Err(ObsError::Timeout("obs-websocket request").into());
            }
        };

        if !response.request_status.result {
            return Err(ObsError::RequestFailed {
                request_type: response.request_type,
                code: response.request_status.code,
                comment: response.request_status.comment,
            }
            .into());
        }

        Ok(response.response_data)
    }

    /// `GetVersion`
    pub async fn get_version(&self) -> Result<ObsVersion> {
        let data = self.request("GetVersion", None).await?;
        Ok(serde_json::from_value(data)?)
    }

    /// Take the event stream
    ///
    /// Only the first call succeeds.
    pub fn take_events(&self) -> Result<EventStream> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or_else(|| ObsError::AlreadySubscribed.into())
    }

    /// Send a close frame and shut the WebSocket down
    pub async fn close(&self) -> Result<()> {
        let close = async { self.sink.lock().await.close().await };

        tokio::time::timeout(self.request_timeout, close)
            .await
            .map_err(|_| ObsError::Timeout("obs-websocket close"))??;

        tracing::debug!(component = "obs", "obs-websocket closed");
        Ok(())
    }

    fn pending(&self) -> StdMutexGuard<'_, HashMap<String, oneshot::Sender<RequestResponse>>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for ObsClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl Switcher for ObsClient {
    async fn version(&self) -> Result<SwitcherVersion> {
        let version = self.get_version().await?;
        Ok(SwitcherVersion {
            application: version.obs_version,
            protocol: version.obs_web_socket_version,
        })
    }

    fn subscribe(&mut self) -> Result<EventStream> {
        self.take_events()
    }

    async fn disconnect(&self) -> Result<()> {
        self.close().await
    }
}

/// Read messages until the expected op code arrives
///
/// Used during the handshake only, where any other op is a protocol error.
async fn expect_op<T: DeserializeOwned>(source: &mut WsSource, expected: u8) -> Result<T> {
    loop {
        match source.next().await {
            Some(Ok(Message::Text(text))) => {
                let envelope = decode(&text)?;
                if envelope.op != expected {
                    return Err(ObsError::UnexpectedMessage(format!(
                        "op {} while waiting for op {}",
                        envelope.op, expected
                    ))
                    .into());
                }
                return Ok(serde_json::from_value(envelope.d)?);
            }
            Some(Ok(Message::Close(frame))) => return Err(close_error(frame).into()),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
            None => return Err(ObsError::ConnectionClosed.into()),
        }
    }
}

fn close_error(frame: Option<CloseFrame<'_>>) -> ObsError {
    match frame {
        Some(frame) => ObsError::Closed {
            code: frame.code.into(),
            reason: frame.reason.to_string(),
        },
        None => ObsError::ConnectionClosed,
    }
}

async fn read_loop(
    mut source: WsSource,
    events: mpsc::UnboundedSender<SwitcherEvent>,
    pending: PendingRequests,
) {
    while let Some(message) = source.next().await {
        match message {
            Ok(Message::Text(text)) => dispatch(&text, &events, &pending),
            Ok(Message::Close(frame)) => {
                tracing::warn!(component = "obs", reason = %close_error(frame), "obs-websocket closed");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(component = "obs", error = %e, "obs-websocket read failed");
                break;
            }
        }
    }

    // Dropping the senders fails every outstanding request
    pending.lock().unwrap_or_else(|e| e.into_inner()).clear();
    tracing::debug!(component = "obs", "obs-websocket reader stopped");
}

fn dispatch(text: &str, events: &mpsc::UnboundedSender<SwitcherEvent>, pending: &PendingRequests) {
    let envelope = match decode(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(component = "obs", error = %e, "Malformed obs-websocket message");
            return;
        }
    };

    match envelope.op {
        op::EVENT => match serde_json::from_value::<Event>(envelope.d) {
            Ok(event) => {
                tracing::trace!(component = "obs", event_type = %event.event_type, "Event received");
                // Receiver gone means nobody is listening any more
                let _ = events.send(event.to_switcher_event());
            }
            Err(e) => tracing::warn!(component = "obs", error = %e, "Malformed event"),
        },
        op::REQUEST_RESPONSE => match serde_json::from_value::<RequestResponse>(envelope.d) {
            Ok(response) => {
                let waiter = pending
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .remove(&response.request_id);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(response);
                    }
                    None => tracing::debug!(
                        component = "obs",
                        request_id = %response.request_id,
                        "Response for unknown request"
                    ),
                }
            }
            Err(e) => tracing::warn!(component = "obs", error = %e, "Malformed request response"),
        },
        other => tracing::trace!(component = "obs", op = other, "Ignoring message"),
    }
}
