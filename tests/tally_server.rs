//! End-to-end tests over real TCP sockets

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};

use simple_tally::bridge::{EventStream, Switcher, SwitcherEvent, SwitcherVersion};
use simple_tally::error::{Error, ObsError};
use simple_tally::protocol::FrameEncoding;
use simple_tally::{AppConfig, ServerConfig, TallyServer, TallyService, TallyState};

const TIMEOUT: Duration = Duration::from_secs(5);

fn local_config() -> ServerConfig {
    ServerConfig::default().bind("127.0.0.1:0".parse().unwrap())
}

async fn start_server(config: ServerConfig) -> (Arc<TallyServer>, SocketAddr) {
    let server = Arc::new(TallyServer::new(config));
    let listener = server.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();

    let task_server = Arc::clone(&server);
    tokio::spawn(async move {
        task_server
            .serve_until(listener, std::future::pending())
            .await
    });

    (server, addr)
}

async fn connect(addr: SocketAddr) -> BufReader<TcpStream> {
    BufReader::new(TcpStream::connect(addr).await.unwrap())
}

async fn read_line(client: &mut BufReader<TcpStream>) -> String {
    let mut line = String::new();
    tokio::time::timeout(TIMEOUT, client.read_line(&mut line))
        .await
        .expect("timed out waiting for frame")
        .unwrap();
    line
}

async fn assert_silent(client: &mut BufReader<TcpStream>) {
    let mut line = String::new();
    let result = tokio::time::timeout(Duration::from_millis(100), client.read_line(&mut line)).await;
    assert!(result.is_err(), "unexpected data: {:?}", line);
}

async fn wait_for_clients(server: &TallyServer, expected: usize) {
    tokio::time::timeout(TIMEOUT, async {
        while server.registry().len().await != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("registry never reached expected size");
}

#[tokio::test]
async fn late_joiner_receives_current_state_only() {
    let (server, addr) = start_server(local_config()).await;
    server.broadcaster().publish(TallyState::Program).await;

    let mut client = connect(addr).await;

    assert_eq!(read_line(&mut client).await, "PROGRAM\n");
    assert_silent(&mut client).await;
}

#[tokio::test]
async fn one_frame_per_client_per_transition() {
    let (server, addr) = start_server(local_config()).await;

    let mut clients = Vec::new();
    for _ in 0..5 {
        let mut client = connect(addr).await;
        assert_eq!(read_line(&mut client).await, "OFF\n");
        clients.push(client);
    }
    wait_for_clients(&server, 5).await;

    let report = server.broadcaster().publish(TallyState::Preview).await;
    assert_eq!(report.delivered, 5);

    for client in &mut clients {
        assert_eq!(read_line(client).await, "PREVIEW\n");
        assert_silent(client).await;
    }
}

#[tokio::test]
async fn disconnected_client_is_not_published_to() {
    let (server, addr) = start_server(local_config()).await;

    let mut stays = connect(addr).await;
    let mut leaves = connect(addr).await;
    read_line(&mut stays).await;
    read_line(&mut leaves).await;
    wait_for_clients(&server, 2).await;

    drop(leaves);
    wait_for_clients(&server, 1).await;

    let report = server.broadcaster().publish(TallyState::Program).await;
    assert_eq!(report.recipients(), 1);
    assert_eq!(report.delivered, 1);
    assert_eq!(read_line(&mut stays).await, "PROGRAM\n");
}

#[tokio::test]
async fn inbound_garbage_is_tolerated() {
    let (server, addr) = start_server(local_config().max_line_length(16)).await;

    let mut client = connect(addr).await;
    read_line(&mut client).await;

    let stream = client.get_mut();
    stream.write_all(b"SUBSCRIBE TALLY\r\n").await.unwrap();
    stream.write_all(&[0xff, 0x00, 0xfe, b'\n']).await.unwrap();
    stream.write_all(&[b'x'; 100]).await.unwrap();
    stream.write_all(b"\nPING\n").await.unwrap();
    stream.flush().await.unwrap();

    // Give the server time to chew through it
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.registry().len().await, 1);

    server.broadcaster().publish(TallyState::Preview).await;
    assert_eq!(read_line(&mut client).await, "PREVIEW\n");
}

#[tokio::test]
async fn numeric_encoding() {
    let (server, addr) = start_server(local_config().encoding(FrameEncoding::Numeric)).await;

    let mut client = connect(addr).await;
    assert_eq!(read_line(&mut client).await, "0\n");

    server.broadcaster().publish(TallyState::Program).await;
    assert_eq!(read_line(&mut client).await, "2\n");

    server.broadcaster().publish(TallyState::Preview).await;
    assert_eq!(read_line(&mut client).await, "1\n");
}

#[tokio::test]
async fn vmix_subscribe_and_query() {
    let (server, addr) = start_server(local_config().encoding(FrameEncoding::Vmix)).await;

    let mut client = connect(addr).await;
    assert_eq!(read_line(&mut client).await, "TALLY OK 0\r\n");

    client.get_mut().write_all(b"SUBSCRIBE TALLY\r\n").await.unwrap();
    assert_eq!(read_line(&mut client).await, "SUBSCRIBE OK TALLY\r\n");
    assert_eq!(read_line(&mut client).await, "TALLY OK 0\r\n");

    server.broadcaster().publish(TallyState::Program).await;
    assert_eq!(read_line(&mut client).await, "TALLY OK 1\r\n");

    client.get_mut().write_all(b"TALLY\r\n").await.unwrap();
    assert_eq!(read_line(&mut client).await, "TALLY OK 1\r\n");

    // Other topics get no acknowledgement
    client.get_mut().write_all(b"SUBSCRIBE ACTS\r\n").await.unwrap();
    assert_silent(&mut client).await;
}

#[tokio::test]
async fn word_encoding_does_not_answer_requests() {
    let (_server, addr) = start_server(local_config()).await;

    let mut client = connect(addr).await;
    assert_eq!(read_line(&mut client).await, "OFF\n");

    client
        .get_mut()
        .write_all(b"SUBSCRIBE TALLY\r\nTALLY\r\n")
        .await
        .unwrap();
    assert_silent(&mut client).await;
}

#[tokio::test]
async fn connection_limit_rejects_extra_clients() {
    let (server, addr) = start_server(local_config().max_connections(1)).await;

    let mut first = connect(addr).await;
    assert_eq!(read_line(&mut first).await, "OFF\n");

    let mut second = TcpStream::connect(addr).await.unwrap();
    let mut buf = Vec::new();
    let n = tokio::time::timeout(TIMEOUT, second.read_to_end(&mut buf))
        .await
        .unwrap()
        .unwrap_or(0);
    assert_eq!(n, 0);

    assert_eq!(server.stats().snapshot().connections_rejected, 1);
    assert_eq!(server.registry().len().await, 1);
}

#[tokio::test]
async fn shutdown_closes_clients() {
    let server = Arc::new(TallyServer::new(local_config()));
    let listener = server.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let task = {
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            server
                .serve_until(listener, async {
                    let _ = stop_rx.await;
                })
                .await
        })
    };

    let mut client = connect(addr).await;
    read_line(&mut client).await;

    stop_tx.send(()).unwrap();
    task.await.unwrap().unwrap();

    let mut rest = String::new();
    tokio::time::timeout(TIMEOUT, client.read_to_string(&mut rest))
        .await
        .unwrap()
        .unwrap();
    assert!(rest.is_empty());
    assert!(server.registry().is_empty().await);
}

#[tokio::test]
async fn bind_conflict_is_an_error() {
    let (_server, addr) = start_server(local_config()).await;

    let second = TallyServer::new(ServerConfig::with_addr(addr));
    let result = second.bind().await;

    assert!(matches!(result, Err(Error::Io(_))));
}

/// Switcher fed from a test channel
struct FakeSwitcher {
    events: Option<EventStream>,
    version_fails: bool,
    disconnected: Arc<AtomicBool>,
}

impl FakeSwitcher {
    fn new(events: EventStream, version_fails: bool) -> Self {
        Self {
            events: Some(events),
            version_fails,
            disconnected: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Switcher for FakeSwitcher {
    async fn version(&self) -> simple_tally::Result<SwitcherVersion> {
        if self.version_fails {
            return Err(ObsError::Timeout("version").into());
        }
        Ok(SwitcherVersion {
            application: "30.0.0".into(),
            protocol: "5.3.0".into(),
        })
    }

    fn subscribe(&mut self) -> simple_tally::Result<EventStream> {
        self.events
            .take()
            .ok_or_else(|| ObsError::AlreadySubscribed.into())
    }

    async fn disconnect(&self) -> simple_tally::Result<()> {
        self.disconnected.store(true, Ordering::SeqCst);
        Ok(())
    }
}

async fn bind_service() -> (TallyService, SocketAddr) {
    let service = TallyService::bind(AppConfig::new("Cam1", local_config()))
        .await
        .unwrap();
    let addr = service.local_addr().unwrap();
    (service, addr)
}

#[tokio::test]
async fn service_bridges_events_to_clients() {
    let (service, addr) = bind_service().await;
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let switcher = FakeSwitcher::new(events_rx, false);
    let disconnected = Arc::clone(&switcher.disconnected);
    let task = tokio::spawn(service.run(switcher, async {
        let _ = stop_rx.await;
    }));

    let mut client = connect(addr).await;
    assert_eq!(read_line(&mut client).await, "OFF\n");

    events_tx.send(SwitcherEvent::preview("Cam1", true)).unwrap();
    events_tx.send(SwitcherEvent::program("Cam2", true)).unwrap();
    events_tx.send(SwitcherEvent::program("Cam1", true)).unwrap();
    events_tx.send(SwitcherEvent::program("Cam1", true)).unwrap();
    events_tx.send(SwitcherEvent::program("Cam1", false)).unwrap();

    assert_eq!(read_line(&mut client).await, "PREVIEW\n");
    assert_eq!(read_line(&mut client).await, "PROGRAM\n");
    assert_eq!(read_line(&mut client).await, "PREVIEW\n");
    assert_silent(&mut client).await;

    stop_tx.send(()).unwrap();
    let stats = task.await.unwrap().unwrap();
    assert_eq!(stats.transitions, 3);
    assert_eq!(stats.connections_accepted, 1);
    assert!(disconnected.load(Ordering::SeqCst));
}

#[tokio::test]
async fn service_survives_failed_version_check() {
    let (service, addr) = bind_service().await;
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let switcher = FakeSwitcher::new(events_rx, true);
    let disconnected = Arc::clone(&switcher.disconnected);
    let task = tokio::spawn(service.run(switcher, std::future::pending()));

    let mut client = connect(addr).await;
    assert_eq!(read_line(&mut client).await, "OFF\n");

    events_tx.send(SwitcherEvent::program("Cam1", true)).unwrap();
    assert_eq!(read_line(&mut client).await, "PROGRAM\n");

    // Losing the switcher stops the service
    drop(events_tx);
    let result = task.await.unwrap();
    assert!(matches!(result, Err(Error::Obs(ObsError::ConnectionClosed))));
    assert!(disconnected.load(Ordering::SeqCst));
}
