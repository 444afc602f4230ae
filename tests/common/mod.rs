//! Shared utilities for integration testing.

// Each test binary uses its own subset of these helpers.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::HeaderMap;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, connect_async, MaybeTlsStream, WebSocketStream};

use ws_stabilizer::config::ProxyConfig;
use ws_stabilizer::http::HttpServer;
use ws_stabilizer::lifecycle::Shutdown;

pub type ClientSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const EXPECT_DEADLINE: Duration = Duration::from_secs(5);

/// Handle on a mock echo backend.
pub struct MockBackend {
    pub addr: SocketAddr,
    accepting: Arc<AtomicBool>,
    kill: broadcast::Sender<()>,
    headers: Arc<Mutex<Vec<HeaderMap>>>,
    closes: Arc<Mutex<Vec<Option<u16>>>>,
}

impl MockBackend {
    pub fn url(&self) -> String {
        format!("ws://{}/", self.addr)
    }

    /// Refuse new sessions and abruptly drop all live ones. Accepted TCP
    /// connections are dropped before the handshake, so dial attempts fail.
    pub fn go_down(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        let _ = self.kill.send(());
    }

    /// Accept sessions again.
    pub fn come_back(&self) {
        self.accepting.store(true, Ordering::SeqCst);
    }

    /// Handshake headers of every session accepted so far.
    pub fn captured_headers(&self) -> Vec<HeaderMap> {
        self.headers.lock().unwrap().clone()
    }

    /// Close codes received from the proxy, in arrival order.
    pub fn observed_close_codes(&self) -> Vec<Option<u16>> {
        self.closes.lock().unwrap().clone()
    }
}

/// Start a mock WebSocket backend that echoes text and binary frames.
pub async fn start_mock_backend() -> MockBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepting = Arc::new(AtomicBool::new(true));
    let (kill, _) = broadcast::channel(4);
    let headers = Arc::new(Mutex::new(Vec::new()));
    let closes = Arc::new(Mutex::new(Vec::new()));

    let backend = MockBackend {
        addr,
        accepting: accepting.clone(),
        kill: kill.clone(),
        headers: headers.clone(),
        closes: closes.clone(),
    };

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            if !accepting.load(Ordering::SeqCst) {
                drop(stream);
                continue;
            }
            tokio::spawn(echo_session(
                stream,
                headers.clone(),
                closes.clone(),
                kill.subscribe(),
            ));
        }
    });

    backend
}

async fn echo_session(
    stream: TcpStream,
    headers: Arc<Mutex<Vec<HeaderMap>>>,
    closes: Arc<Mutex<Vec<Option<u16>>>>,
    mut kill: broadcast::Receiver<()>,
) {
    let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        headers.lock().unwrap().push(req.headers().clone());
        Ok(resp)
    };
    let Ok(mut socket) = accept_hdr_async(stream, callback).await else {
        return;
    };

    loop {
        tokio::select! {
            // Abrupt drop: no close handshake, the transport just vanishes.
            _ = kill.recv() => return,
            frame = socket.next() => match frame {
                Some(Ok(Message::Text(t))) => {
                    if socket.send(Message::Text(t)).await.is_err() {
                        return;
                    }
                }
                Some(Ok(Message::Binary(b))) => {
                    if socket.send(Message::Binary(b)).await.is_err() {
                        return;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    closes.lock().unwrap().push(frame.map(|f| u16::from(f.code)));
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(_)) | None => return,
            }
        }
    }
}

/// A proxy under test, serving on an ephemeral port.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
}

pub async fn start_proxy(config: ProxyConfig) -> TestProxy {
    let shutdown = Shutdown::new();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(Arc::new(config), shutdown.clone());
    tokio::spawn(async move {
        let _ = server.run(listener).await;
    });
    TestProxy { addr, shutdown }
}

/// Config with timings tightened for tests.
pub fn test_config(backend_url: &str) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.backend.url = url::Url::parse(backend_url).unwrap();
    config.reconnect.dial_timeout = Duration::from_secs(2);
    config.reconnect.retry_backoff = Duration::from_millis(50);
    config
}

/// An address nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

pub async fn connect_client(addr: SocketAddr) -> ClientSocket {
    let (socket, _) = connect_async(format!("ws://{addr}/")).await.unwrap();
    socket
}

/// Wait for the next text frame and assert its payload, skipping control
/// frames.
pub async fn expect_text(socket: &mut ClientSocket, expected: &str) {
    loop {
        let frame = tokio::time::timeout(EXPECT_DEADLINE, socket.next())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for text frame '{expected}'"))
            .unwrap_or_else(|| panic!("stream ended while waiting for '{expected}'"))
            .unwrap_or_else(|e| panic!("transport error while waiting for '{expected}': {e}"));
        match frame {
            Message::Text(t) => {
                assert_eq!(t.as_str(), expected);
                return;
            }
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("expected text '{expected}', got {other:?}"),
        }
    }
}

/// Wait until the server ends the stream, asserting no further text frames
/// arrive first.
pub async fn expect_close(socket: &mut ClientSocket) {
    loop {
        match tokio::time::timeout(EXPECT_DEADLINE, socket.next())
            .await
            .expect("timed out waiting for close")
        {
            None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
            Some(Ok(Message::Text(t))) => panic!("unexpected text frame before close: {t}"),
            Some(Ok(_)) => continue,
        }
    }
}
