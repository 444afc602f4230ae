//! Deadline-bounded halves of the client and backend links.
//!
//! Both links are split and each half is guarded by its own mutex. The
//! writer mutex is the session write lock: event frames and forwarded
//! frames alike go through it, so the link sees at most one writer at a
//! time. The reader mutex exists only so successive generations of the
//! client reader can take the read half over without it being threaded
//! through the supervisor; there is never read contention.

use std::time::Duration;

use axum::extract::ws::{self, close_code, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame as TgCloseFrame;
use tokio_tungstenite::tungstenite::Message as TgMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// Socket type produced by the backend dialer.
pub(crate) type BackendSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Bound on a best-effort close frame before the link is simply dropped.
const CLOSE_DEADLINE: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub(crate) enum TransportError {
    #[error("write deadline exceeded")]
    WriteTimeout,
    #[error("client transport: {0}")]
    Client(#[from] axum::Error),
    #[error("backend transport: {0}")]
    Backend(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Outcome of one bounded read.
pub(crate) enum Incoming<M, E> {
    /// A frame arrived.
    Frame(M),
    /// The read deadline expired; a liveness check, not an error.
    TimedOut,
    /// The stream finished without a close frame.
    Ended,
    /// The transport failed.
    Failed(E),
}

/// The upgraded client WebSocket, stable for the session's lifetime.
pub(crate) struct ClientLink {
    writer: Mutex<SplitSink<WebSocket, ws::Message>>,
    reader: Mutex<SplitStream<WebSocket>>,
    write_deadline: Duration,
}

impl ClientLink {
    pub fn new(socket: WebSocket, write_deadline: Duration) -> Self {
        let (writer, reader) = socket.split();
        Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
            write_deadline,
        }
    }

    /// Read one frame with a bounded deadline.
    pub async fn recv(&self, deadline: Duration) -> Incoming<ws::Message, axum::Error> {
        let read = async { self.reader.lock().await.next().await };
        match timeout(deadline, read).await {
            Err(_) => Incoming::TimedOut,
            Ok(None) => Incoming::Ended,
            Ok(Some(Ok(frame))) => Incoming::Frame(frame),
            Ok(Some(Err(e))) => Incoming::Failed(e),
        }
    }

    /// Write one frame under the session write lock with a bounded deadline.
    pub async fn send(&self, frame: ws::Message) -> Result<(), TransportError> {
        let write = async { self.writer.lock().await.send(frame).await };
        match timeout(self.write_deadline, write).await {
            Err(_) => Err(TransportError::WriteTimeout),
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(TransportError::Client(e)),
        }
    }

    /// Send a session event frame, best effort.
    pub async fn send_event(&self, name: &str) {
        if let Err(e) = self.send(ws::Message::Text(name.to_string().into())).await {
            tracing::debug!(event = name, error = %e, "event frame dropped");
        }
    }

    /// Best-effort normal close of the client link.
    pub async fn close(&self) {
        let frame = ws::CloseFrame {
            code: close_code::NORMAL,
            reason: String::new().into(),
        };
        let write = async {
            self.writer
                .lock()
                .await
                .send(ws::Message::Close(Some(frame)))
                .await
        };
        let _ = timeout(CLOSE_DEADLINE, write).await;
    }
}

/// One dialed backend WebSocket. Owned by exactly one generation.
pub(crate) struct BackendLink {
    writer: Mutex<SplitSink<BackendSocket, TgMessage>>,
    reader: Mutex<SplitStream<BackendSocket>>,
    write_deadline: Duration,
}

impl BackendLink {
    pub fn new(socket: BackendSocket, write_deadline: Duration) -> Self {
        let (writer, reader) = socket.split();
        Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
            write_deadline,
        }
    }

    /// Read one frame with a bounded deadline.
    pub async fn recv(
        &self,
        deadline: Duration,
    ) -> Incoming<TgMessage, tokio_tungstenite::tungstenite::Error> {
        let read = async { self.reader.lock().await.next().await };
        match timeout(deadline, read).await {
            Err(_) => Incoming::TimedOut,
            Ok(None) => Incoming::Ended,
            Ok(Some(Ok(frame))) => Incoming::Frame(frame),
            Ok(Some(Err(e))) => Incoming::Failed(e),
        }
    }

    /// Write one frame with a bounded deadline.
    pub async fn send(&self, frame: TgMessage) -> Result<(), TransportError> {
        let write = async { self.writer.lock().await.send(frame).await };
        match timeout(self.write_deadline, write).await {
            Err(_) => Err(TransportError::WriteTimeout),
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(TransportError::Backend(e)),
        }
    }

    /// Best-effort close with the given status code.
    pub async fn close(&self, code: CloseCode, reason: &str) {
        let frame = TgCloseFrame {
            code,
            reason: reason.to_string().into(),
        };
        let write = async {
            self.writer
                .lock()
                .await
                .send(TgMessage::Close(Some(frame)))
                .await
        };
        let _ = timeout(CLOSE_DEADLINE, write).await;
    }
}
