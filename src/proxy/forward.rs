//! The per-generation forwarding tasks.
//!
//! Two symmetric loops pump frames between the client and the backend link
//! of one generation. Each loop exits on generation or session
//! cancellation, on a peer close, or after surfacing a transport fault.
//! Faults travel through a small bounded channel to the supervisor; a full
//! channel drops the fault, since a single pending fault already forces a
//! generation swap.

use std::sync::Arc;

use axum::extract::ws;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message as TgMessage;
use tokio_util::sync::CancellationToken;

use crate::config::DeadlineConfig;
use crate::observability::metrics;
use crate::proxy::link::{ClientLink, Incoming, TransportError};
use crate::proxy::message;
use crate::proxy::slot::Generation;

/// Capacity of the fault channel.
pub(crate) const FAULT_CHANNEL_CAPACITY: usize = 8;

/// Where in the data flow a generation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FaultKind {
    BackendRead,
    BackendWrite,
    ClientRead,
    ClientWrite,
    TaskPanic,
}

impl FaultKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FaultKind::BackendRead => "backend_read",
            FaultKind::BackendWrite => "backend_write",
            FaultKind::ClientRead => "client_read",
            FaultKind::ClientWrite => "client_write",
            FaultKind::TaskPanic => "task_panic",
        }
    }
}

/// A forwarding task's report that its generation has failed.
#[derive(Debug)]
pub(crate) struct Fault {
    pub generation: u64,
    pub kind: FaultKind,
    pub message: String,
}

/// Non-blocking, cancellation-aware fault publisher.
#[derive(Clone)]
pub(crate) struct FaultSender {
    tx: mpsc::Sender<Fault>,
    session: CancellationToken,
}

impl FaultSender {
    pub fn channel(session: CancellationToken) -> (Self, mpsc::Receiver<Fault>) {
        let (tx, rx) = mpsc::channel(FAULT_CHANNEL_CAPACITY);
        (Self { tx, session }, rx)
    }

    /// Publish a fault. Discarded after session cancellation; dropped when
    /// the channel is full.
    pub fn publish(&self, fault: Fault) {
        if self.session.is_cancelled() {
            return;
        }
        if self.tx.try_send(fault).is_err() {
            tracing::debug!("fault channel full, fault dropped");
        }
    }
}

/// Everything a forwarding task needs, captured at spawn time.
#[derive(Clone)]
pub(crate) struct ForwardContext {
    pub client: Arc<ClientLink>,
    pub generation: Arc<Generation>,
    pub session: CancellationToken,
    pub faults: FaultSender,
    pub deadlines: DeadlineConfig,
}

impl ForwardContext {
    fn cancelled(&self) -> bool {
        self.session.is_cancelled() || self.generation.scope().is_cancelled()
    }

    fn fault(&self, kind: FaultKind, detail: impl Into<String>) {
        let detail = detail.into();
        tracing::debug!(
            generation = self.generation.id(),
            kind = kind.as_str(),
            detail = %detail,
            "generation fault"
        );
        metrics::record_fault(kind.as_str());
        self.faults.publish(Fault {
            generation: self.generation.id(),
            kind,
            message: detail,
        });
    }
}

/// Pump frames from the generation's backend link to the client.
pub(crate) async fn backend_reader(ctx: ForwardContext) {
    loop {
        let incoming = tokio::select! {
            _ = ctx.generation.scope().cancelled() => return,
            _ = ctx.session.cancelled() => return,
            incoming = ctx.generation.link().recv(ctx.deadlines.read) => incoming,
        };

        let frame = match incoming {
            Incoming::TimedOut => continue,
            Incoming::Ended => {
                if !ctx.cancelled() {
                    ctx.fault(FaultKind::BackendRead, "backend stream ended");
                }
                return;
            }
            Incoming::Failed(e) => {
                if !ctx.cancelled() {
                    ctx.fault(FaultKind::BackendRead, e.to_string());
                }
                return;
            }
            Incoming::Frame(TgMessage::Close(frame)) => {
                // A backend-initiated close is a fault, not something to
                // relay: the client link has to stay open for the reconnect.
                if !ctx.cancelled() {
                    let detail = match frame {
                        Some(f) => format!("backend closed: {} {}", u16::from(f.code), f.reason),
                        None => "backend closed".to_string(),
                    };
                    ctx.fault(FaultKind::BackendRead, detail);
                }
                return;
            }
            Incoming::Frame(frame) => frame,
        };

        let Some(forward) = message::into_client_message(frame) else {
            continue;
        };
        if let Err(e) = ctx.client.send(forward).await {
            if ctx.cancelled() || is_closed_client_write(&e) {
                return;
            }
            ctx.fault(FaultKind::ClientWrite, e.to_string());
            return;
        }
    }
}

/// Pump frames from the client to the generation's backend link.
///
/// A close from the client ends the whole session, not just the generation.
pub(crate) async fn client_reader(ctx: ForwardContext) {
    loop {
        let incoming = tokio::select! {
            _ = ctx.generation.scope().cancelled() => return,
            _ = ctx.session.cancelled() => return,
            incoming = ctx.client.recv(ctx.deadlines.read) => incoming,
        };

        let frame = match incoming {
            Incoming::TimedOut => continue,
            Incoming::Ended => {
                client_gone(&ctx).await;
                return;
            }
            Incoming::Failed(e) => {
                if ctx.cancelled() {
                    return;
                }
                if message::is_client_gone(&e) {
                    client_gone(&ctx).await;
                } else {
                    ctx.fault(FaultKind::ClientRead, e.to_string());
                }
                return;
            }
            Incoming::Frame(ws::Message::Close(frame)) => {
                if message::is_session_ending_close(&frame) {
                    client_gone(&ctx).await;
                } else if !ctx.cancelled() {
                    ctx.fault(FaultKind::ClientRead, format!("unexpected close: {frame:?}"));
                }
                return;
            }
            Incoming::Frame(frame) => frame,
        };

        if let Err(e) = ctx
            .generation
            .link()
            .send(message::into_backend_message(frame))
            .await
        {
            if !ctx.cancelled() {
                ctx.fault(FaultKind::BackendWrite, e.to_string());
            }
            return;
        }
    }
}

/// Terminal path: tell the backend the client went away, then cancel the
/// session so the supervisor tears everything down.
async fn client_gone(ctx: &ForwardContext) {
    tracing::debug!(generation = ctx.generation.id(), "client disconnected");
    ctx.generation
        .link()
        .close(CloseCode::Away, "client disconnected")
        .await;
    ctx.session.cancel();
}

fn is_closed_client_write(err: &TransportError) -> bool {
    match err {
        TransportError::Client(e) => message::is_closed_send(e),
        _ => false,
    }
}
