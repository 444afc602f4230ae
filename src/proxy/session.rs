//! Session assembly and the reconnection supervisor.
//!
//! A session binds one upgraded client connection to a sequence of backend
//! generations. In steady state three tasks run: the two forwarding tasks
//! of the current generation, and the supervisor below consuming their
//! faults. Generations never overlap; the faulted pair is cancelled and
//! joined before a replacement is installed.

use std::future::Future;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::WebSocket;
use axum::http::HeaderMap;
use futures_util::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::ProxyConfig;
use crate::net::SessionPermit;
use crate::observability::metrics;
use crate::proxy::dial;
use crate::proxy::forward::{self, Fault, FaultKind, FaultSender, ForwardContext};
use crate::proxy::link::ClientLink;
use crate::proxy::slot::{BackendSlot, Generation};

/// Margin on top of the write deadline when joining a generation's tasks; a
/// task can be mid-write to a stalled peer when its scope is cancelled.
const JOIN_MARGIN: Duration = Duration::from_millis(100);

/// The lifecycle of one accepted client connection and its (possibly
/// reconnected) backend counterpart.
pub struct Session {
    id: Uuid,
    peer: SocketAddr,
    config: Arc<ProxyConfig>,
    scope: CancellationToken,
    client: Arc<ClientLink>,
    slot: BackendSlot,
    faults: FaultSender,
    tasks: Vec<JoinHandle<()>>,
    headers: HeaderMap,
    _permit: SessionPermit,
}

impl Session {
    /// Drive one upgraded client connection until it terminates.
    pub async fn run(
        socket: WebSocket,
        peer: SocketAddr,
        headers: HeaderMap,
        config: Arc<ProxyConfig>,
        scope: CancellationToken,
        permit: SessionPermit,
    ) {
        let id = Uuid::new_v4();
        let client = Arc::new(ClientLink::new(socket, config.deadlines.write));
        let (faults, fault_rx) = FaultSender::channel(scope.clone());
        let slot = BackendSlot::new(scope.clone(), config.deadlines.quiescence);

        metrics::record_session_opened();
        tracing::info!(session = %id, peer = %peer, "session opened");

        let mut session = Self {
            id,
            peer,
            config,
            scope,
            client,
            slot,
            faults,
            tasks: Vec::new(),
            headers,
            _permit: permit,
        };

        let dial_timeout = session.config.reconnect.dial_timeout;
        let link = match dial::dial(&session.config, &session.headers, dial_timeout).await {
            Ok(link) => link,
            Err(e) => {
                tracing::warn!(session = %id, error = %e, "initial backend dial failed");
                session
                    .client
                    .send_event(&session.config.events.disconnected)
                    .await;
                session.client.close().await;
                metrics::record_session_closed();
                return;
            }
        };

        let generation = match session.slot.install(link).await {
            Ok(generation) => generation,
            Err(_) => {
                session.client.close().await;
                metrics::record_session_closed();
                return;
            }
        };

        session
            .client
            .send_event(&session.config.events.connected)
            .await;
        session.spawn_forwarders(&generation);
        session.supervise(fault_rx).await;
        session.teardown().await;
    }

    /// Launch the forwarding pair for a freshly installed generation.
    fn spawn_forwarders(&mut self, generation: &Arc<Generation>) {
        let ctx = ForwardContext {
            client: self.client.clone(),
            generation: generation.clone(),
            session: self.scope.clone(),
            faults: self.faults.clone(),
            deadlines: self.config.deadlines,
        };
        self.tasks.push(spawn_guarded(
            forward::backend_reader(ctx.clone()),
            self.faults.clone(),
            generation.id(),
        ));
        self.tasks.push(spawn_guarded(
            forward::client_reader(ctx),
            self.faults.clone(),
            generation.id(),
        ));
    }

    /// Consume faults until the session ends, swapping in a fresh backend
    /// generation for each accepted fault.
    async fn supervise(&mut self, mut faults: mpsc::Receiver<Fault>) {
        loop {
            let fault = tokio::select! {
                _ = self.scope.cancelled() => return,
                fault = faults.recv() => match fault {
                    Some(fault) => fault,
                    None => return,
                },
            };

            if self.scope.is_cancelled() {
                return;
            }
            let Some(current) = self.slot.snapshot().await else {
                return;
            };
            if fault.generation != current.id() {
                tracing::debug!(
                    session = %self.id,
                    stale = fault.generation,
                    current = current.id(),
                    "stale fault ignored"
                );
                continue;
            }

            tracing::warn!(
                session = %self.id,
                kind = fault.kind.as_str(),
                detail = %fault.message,
                "backend generation faulted"
            );

            // Quiesce the faulted pair before announcing the outage; its
            // tasks must not race the swap.
            current.cancel();
            self.join_tasks().await;

            self.client
                .send_event(&self.config.events.disconnected)
                .await;

            let deadline = Instant::now() + self.config.reconnect.dial_timeout;
            let link = match dial::reconnect(&self.config, &self.headers, deadline).await {
                Ok(link) => link,
                Err(e) => {
                    metrics::record_reconnect(false);
                    tracing::warn!(session = %self.id, error = %e, "reconnection failed, ending session");
                    return;
                }
            };

            if self.scope.is_cancelled() {
                link.close(CloseCode::Normal, "").await;
                return;
            }

            let generation = match self.slot.replace(link).await {
                Ok(generation) => generation,
                Err(_) => return,
            };

            self.client.send_event(&self.config.events.connected).await;
            self.spawn_forwarders(&generation);
            metrics::record_reconnect(true);
            tracing::info!(
                session = %self.id,
                generation = generation.id(),
                "backend connection restored"
            );
        }
    }

    /// Wait for the current generation's tasks to exit, aborting any that
    /// outlive the join bound.
    async fn join_tasks(&mut self) {
        let bound = self.config.deadlines.write + JOIN_MARGIN;
        for mut task in self.tasks.drain(..) {
            match timeout(bound, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.is_cancelled() => {}
                Ok(Err(e)) => {
                    tracing::error!(session = %self.id, error = %e, "forwarding task failed")
                }
                Err(_) => task.abort(),
            }
        }
    }

    /// Deterministic drain: cancel everything, close both links, release
    /// the session slot.
    async fn teardown(mut self) {
        self.scope.cancel();
        self.slot.close().await;
        self.join_tasks().await;
        self.client.close().await;
        metrics::record_session_closed();
        tracing::info!(session = %self.id, peer = %self.peer, "session closed");
    }
}

/// Run a forwarding task, converting a panic inside the WebSocket stack
/// into an ordinary fault instead of letting it propagate.
fn spawn_guarded(
    task: impl Future<Output = ()> + Send + 'static,
    faults: FaultSender,
    generation: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if AssertUnwindSafe(task).catch_unwind().await.is_err() {
            faults.publish(Fault {
                generation,
                kind: FaultKind::TaskPanic,
                message: "forwarding task panicked".to_string(),
            });
        }
    })
}
