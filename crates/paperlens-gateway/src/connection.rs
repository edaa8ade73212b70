//! One persistent backend connection per document.
//!
//! Each connection runs as a spawned task that owns the socket. The manager
//! owns the receiving end of that task's event channel, so dropping a
//! connection also drops whatever it had queued.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use paperlens_schema::{ConnectionState, InboundEvent, OutboundCommand};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::endpoint::Endpoint;

pub const STATUS_CONNECTING: &str = "Connecting to the analysis backend...";
pub const STATUS_CONNECTED: &str = "Connected to the analysis backend.";
pub const STATUS_TIMEOUT: &str =
    "Connection is taking too long; check the backend address, port, or firewall.";
pub const STATUS_DISCONNECTED: &str = "Connection to the analysis backend was closed.";
pub const STATUS_FAILED: &str =
    "Connection to the analysis backend failed; check the backend address, port, or firewall.";

const EVENT_BUFFER: usize = 256;
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Everything a connection reports, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    State(ConnectionState),
    Inbound(InboundEvent),
}

struct ActiveConnection {
    document_id: String,
    cancel: CancellationToken,
    task: JoinHandle<()>,
    state: watch::Receiver<ConnectionState>,
    outbound: mpsc::UnboundedSender<String>,
    events: mpsc::Receiver<ConnectionEvent>,
    drained: bool,
}

pub struct ConnectionManager {
    endpoint: Endpoint,
    connect_timeout: Duration,
    active: Option<ActiveConnection>,
}

impl ConnectionManager {
    pub fn new(endpoint: Endpoint, connect_timeout: Duration) -> Self {
        Self {
            endpoint,
            connect_timeout,
            active: None,
        }
    }

    pub fn document_id(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.document_id.as_str())
    }

    pub fn state(&self) -> ConnectionState {
        self.active
            .as_ref()
            .map_or(ConnectionState::Idle, |active| *active.state.borrow())
    }

    /// Open a connection for `document_id`, tearing down any previous one first.
    pub async fn open(&mut self, document_id: &str) {
        self.close().await;

        let url = self.endpoint.document_ws_url(document_id);
        let cancel = CancellationToken::new();
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let link = Link {
            events: events_tx,
            state: state_tx,
            cancel: cancel.clone(),
        };
        tracing::info!(document_id, url = %url, "opening backend connection");
        let task = tokio::spawn(run_connection(
            url,
            self.connect_timeout,
            link,
            outbound_rx,
        ));

        self.active = Some(ActiveConnection {
            document_id: document_id.to_string(),
            cancel,
            task,
            state: state_rx,
            outbound: outbound_tx,
            events: events_rx,
            drained: false,
        });
    }

    /// Close the current connection, if any. Never reports a disconnect.
    pub async fn close(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        active.cancel.cancel();
        drop(active.events);
        if let Err(err) = active.task.await {
            tracing::warn!(document_id = %active.document_id, error = %err, "connection task ended abnormally");
        }
        tracing::debug!(document_id = %active.document_id, "backend connection closed");
    }

    /// Send a command if the connection is open. Returns whether it was handed off.
    pub fn send_command(&self, command: &OutboundCommand) -> bool {
        let Some(active) = &self.active else {
            return false;
        };
        if !active.state.borrow().is_open() {
            return false;
        }
        let text = match serde_json::to_string(command) {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(error = %err, "failed to encode outbound command");
                return false;
            }
        };
        active.outbound.send(text).is_ok()
    }

    /// Next event from the current connection. Pends forever when there is
    /// no connection or the connection has finished reporting.
    pub async fn next_event(&mut self) -> ConnectionEvent {
        if let Some(active) = self.active.as_mut().filter(|active| !active.drained) {
            match active.events.recv().await {
                Some(event) => return event,
                None => active.drained = true,
            }
        }
        std::future::pending().await
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            active.cancel.cancel();
        }
    }
}

struct Link {
    events: mpsc::Sender<ConnectionEvent>,
    state: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
}

impl Link {
    async fn emit(&self, event: ConnectionEvent) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.events.send(event) => sent.is_ok(),
        }
    }

    async fn status(&self, message: &str) -> bool {
        self.emit(ConnectionEvent::Inbound(InboundEvent::status(message)))
            .await
    }

    /// Publish the new state before reporting it so that sends stop immediately.
    async fn transition(&self, state: ConnectionState, message: &str) -> bool {
        self.state.send_replace(state);
        self.emit(ConnectionEvent::State(state)).await && self.status(message).await
    }
}

async fn run_connection(
    url: String,
    connect_timeout: Duration,
    link: Link,
    mut outbound: mpsc::UnboundedReceiver<String>,
) {
    if !link
        .transition(ConnectionState::Connecting, STATUS_CONNECTING)
        .await
    {
        return;
    }

    let connect = tokio_tungstenite::connect_async(url.as_str());
    tokio::pin!(connect);
    let timer = tokio::time::sleep(connect_timeout);
    tokio::pin!(timer);
    let mut timed_out = false;

    let connected = loop {
        tokio::select! {
            biased;
            _ = link.cancel.cancelled() => return,
            result = &mut connect => break result,
            _ = &mut timer, if !timed_out => {
                timed_out = true;
                tracing::warn!(url = %url, timeout_ms = connect_timeout.as_millis() as u64, "backend connection is slow to open");
                if !link.status(STATUS_TIMEOUT).await {
                    return;
                }
            }
        }
    };

    let socket = match connected {
        Ok((socket, _)) => socket,
        Err(err) => {
            tracing::warn!(url = %url, error = %err, "backend connection failed");
            link.transition(ConnectionState::Failed, STATUS_FAILED).await;
            return;
        }
    };

    if !link.transition(ConnectionState::Open, STATUS_CONNECTED).await {
        return;
    }
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            biased;
            _ = link.cancel.cancelled() => {
                link.state.send_replace(ConnectionState::Closed);
                let _ = tokio::time::timeout(CLOSE_GRACE, sink.close()).await;
                return;
            }
            Some(text) = outbound.recv() => {
                if let Err(err) = sink.send(Message::text(text)).await {
                    tracing::warn!(url = %url, error = %err, "failed to send command");
                    link.transition(ConnectionState::Failed, STATUS_FAILED).await;
                    return;
                }
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<InboundEvent>(text.as_str()) {
                        Ok(event) => {
                            tracing::trace!(kind = event.kind(), "inbound event");
                            if !link.emit(ConnectionEvent::Inbound(event)).await {
                                return;
                            }
                        }
                        Err(err) => {
                            tracing::debug!(error = %err, "dropping malformed inbound frame");
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    tracing::info!(url = %url, "backend closed the connection");
                    link.transition(ConnectionState::Closed, STATUS_DISCONNECTED).await;
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    tracing::warn!(url = %url, error = %err, "backend connection error");
                    link.transition(ConnectionState::Failed, STATUS_FAILED).await;
                    return;
                }
            },
        }
    }
}
