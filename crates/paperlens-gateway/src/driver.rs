//! Session driver: one task that multiplexes the backend connection and the
//! three pacing timers onto a single `Session`.

use std::time::Duration;

use anyhow::{anyhow, Result};
use paperlens_core::{Applied, AppConfig, Session, SessionView};
use paperlens_schema::{ConnectionState, OutboundCommand};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::connection::{ConnectionEvent, ConnectionManager};
use crate::endpoint::Endpoint;

const COMMAND_BUFFER: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    OpenDocument(String),
    StartAnalysis,
    Shutdown,
}

#[derive(Debug, Clone, Default)]
pub struct DriverOptions {
    /// Request analysis automatically the first time a document's connection opens.
    pub auto_start: bool,
}

/// Owner-side handle to a running session driver.
pub struct SessionHandle {
    id: Uuid,
    commands: mpsc::Sender<SessionCommand>,
    view: watch::Receiver<SessionView>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn open_document(&self, document_id: impl Into<String>) -> Result<()> {
        self.send(SessionCommand::OpenDocument(document_id.into()))
            .await
    }

    pub async fn start_analysis(&self) -> Result<()> {
        self.send(SessionCommand::StartAnalysis).await
    }

    pub async fn send(&self, command: SessionCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow!("session driver has stopped"))
    }

    /// Sender usable from other tasks (e.g. the TUI key loop).
    pub fn commands(&self) -> mpsc::Sender<SessionCommand> {
        self.commands.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the driver, close the connection and wait for the task to exit.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.commands.try_send(SessionCommand::Shutdown);
        self.cancel.cancel();
        self.task
            .await
            .map_err(|err| anyhow!("session driver task failed: {err}"))
    }
}

pub fn spawn_session(config: &AppConfig, endpoint: Endpoint, options: DriverOptions) -> SessionHandle {
    let id = Uuid::new_v4();
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
    let session = Session::new(config);
    let (view_tx, view_rx) = watch::channel(session.view());
    let cancel = CancellationToken::new();

    let driver = SessionDriver {
        session,
        connection: ConnectionManager::new(endpoint, config.backend.connect_timeout()),
        preview: Pacer::new(config.pacing.preview_tick()),
        reveal: Pacer::new(config.pacing.reveal_tick()),
        progress: Pacer::new(config.pacing.progress_tick()),
        commands: commands_rx,
        view: view_tx,
        cancel: cancel.clone(),
        auto_start: options.auto_start,
        auto_started: false,
    };
    let task = tokio::spawn(driver.run().instrument(tracing::info_span!("session", id = %id)));

    SessionHandle {
        id,
        commands: commands_tx,
        view: view_rx,
        cancel,
        task,
    }
}

/// Periodic tick that can be switched off. A disarmed pacer never fires.
struct Pacer {
    period: Duration,
    interval: Option<Interval>,
}

impl Pacer {
    fn new(period: Duration) -> Self {
        Self {
            period,
            interval: None,
        }
    }

    fn is_armed(&self) -> bool {
        self.interval.is_some()
    }

    /// Start ticking if not already; an armed pacer keeps its phase.
    fn arm(&mut self) {
        if self.interval.is_none() {
            let mut interval = interval_at(Instant::now() + self.period, self.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            self.interval = Some(interval);
        }
    }

    /// Start a fresh period from now.
    fn restart(&mut self) {
        self.interval = None;
        self.arm();
    }

    fn disarm(&mut self) {
        self.interval = None;
    }

    fn set(&mut self, armed: bool) {
        if armed {
            self.arm();
        } else {
            self.disarm();
        }
    }

    async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending().await,
        }
    }
}

struct SessionDriver {
    session: Session,
    connection: ConnectionManager,
    preview: Pacer,
    reveal: Pacer,
    progress: Pacer,
    commands: mpsc::Receiver<SessionCommand>,
    view: watch::Sender<SessionView>,
    cancel: CancellationToken,
    auto_start: bool,
    auto_started: bool,
}

impl SessionDriver {
    async fn run(mut self) {
        tracing::debug!("session driver started");
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                command = self.commands.recv() => match command {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                event = self.connection.next_event() => self.handle_connection_event(event),
                _ = self.preview.tick() => {
                    self.session.tick_preview();
                }
                _ = self.reveal.tick() => {
                    self.session.tick_reveal();
                }
                _ = self.progress.tick() => {
                    self.session.tick_progress();
                }
            }
            self.rearm();
            self.view.send_replace(self.session.view());
        }

        self.preview.disarm();
        self.reveal.disarm();
        self.progress.disarm();
        self.connection.close().await;
        tracing::debug!("session driver stopped");
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::OpenDocument(document_id) => {
                tracing::info!(document_id = %document_id, "opening document");
                self.session.attach_document(document_id.as_str());
                self.auto_started = false;
                self.connection.open(&document_id).await;
            }
            SessionCommand::StartAnalysis => self.start_analysis(),
            SessionCommand::Shutdown => {}
        }
    }

    fn start_analysis(&mut self) {
        if !self.session.begin_analysis() {
            tracing::debug!("analysis requested without a document");
            return;
        }
        let sent = self.connection.send_command(&OutboundCommand::analyze());
        tracing::info!(run = self.session.run(), sent, "analysis requested");
    }

    fn handle_connection_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::State(state) => {
                tracing::debug!(state = ?state, "connection state changed");
                self.session.set_connection(state);
                if state == ConnectionState::Open && self.auto_start && !self.auto_started {
                    self.auto_started = true;
                    self.start_analysis();
                }
            }
            ConnectionEvent::Inbound(event) => {
                if self.session.apply(event) == Applied::Finalized {
                    self.reveal.restart();
                }
            }
        }
    }

    fn rearm(&mut self) {
        self.preview.set(self.session.preview_pending());
        self.reveal.set(self.session.reveal_pending());
        self.progress.set(self.session.progress_pending());
        tracing::trace!(
            preview = self.preview.is_armed(),
            reveal = self.reveal.is_armed(),
            progress = self.progress.is_armed(),
            "pacers"
        );
    }
}
