//! Explicit per-session state.
//!
//! Everything the reveal engine knows about one document lives here: the
//! connection state, the single status line, the accumulated stream text and
//! its transient items, the final result and its items, and the three pacers.
//! The async driver owns one `Session` and is the only thing that mutates it.

use paperlens_schema::{ConnectionState, DisplayItem, InboundEvent, ResultPayload};

use crate::config::AppConfig;
use crate::diagram::{self, DiagramView};
use crate::materializer::materialize;
use crate::progress::{progress_target, ProgressFilter, ProgressPhase};
use crate::reveal::{ItemReveal, TextPreview};
use crate::segmenter::Segmenter;

pub const STATUS_WAITING_FOR_UPLOAD: &str = "Waiting for a paper upload...";
pub const STATUS_UPLOADED: &str = "Upload complete, waiting to start analysis...";
pub const STATUS_ANALYZING: &str = "Generating structured content...";
pub const STATUS_FINALIZED: &str = "Structured analysis complete.";

/// What an inbound event changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Status,
    Text,
    Finalized,
    Ignored,
}

#[derive(Debug, Clone)]
struct FinalResult {
    payload: ResultPayload,
    items: Vec<DisplayItem>,
}

pub struct Session {
    segmenter: Segmenter,
    document_id: Option<String>,
    connection: ConnectionState,
    status: String,
    stream_text: String,
    stream_chars: usize,
    transient: Vec<DisplayItem>,
    finalized: Option<FinalResult>,
    preview: TextPreview,
    reveal: ItemReveal,
    progress: ProgressFilter,
    run: u64,
}

impl Session {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            segmenter: Segmenter::new(&config.segmenter),
            document_id: None,
            connection: ConnectionState::Idle,
            status: STATUS_WAITING_FOR_UPLOAD.to_string(),
            stream_text: String::new(),
            stream_chars: 0,
            transient: Vec::new(),
            finalized: None,
            preview: TextPreview::new(config.pacing.preview_step_chars),
            reveal: ItemReveal::default(),
            progress: ProgressFilter::new(
                config.pacing.progress_gain,
                config.pacing.progress_epsilon,
            ),
            run: 0,
        }
    }

    /// Bind a freshly uploaded (or re-attached) document and start over.
    pub fn attach_document(&mut self, document_id: impl Into<String>) {
        self.reset_run();
        self.document_id = Some(document_id.into());
        self.connection = ConnectionState::Idle;
        self.status = STATUS_UPLOADED.to_string();
    }

    /// Reset for a new analysis run. Returns `false` when there is no document.
    pub fn begin_analysis(&mut self) -> bool {
        if self.document_id.is_none() {
            return false;
        }
        self.reset_run();
        self.status = STATUS_ANALYZING.to_string();
        true
    }

    pub fn set_connection(&mut self, state: ConnectionState) {
        self.connection = state;
    }

    pub fn apply(&mut self, event: InboundEvent) -> Applied {
        match event {
            InboundEvent::StatusChanged { message } => {
                self.status = message;
                Applied::Status
            }
            InboundEvent::TextChunk { content } => {
                if self.finalized.is_some() {
                    tracing::debug!(
                        run = self.run,
                        chars = content.chars().count(),
                        "dropping stream chunk after final result"
                    );
                    return Applied::Ignored;
                }
                self.stream_chars += content.chars().count();
                self.stream_text.push_str(&content);
                self.transient = self.segmenter.segment(&self.stream_text);
                Applied::Text
            }
            InboundEvent::ResultFinal { payload } => {
                let payload = payload.unwrap_or_default();
                let items = materialize(&payload);
                tracing::info!(run = self.run, items = items.len(), "final result received");

                self.transient.clear();
                self.reveal.restart(items.len());
                self.finalized = Some(FinalResult { payload, items });
                self.status = STATUS_FINALIZED.to_string();
                Applied::Finalized
            }
        }
    }

    pub fn tick_preview(&mut self) -> bool {
        if self.finalized.is_some() {
            return false;
        }
        self.preview.advance(self.stream_chars)
    }

    pub fn tick_reveal(&mut self) -> bool {
        if self.finalized.is_none() {
            return false;
        }
        self.reveal.advance()
    }

    pub fn tick_progress(&mut self) -> bool {
        self.progress.observe(self.progress_target());
        self.progress.step()
    }

    pub fn preview_pending(&self) -> bool {
        self.finalized.is_none() && self.preview.is_behind(self.stream_chars)
    }

    pub fn reveal_pending(&self) -> bool {
        self.finalized.is_some() && !self.reveal.is_complete()
    }

    pub fn progress_pending(&self) -> bool {
        self.progress.trails(self.progress_target())
    }

    pub fn phase(&self) -> ProgressPhase {
        if self.document_id.is_none() {
            return ProgressPhase::NoDocument;
        }
        if self.finalized.is_some() {
            return ProgressPhase::Finalized {
                displayed: self.reveal.displayed(),
                total: self.reveal.total(),
            };
        }
        if self.connection.is_open() {
            ProgressPhase::Streaming {
                shown_chars: self.preview.shown(),
            }
        } else {
            ProgressPhase::Connecting
        }
    }

    pub fn progress_target(&self) -> u8 {
        progress_target(self.phase())
    }

    pub fn document_id(&self) -> Option<&str> {
        self.document_id.as_deref()
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.is_some()
    }

    pub fn run(&self) -> u64 {
        self.run
    }

    /// Items currently on screen: every transient item while streaming, or
    /// the revealed prefix of the final items.
    pub fn visible_items(&self) -> &[DisplayItem] {
        match &self.finalized {
            Some(result) => &result.items[..self.reveal.displayed().min(result.items.len())],
            None => &self.transient,
        }
    }

    pub fn view(&self) -> SessionView {
        let diagram = self.finalized.as_ref().map(|result| {
            diagram::project(&result.payload, self.reveal.displayed(), self.reveal.total())
        });
        let preview = if self.finalized.is_some() {
            String::new()
        } else {
            self.stream_text.chars().take(self.preview.shown()).collect()
        };

        SessionView {
            run: self.run,
            document_id: self.document_id.clone(),
            connection: self.connection,
            status: self.status.clone(),
            progress: self.progress.percent(),
            progress_target: self.progress_target(),
            finalized: self.finalized.is_some(),
            items: self.visible_items().to_vec(),
            item_total: self
                .finalized
                .as_ref()
                .map_or(self.transient.len(), |result| result.items.len()),
            preview,
            diagram,
        }
    }

    fn reset_run(&mut self) {
        self.stream_text.clear();
        self.stream_chars = 0;
        self.transient.clear();
        self.finalized = None;
        self.preview.reset();
        self.reveal.reset();
        self.progress.reset();
        self.run += 1;
    }
}

/// Immutable snapshot handed to renderers.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub run: u64,
    pub document_id: Option<String>,
    pub connection: ConnectionState,
    pub status: String,
    pub progress: u8,
    pub progress_target: u8,
    pub finalized: bool,
    pub items: Vec<DisplayItem>,
    pub item_total: usize,
    pub preview: String,
    pub diagram: Option<DiagramView>,
}

impl Default for SessionView {
    fn default() -> Self {
        Self {
            run: 0,
            document_id: None,
            connection: ConnectionState::Idle,
            status: STATUS_WAITING_FOR_UPLOAD.to_string(),
            progress: 0,
            progress_target: 0,
            finalized: false,
            items: Vec::new(),
            item_total: 0,
            preview: String::new(),
            diagram: None,
        }
    }
}

impl SessionView {
    /// The single line shown above the progress bar.
    pub fn headline(&self) -> &str {
        if self.document_id.is_none() {
            "Waiting for a paper upload."
        } else if !self.connection.is_open() && !self.finalized {
            "Connecting to the analysis channel."
        } else {
            &self.status
        }
    }

    /// Final result fully on screen.
    pub fn is_complete(&self) -> bool {
        self.finalized && self.items.len() == self.item_total
    }
}
