//! Progress and failure events emitted during an export run.
//!
//! The core never prints. Every stage reports through an [`ExportObserver`],
//! so the binary can route events to `tracing` while tests record them.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// A single event emitted by the export pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportEvent {
    /// When this event occurred (ISO 8601)
    pub timestamp: DateTime<Utc>,

    /// Pipeline stage that emitted the event
    pub stage: Stage,

    /// Type of event
    pub kind: EventKind,

    /// Id or name of the record the event is about
    pub subject: Option<String>,

    /// Filesystem path involved, if any
    pub path: Option<PathBuf>,

    /// Human-readable detail (counts, error messages)
    pub detail: Option<String>,
}

impl ExportEvent {
    /// Create a new event with the current timestamp
    pub fn new(stage: Stage, kind: EventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            stage,
            kind,
            subject: None,
            path: None,
            detail: None,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Stages of the export pipeline, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    Hierarchy,
    Materialize,
    Index,
    Assets,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Hierarchy => "hierarchy",
            Stage::Materialize => "materialize",
            Stage::Index => "index",
            Stage::Assets => "assets",
        };
        f.write_str(name)
    }
}

/// Types of events that can occur during an export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A stage has started
    StageStarted,

    /// A stage finished (detail carries a summary)
    StageCompleted,

    /// A record was turned into a directory or entry
    RecordLoaded,

    /// A folder record of another kind was dropped
    RecordSkipped,

    /// A directory exists on disk
    DirectoryCreated,

    /// An entry's content was written
    DocumentWritten,

    /// A navigation manifest was created
    IndexCreated,

    /// A link line was appended to a manifest
    IndexLinked,

    /// Asset references were extracted from one document
    AssetsExtracted,

    /// An asset was copied next to its document
    AssetCopied,

    /// A structural problem with the input was found
    StructuralIssue,

    /// A best-effort operation failed and was skipped
    OperationFailed,
}

/// Sink for export events
pub trait ExportObserver {
    fn on_event(&mut self, event: &ExportEvent);
}

/// Forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ExportObserver for TracingObserver {
    fn on_event(&mut self, event: &ExportEvent) {
        let subject = event.subject.as_deref().unwrap_or("");
        let path = event
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let detail = event.detail.as_deref().unwrap_or("");

        match event.kind {
            EventKind::StageStarted | EventKind::StageCompleted => {
                info!(stage = %event.stage, kind = ?event.kind, "{}", detail);
            }
            EventKind::DirectoryCreated
            | EventKind::DocumentWritten
            | EventKind::IndexCreated
            | EventKind::AssetCopied => {
                info!(stage = %event.stage, subject = %subject, "{:?} {}", event.kind, path);
            }
            EventKind::RecordLoaded
            | EventKind::RecordSkipped
            | EventKind::IndexLinked
            | EventKind::AssetsExtracted => {
                debug!(stage = %event.stage, subject = %subject, path = %path, "{:?} {}", event.kind, detail);
            }
            EventKind::StructuralIssue | EventKind::OperationFailed => {
                warn!(stage = %event.stage, subject = %subject, path = %path, "{}", detail);
            }
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default, Clone)]
pub struct RecordingObserver {
    pub events: Vec<ExportEvent>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events of one kind, in emission order
    pub fn of_kind(&self, kind: EventKind) -> Vec<&ExportEvent> {
        self.events.iter().filter(|e| e.kind == kind).collect()
    }
}

impl ExportObserver for RecordingObserver {
    fn on_event(&mut self, event: &ExportEvent) {
        self.events.push(event.clone());
    }
}
