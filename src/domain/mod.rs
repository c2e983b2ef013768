//! Domain types for the journal exporter.
//!
//! This module contains the core data structures:
//! - Records: Directories and entries, plus their placed (path-annotated) forms
//! - Events: Progress and failure notifications
//! - Report: Per-run outcome with structural issues and failures

pub mod events;
pub mod records;
pub mod report;

// Re-export commonly used types
pub use events::{EventKind, ExportEvent, ExportObserver, RecordingObserver, Stage, TracingObserver};
pub use records::{Directory, Entry, PlacedDirectory, PlacedEntry};
pub use report::{ExportReport, Failure, FailureKind, RecordStream, Severity, StructuralIssue};
