//! Outcome of an export run.
//!
//! Problems come in three severities. Fatal errors abort the run and are
//! returned as `Err` (see [`crate::core::ExportError`]). Structural issues
//! and best-effort failures are collected here so callers can detect a
//! partial export without scraping logs.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// How bad a problem is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Aborts the run
    Fatal,

    /// Bad input for one entity; the entity is skipped
    Structural,

    /// One filesystem operation failed; siblings continue
    BestEffort,
}

/// Which input stream a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStream {
    Folders,
    Journal,
}

impl fmt::Display for RecordStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordStream::Folders => write!(f, "folder"),
            RecordStream::Journal => write!(f, "journal"),
        }
    }
}

/// Problems with the input data, reported per offending entity
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructuralIssue {
    #[error("Malformed {stream} record at line {line}: {reason}")]
    MalformedRecord {
        stream: RecordStream,
        line: usize,
        reason: String,
    },

    #[error("Entry {entry_id} references unknown directory {directory_id:?}")]
    DanglingDirectoryReference {
        entry_id: String,
        directory_id: Option<String>,
    },

    #[error("Directory {directory_id} references unknown parent {parent_id}")]
    MissingParent {
        directory_id: String,
        parent_id: String,
    },

    #[error("Entry {entry_id} belongs to directory {directory_id}, which has no path to a root")]
    DetachedEntry {
        entry_id: String,
        directory_id: String,
    },

    #[error("Path {} is claimed by {ids:?}; the last one wins", .path.display())]
    PathCollision { path: PathBuf, ids: Vec<String> },

    #[error("Entry {entry_id} would overwrite the navigation file {}; skipped", .path.display())]
    ManifestCollision { entry_id: String, path: PathBuf },

    #[error("Duplicate {stream} id {id}; only the first record is kept")]
    DuplicateId { stream: RecordStream, id: String },
}

impl StructuralIssue {
    pub fn severity(&self) -> Severity {
        Severity::Structural
    }

    /// Id of the record the issue is about, if it names one
    pub fn subject(&self) -> Option<&str> {
        match self {
            StructuralIssue::MalformedRecord { .. } | StructuralIssue::PathCollision { .. } => None,
            StructuralIssue::DanglingDirectoryReference { entry_id, .. }
            | StructuralIssue::DetachedEntry { entry_id, .. }
            | StructuralIssue::ManifestCollision { entry_id, .. } => Some(entry_id),
            StructuralIssue::MissingParent { directory_id, .. } => Some(directory_id),
            StructuralIssue::DuplicateId { id, .. } => Some(id),
        }
    }
}

/// Operation that failed during a best-effort stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    CreateDirectory,
    WriteDocument,
    WriteIndex,
    ResolveAsset,
    CopyAsset,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            FailureKind::CreateDirectory => "create directory",
            FailureKind::WriteDocument => "write document",
            FailureKind::WriteIndex => "write index",
            FailureKind::ResolveAsset => "resolve asset",
            FailureKind::CopyAsset => "copy asset",
        };
        f.write_str(op)
    }
}

/// A recoverable failure of one filesystem operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,

    /// Path the operation was acting on
    pub path: PathBuf,

    /// Entry or directory id, when the failure belongs to one
    pub subject: Option<String>,

    pub reason: String,
}

impl Failure {
    pub fn new(kind: FailureKind, path: impl AsRef<Path>, reason: impl fmt::Display) -> Self {
        Self {
            kind,
            path: path.as_ref().to_path_buf(),
            subject: None,
            reason: reason.to_string(),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn severity(&self) -> Severity {
        Severity::BestEffort
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Failed to {} `{}`: {}",
            self.kind,
            self.path.display(),
            self.reason
        )
    }
}

/// Summary of a completed export run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportReport {
    /// Unique identifier for this run
    pub run_id: Uuid,

    /// Collection (world) name
    pub collection: String,

    /// Directory the collection was exported into
    pub export_root: PathBuf,

    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    pub directories_created: usize,
    pub documents_written: usize,
    pub indexes_written: usize,
    pub assets_copied: usize,

    /// Input problems, one per offending entity
    #[serde(default)]
    pub structural: Vec<StructuralIssue>,

    /// Operations that failed and were skipped
    #[serde(default)]
    pub failures: Vec<Failure>,
}

impl ExportReport {
    pub fn new(collection: impl Into<String>, export_root: impl Into<PathBuf>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            collection: collection.into(),
            export_root: export_root.into(),
            started_at: Utc::now(),
            finished_at: None,
            directories_created: 0,
            documents_written: 0,
            indexes_written: 0,
            assets_copied: 0,
            structural: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// True when some part of the input did not make it into the export
    pub fn is_partial(&self) -> bool {
        !self.structural.is_empty() || !self.failures.is_empty()
    }

    pub fn failures_of(&self, kind: FailureKind) -> Vec<&Failure> {
        self.failures.iter().filter(|f| f.kind == kind).collect()
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// One-line summary for the console
    pub fn summary(&self) -> String {
        format!(
            "{} directories, {} documents, {} indexes, {} assets; {} structural issues, {} failures",
            self.directories_created,
            self.documents_written,
            self.indexes_written,
            self.assets_copied,
            self.structural.len(),
            self.failures.len()
        )
    }
}
