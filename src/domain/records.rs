//! Directory and entry values loaded from the record store.
//!
//! Directories reference their parent by id only. All navigation goes
//! through id lookups, so a malformed parent graph can be detected with a
//! bounded walk instead of building a cyclic ownership graph.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A folder in the journal hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directory {
    /// Unique key within the folder stream
    pub id: String,

    /// Display name, also used verbatim as a path segment
    pub name: String,

    /// Parent directory id (None for root-level directories)
    pub parent_id: Option<String>,
}

impl Directory {
    /// Create a root-level directory
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent_id: None,
        }
    }

    /// Set the parent directory id
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// A journal document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Unique key within the journal stream
    pub id: String,

    /// Document title, used as the file stem
    pub name: String,

    /// Rich text content (HTML fragments, may embed asset references)
    pub content: String,

    /// Owning directory id
    pub directory_id: Option<String>,

    /// Default permission ordinal
    pub visibility: i64,
}

impl Entry {
    /// Create an entry inside a directory with empty content
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        directory_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            content: String::new(),
            directory_id: Some(directory_id.into()),
            visibility: 0,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_visibility(mut self, visibility: i64) -> Self {
        self.visibility = visibility;
        self
    }

    /// Whether the entry clears the publication threshold
    pub fn is_published(&self, threshold: i64) -> bool {
        self.visibility >= threshold
    }
}

/// A retained directory with its on-disk location
#[derive(Debug, Clone)]
pub struct PlacedDirectory {
    pub directory: Directory,
    pub materialized_path: PathBuf,
}

impl PlacedDirectory {
    pub fn path(&self) -> &Path {
        &self.materialized_path
    }
}

/// A retained entry with the file it is written to
#[derive(Debug, Clone)]
pub struct PlacedEntry {
    pub entry: Entry,
    pub export_path: PathBuf,
}

impl PlacedEntry {
    pub fn path(&self) -> &Path {
        &self.export_path
    }

    /// Directory that holds the exported document
    pub fn export_dir(&self) -> &Path {
        self.export_path.parent().unwrap_or(Path::new(""))
    }
}
