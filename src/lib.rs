//! journal-export - Journal record store to Markdown tree exporter
//!
//! Converts the flat folder and journal streams of a world directory into
//! a directory tree of documents with per-directory navigation files, and
//! copies the images those documents reference.
//!
//! # Architecture
//!
//! The export runs as a fixed sequence of synchronous stages:
//! - Records are loaded and filtered by publication level
//! - The directory forest is pruned and every kept node gets a path
//! - Directories and documents are written to disk
//! - Each directory gets a `README.md` linking its children
//! - Referenced assets are copied next to their documents
//!
//! # Modules
//!
//! - `core`: Pipeline stages (RecordLoader, HierarchyBuilder, TreeMaterializer,
//!   IndexBuilder, AssetResolver, Exporter)
//! - `domain`: Data structures (Directory, Entry, ExportEvent, ExportReport)
//! - `config`: Settings and config file discovery
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! journal-export --world ~/foundrydata/Data/worlds/my-world
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use config::ExportSettings;
pub use core::{ExportError, Exporter};
pub use domain::{
    Directory, Entry, ExportEvent, ExportObserver, ExportReport, RecordingObserver,
    TracingObserver,
};
