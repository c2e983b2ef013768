//! Core export logic.
//!
//! This module contains:
//! - Loader: Record streams to directories and entries
//! - Hierarchy: Pruning and path assignment
//! - Materializer: Directories and documents on disk
//! - Index: Per-directory navigation manifests
//! - Assets: Asset reference resolution and copying
//! - Exporter: Runs the stages in order

pub mod assets;
pub mod exporter;
pub mod hierarchy;
pub mod index;
pub mod loader;
pub mod materializer;

// Re-export commonly used types
pub use assets::{decode_reference, extract_references, source_root, AssetError, AssetResolver};
pub use exporter::{ExportError, Exporter};
pub use hierarchy::{Hierarchy, HierarchyBuilder, HierarchyError};
pub use index::IndexBuilder;
pub use loader::{LoadError, LoadedRecords, RecordLoader};
pub use materializer::{Materialized, TreeMaterializer};
