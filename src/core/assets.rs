//! Finds asset references in document content and copies the files.
//!
//! References are the `src="..."` attributes of embedded markup. Each one
//! is percent-decoded, resolved under the source root (the world path cut
//! at its last `Data` ancestor) and copied next to the document under the
//! same relative sub-path. Every asset is independent: one failure never
//! stops the others.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::domain::{
    EventKind, ExportEvent, ExportObserver, Failure, FailureKind, PlacedEntry, Stage,
};

use super::materializer::report;

static ASSET_SRC: OnceLock<Regex> = OnceLock::new();

fn asset_src() -> &'static Regex {
    ASSET_SRC.get_or_init(|| Regex::new(r#"src="([^"]*)""#).expect("asset pattern is valid"))
}

/// Errors resolving or copying a single asset
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Reference `{reference}` is not valid percent-encoded UTF-8")]
    Decode { reference: String },

    #[error("Reference `{reference}` points outside the export tree")]
    UnsafeAssetPath { reference: String },

    #[error("World path {} has no `{marker}` ancestor to resolve assets against", .world.display())]
    NoSourceRoot { world: PathBuf, marker: String },

    #[error("Failed to create {}: {source}", .path.display())]
    CreateDirectory { path: PathBuf, source: io::Error },

    #[error("Failed to copy {} to {}: {source}", .from.display(), .to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
}

impl AssetError {
    fn kind(&self) -> FailureKind {
        match self {
            AssetError::Decode { .. }
            | AssetError::UnsafeAssetPath { .. }
            | AssetError::NoSourceRoot { .. } => FailureKind::ResolveAsset,
            AssetError::CreateDirectory { .. } | AssetError::Copy { .. } => FailureKind::CopyAsset,
        }
    }
}

/// All distinct, non-empty `src` values in order of first appearance
pub fn extract_references(content: &str) -> Vec<&str> {
    let mut references: Vec<&str> = Vec::new();
    for captures in asset_src().captures_iter(content) {
        if let Some(m) = captures.get(1) {
            let reference = m.as_str();
            if !reference.is_empty() && !references.contains(&reference) {
                references.push(reference);
            }
        }
    }
    references
}

/// Percent-decode a reference and normalize separators to the host's.
///
/// Absolute references and `..` segments are rejected.
pub fn decode_reference(reference: &str) -> Result<PathBuf, AssetError> {
    let decoded = urlencoding::decode(reference).map_err(|_| AssetError::Decode {
        reference: reference.to_string(),
    })?;

    let unsafe_path = || AssetError::UnsafeAssetPath {
        reference: reference.to_string(),
    };

    if decoded.starts_with('/') || decoded.starts_with('\\') {
        return Err(unsafe_path());
    }

    let mut path = PathBuf::new();
    for segment in decoded.split(['/', '\\']).filter(|s| !s.is_empty() && *s != ".") {
        if segment == ".." {
            return Err(unsafe_path());
        }
        path.push(segment);
    }

    // Catches drive prefixes and anything else the host treats as rooted.
    let relative = path
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if path.as_os_str().is_empty() || !relative {
        return Err(unsafe_path());
    }

    Ok(path)
}

/// Truncate the world path at (and including) its last `marker` component
pub fn source_root(world: &Path, marker: &str) -> Option<PathBuf> {
    let components: Vec<Component<'_>> = world.components().collect();
    let last = components.iter().rposition(|c| c.as_os_str() == marker)?;
    Some(components[..=last].iter().collect())
}

pub struct AssetResolver {
    world: PathBuf,
    marker: String,
    source_root: Option<PathBuf>,
}

impl AssetResolver {
    pub fn new(world: impl Into<PathBuf>, marker: impl Into<String>) -> Self {
        let world = world.into();
        let marker = marker.into();
        let source_root = source_root(&world, &marker);
        Self {
            world,
            marker,
            source_root,
        }
    }

    pub fn source_root(&self) -> Option<&Path> {
        self.source_root.as_deref()
    }

    /// Absolute source location of a decoded reference
    pub fn resolve(&self, relative: &Path) -> Result<PathBuf, AssetError> {
        let root = self.source_root.as_ref().ok_or_else(|| AssetError::NoSourceRoot {
            world: self.world.clone(),
            marker: self.marker.clone(),
        })?;
        Ok(root.join(relative))
    }

    /// Copy every asset referenced by the given documents.
    ///
    /// Returns the number of assets copied.
    pub fn copy_all(
        &self,
        documents: &[&PlacedEntry],
        observer: &mut dyn ExportObserver,
        failures: &mut Vec<Failure>,
    ) -> usize {
        documents
            .iter()
            .map(|placed| self.copy_for_entry(placed, observer, failures))
            .sum()
    }

    /// Copy the assets referenced by one document
    pub fn copy_for_entry(
        &self,
        placed: &PlacedEntry,
        observer: &mut dyn ExportObserver,
        failures: &mut Vec<Failure>,
    ) -> usize {
        let references = extract_references(&placed.entry.content);
        observer.on_event(
            &ExportEvent::new(Stage::Assets, EventKind::AssetsExtracted)
                .with_subject(&placed.entry.id)
                .with_detail(format!(
                    "extracted {} asset references from `{}`",
                    references.len(),
                    placed.entry.name
                )),
        );

        let mut copied = 0;
        for reference in references {
            match self.copy_one(placed.export_dir(), reference) {
                Ok((from, to)) => {
                    observer.on_event(
                        &ExportEvent::new(Stage::Assets, EventKind::AssetCopied)
                            .with_subject(&placed.entry.id)
                            .with_path(&to)
                            .with_detail(format!("from {}", from.display())),
                    );
                    copied += 1;
                }
                Err(e) => {
                    let target = decode_reference(reference)
                        .map(|rel| placed.export_dir().join(rel))
                        .unwrap_or_else(|_| PathBuf::from(reference));
                    report(
                        observer,
                        failures,
                        Failure::new(e.kind(), target, &e).with_subject(&placed.entry.id),
                    );
                }
            }
        }
        copied
    }

    fn copy_one(&self, export_dir: &Path, reference: &str) -> Result<(PathBuf, PathBuf), AssetError> {
        let relative = decode_reference(reference)?;
        let from = self.resolve(&relative)?;
        let to = export_dir.join(&relative);

        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).map_err(|source| AssetError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::copy(&from, &to).map_err(|source| AssetError::Copy {
            from: from.clone(),
            to: to.clone(),
            source,
        })?;

        Ok((from, to))
    }
}
