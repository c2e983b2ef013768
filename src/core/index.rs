//! Per-directory navigation manifests.
//!
//! Children are visited in materialization order (directories first, then
//! documents). The first child seen for a directory truncates its manifest
//! and writes the header; the handle stays open for the rest of the stage,
//! so each manifest is opened once per run.
//!
//! Files left behind by an earlier run are not listed unless the current
//! run materializes them again.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use crate::domain::{EventKind, ExportEvent, ExportObserver, Failure, FailureKind, Stage};

use super::materializer::{report, Materialized};

/// Manifest being written; `None` once opening it has failed
struct Manifest {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

pub struct IndexBuilder<'a> {
    export_root: &'a Path,
    collection: &'a str,
    index_file: &'a str,
    document_extension: &'a str,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(
        export_root: &'a Path,
        collection: &'a str,
        index_file: &'a str,
        document_extension: &'a str,
    ) -> Self {
        Self {
            export_root,
            collection,
            index_file,
            document_extension,
        }
    }

    /// Write manifests for every directory with materialized children.
    ///
    /// Returns the manifests that were created, in creation order.
    pub fn build(
        &self,
        materialized: &Materialized<'_>,
        observer: &mut dyn ExportObserver,
        failures: &mut Vec<Failure>,
    ) -> Vec<PathBuf> {
        let children = materialized
            .directories
            .iter()
            .map(|d| (d.path(), false))
            .chain(materialized.documents.iter().map(|e| (e.path(), true)));

        let mut manifests: Vec<Manifest> = Vec::new();
        let mut by_dir: HashMap<PathBuf, usize> = HashMap::new();
        // Colliding records share one file on disk and get one link.
        let mut linked: HashSet<&Path> = HashSet::new();

        for (child, is_document) in children {
            if !linked.insert(child) {
                continue;
            }
            let (Some(parent), Some(file_name)) = (child.parent(), child.file_name()) else {
                continue;
            };
            let file_name = file_name.to_string_lossy();

            let slot = match by_dir.get(parent) {
                Some(&slot) => slot,
                None => {
                    let manifest = self.open(parent, observer, failures);
                    manifests.push(manifest);
                    by_dir.insert(parent.to_path_buf(), manifests.len() - 1);
                    manifests.len() - 1
                }
            };

            let manifest = &mut manifests[slot];
            let Some(writer) = manifest.writer.as_mut() else {
                continue;
            };

            let display = if is_document {
                self.document_title(&file_name)
            } else {
                file_name.as_ref()
            };
            let line = link_line(display, &file_name);

            match writer.write_all(line.as_bytes()) {
                Ok(()) => observer.on_event(
                    &ExportEvent::new(Stage::Index, EventKind::IndexLinked)
                        .with_subject(display)
                        .with_path(&manifest.path),
                ),
                Err(e) => {
                    manifest.writer = None;
                    report(
                        observer,
                        failures,
                        Failure::new(FailureKind::WriteIndex, &manifest.path, e),
                    );
                }
            }
        }

        let mut written = Vec::new();
        for manifest in manifests {
            let Some(mut writer) = manifest.writer else {
                continue;
            };
            match writer.flush() {
                Ok(()) => written.push(manifest.path),
                Err(e) => report(
                    observer,
                    failures,
                    Failure::new(FailureKind::WriteIndex, &manifest.path, e),
                ),
            }
        }

        written
    }

    /// Create (truncate) a manifest and write its header
    fn open(
        &self,
        dir: &Path,
        observer: &mut dyn ExportObserver,
        failures: &mut Vec<Failure>,
    ) -> Manifest {
        let path = dir.join(self.index_file);
        let header = format!("Journal Entries for `{}`:\n", self.heading(dir));

        let opened = File::create(&path).and_then(|file| {
            let mut writer = BufWriter::new(file);
            writer.write_all(header.as_bytes())?;
            Ok(writer)
        });

        match opened {
            Ok(writer) => {
                observer.on_event(
                    &ExportEvent::new(Stage::Index, EventKind::IndexCreated).with_path(&path),
                );
                Manifest {
                    path,
                    writer: Some(writer),
                }
            }
            Err(e) => {
                report(observer, failures, Failure::new(FailureKind::WriteIndex, &path, e));
                Manifest { path, writer: None }
            }
        }
    }

    /// Collection name followed by the directory's path below the export root
    pub fn heading(&self, dir: &Path) -> String {
        let mut heading = self.collection.to_string();
        if let Ok(relative) = dir.strip_prefix(self.export_root) {
            for component in relative.components() {
                if let Component::Normal(segment) = component {
                    heading.push('/');
                    heading.push_str(&segment.to_string_lossy());
                }
            }
        }
        heading
    }

    /// Document file name without its extension
    pub fn document_title<'n>(&self, file_name: &'n str) -> &'n str {
        file_name
            .strip_suffix(self.document_extension)
            .and_then(|stem| stem.strip_suffix('.'))
            .unwrap_or(file_name)
    }
}

/// Markdown list item linking to a sibling file
pub fn link_line(display: &str, file_name: &str) -> String {
    format!("- [{}]({})\n", display, urlencoding::encode(file_name))
}
