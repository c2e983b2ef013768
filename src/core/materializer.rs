//! Creates the export directories and writes each entry's content.
//!
//! Only the export root is load-bearing: if it cannot be created the run
//! aborts. Every other directory and document is best-effort.

use std::fs;
use std::io;
use std::path::Path;

use crate::domain::{
    EventKind, ExportEvent, ExportObserver, Failure, FailureKind, PlacedDirectory, PlacedEntry,
    Stage,
};

use super::hierarchy::Hierarchy;

/// What actually made it to disk, in materialization order
#[derive(Debug, Default)]
pub struct Materialized<'h> {
    pub directories: Vec<&'h PlacedDirectory>,
    pub documents: Vec<&'h PlacedEntry>,
}

pub struct TreeMaterializer;

impl TreeMaterializer {
    /// Create the export root (idempotent)
    pub fn create_root(export_root: &Path) -> io::Result<()> {
        fs::create_dir_all(export_root)
    }

    /// Create every directory, then write every entry
    pub fn materialize<'h>(
        hierarchy: &'h Hierarchy,
        observer: &mut dyn ExportObserver,
        failures: &mut Vec<Failure>,
    ) -> Materialized<'h> {
        let mut materialized = Materialized::default();

        for placed in &hierarchy.directories {
            match fs::create_dir_all(placed.path()) {
                Ok(()) => {
                    observer.on_event(
                        &ExportEvent::new(Stage::Materialize, EventKind::DirectoryCreated)
                            .with_subject(&placed.directory.id)
                            .with_path(placed.path()),
                    );
                    materialized.directories.push(placed);
                }
                Err(e) => report(
                    observer,
                    failures,
                    Failure::new(FailureKind::CreateDirectory, placed.path(), e)
                        .with_subject(&placed.directory.id),
                ),
            }
        }

        for placed in &hierarchy.entries {
            match fs::write(placed.path(), &placed.entry.content) {
                Ok(()) => {
                    observer.on_event(
                        &ExportEvent::new(Stage::Materialize, EventKind::DocumentWritten)
                            .with_subject(&placed.entry.id)
                            .with_path(placed.path()),
                    );
                    materialized.documents.push(placed);
                }
                Err(e) => report(
                    observer,
                    failures,
                    Failure::new(FailureKind::WriteDocument, placed.path(), e)
                        .with_subject(&placed.entry.id),
                ),
            }
        }

        materialized
    }
}

/// Emit a failure event and keep the failure for the report
pub(crate) fn report(observer: &mut dyn ExportObserver, failures: &mut Vec<Failure>, failure: Failure) {
    let mut event = ExportEvent::new(stage_of(failure.kind), EventKind::OperationFailed)
        .with_path(&failure.path)
        .with_detail(failure.to_string());
    if let Some(subject) = &failure.subject {
        event = event.with_subject(subject);
    }
    observer.on_event(&event);
    failures.push(failure);
}

fn stage_of(kind: FailureKind) -> Stage {
    match kind {
        FailureKind::CreateDirectory | FailureKind::WriteDocument => Stage::Materialize,
        FailureKind::WriteIndex => Stage::Index,
        FailureKind::ResolveAsset | FailureKind::CopyAsset => Stage::Assets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Directory, Entry, RecordingObserver};
    use tempfile::TempDir;

    fn placed_dir(id: &str, path: &Path) -> PlacedDirectory {
        PlacedDirectory {
            directory: Directory::new(id, path.file_name().unwrap().to_string_lossy()),
            materialized_path: path.to_path_buf(),
        }
    }

    fn placed_entry(id: &str, path: &Path, content: &str) -> PlacedEntry {
        PlacedEntry {
            entry: Entry::new(id, "x", "d").with_content(content),
            export_path: path.to_path_buf(),
        }
    }

    #[test]
    fn test_writes_content_verbatim_and_overwrites() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("A");
        let doc = dir.join("Note.md");

        let hierarchy = Hierarchy {
            directories: vec![placed_dir("1", &dir)],
            entries: vec![placed_entry("10", &doc, "<p>hi</p>")],
            issues: vec![],
        };

        let mut observer = RecordingObserver::new();
        let mut failures = Vec::new();

        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(&doc, "stale content that is longer").unwrap();

        let materialized = TreeMaterializer::materialize(&hierarchy, &mut observer, &mut failures);

        assert!(failures.is_empty());
        assert_eq!(materialized.directories.len(), 1);
        assert_eq!(materialized.documents.len(), 1);
        assert_eq!(std::fs::read_to_string(&doc).unwrap(), "<p>hi</p>");
        assert_eq!(observer.of_kind(EventKind::DocumentWritten).len(), 1);
    }

    #[test]
    fn test_failures_do_not_stop_siblings() {
        let temp = TempDir::new().unwrap();
        // A regular file where a directory should go.
        let blocker = temp.path().join("Blocked");
        std::fs::write(&blocker, "").unwrap();

        let ok_dir = temp.path().join("Fine");
        let hierarchy = Hierarchy {
            directories: vec![placed_dir("1", &blocker.join("Inner")), placed_dir("2", &ok_dir)],
            entries: vec![
                placed_entry("10", &blocker.join("Inner").join("Lost.md"), "lost"),
                placed_entry("11", &ok_dir.join("Kept.md"), "kept"),
            ],
            issues: vec![],
        };

        let mut observer = RecordingObserver::new();
        let mut failures = Vec::new();
        let materialized = TreeMaterializer::materialize(&hierarchy, &mut observer, &mut failures);

        assert_eq!(materialized.directories.len(), 1);
        assert_eq!(materialized.documents.len(), 1);
        assert_eq!(materialized.documents[0].entry.id, "11");

        let kinds: Vec<_> = failures.iter().map(|f| f.kind).collect();
        assert_eq!(kinds, vec![FailureKind::CreateDirectory, FailureKind::WriteDocument]);
        assert_eq!(failures[1].subject.as_deref(), Some("10"));
        assert_eq!(observer.of_kind(EventKind::OperationFailed).len(), 2);
        assert_eq!(std::fs::read_to_string(ok_dir.join("Kept.md")).unwrap(), "kept");
    }

    #[test]
    fn test_create_root_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("Journal Export").join("World");
        TreeMaterializer::create_root(&root).unwrap();
        TreeMaterializer::create_root(&root).unwrap();
        assert!(root.is_dir());
    }
}
