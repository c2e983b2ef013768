//! Prunes the directory forest and assigns filesystem paths.
//!
//! A directory is kept iff a retained entry lives in it or it is an
//! ancestor of a kept directory. Paths are `export_root/<ancestor names>/<name>`
//! for directories and `<directory path>/<entry name>.<ext>` for entries.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::{
    Directory, Entry, EventKind, ExportEvent, ExportObserver, PlacedDirectory, PlacedEntry,
    RecordStream, Stage, StructuralIssue,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HierarchyError {
    #[error("Parent chain of directory {directory_id} is cyclic")]
    CycleDetected { directory_id: String },
}

/// Where a directory's parent chain ends
#[derive(Debug, Clone, PartialEq, Eq)]
enum Chain {
    /// Indices from the forest root down to the directory itself
    Rooted(Vec<usize>),
    /// The chain reaches a parent id that was never loaded
    Detached,
}

/// Retained directories and entries with their paths
#[derive(Debug, Default)]
pub struct Hierarchy {
    pub directories: Vec<PlacedDirectory>,
    pub entries: Vec<PlacedEntry>,
    pub issues: Vec<StructuralIssue>,
}

impl Hierarchy {
    pub fn directory(&self, id: &str) -> Option<&PlacedDirectory> {
        self.directories.iter().find(|d| d.directory.id == id)
    }

    pub fn entry(&self, id: &str) -> Option<&PlacedEntry> {
        self.entries.iter().find(|e| e.entry.id == id)
    }
}

pub struct HierarchyBuilder {
    export_root: PathBuf,
    document_extension: String,
    index_file: String,
}

impl HierarchyBuilder {
    pub fn new(
        export_root: impl Into<PathBuf>,
        document_extension: impl Into<String>,
        index_file: impl Into<String>,
    ) -> Self {
        Self {
            export_root: export_root.into(),
            document_extension: document_extension.into(),
            index_file: index_file.into(),
        }
    }

    /// Prune and place. Fails only on a cyclic parent graph.
    pub fn build(
        &self,
        mut directories: Vec<Directory>,
        mut entries: Vec<Entry>,
        observer: &mut dyn ExportObserver,
    ) -> Result<Hierarchy, HierarchyError> {
        let mut issues = Vec::new();

        // Ids are unique keys: the first record with an id wins.
        keep_first(&mut directories, |d| &d.id, RecordStream::Folders, &mut issues);
        keep_first(&mut entries, |e| &e.id, RecordStream::Journal, &mut issues);

        let by_id: HashMap<&str, usize> = directories
            .iter()
            .enumerate()
            .map(|(idx, d)| (d.id.as_str(), idx))
            .collect();

        // Every chain is walked, so a cycle anywhere in the forest fails the run.
        let mut chains = Vec::with_capacity(directories.len());
        for idx in 0..directories.len() {
            chains.push(walk_chain(&directories, &by_id, idx)?);
        }

        for directory in &directories {
            if let Some(parent_id) = &directory.parent_id {
                if !by_id.contains_key(parent_id.as_str()) {
                    issues.push(StructuralIssue::MissingParent {
                        directory_id: directory.id.clone(),
                        parent_id: parent_id.clone(),
                    });
                }
            }
        }

        let paths: Vec<Option<PathBuf>> = chains
            .iter()
            .map(|chain| match chain {
                Chain::Rooted(chain) => Some(self.directory_path(&directories, chain)),
                Chain::Detached => None,
            })
            .collect();

        let mut retained = vec![false; directories.len()];
        let mut export_paths = Vec::with_capacity(entries.len());
        for entry in &entries {
            let owner = entry
                .directory_id
                .as_deref()
                .and_then(|id| by_id.get(id).copied());

            match owner.map(|idx| (idx, &chains[idx], &paths[idx])) {
                Some((_, Chain::Rooted(chain), Some(dir_path))) => {
                    let export_path =
                        dir_path.join(format!("{}.{}", entry.name, self.document_extension));
                    // The directory's navigation file owns this name.
                    if export_path == dir_path.join(&self.index_file) {
                        issues.push(StructuralIssue::ManifestCollision {
                            entry_id: entry.id.clone(),
                            path: export_path,
                        });
                        export_paths.push(None);
                        continue;
                    }
                    for &ancestor in chain {
                        retained[ancestor] = true;
                    }
                    export_paths.push(Some(export_path));
                }
                Some((idx, _, _)) => {
                    issues.push(StructuralIssue::DetachedEntry {
                        entry_id: entry.id.clone(),
                        directory_id: directories[idx].id.clone(),
                    });
                    export_paths.push(None);
                }
                None => {
                    issues.push(StructuralIssue::DanglingDirectoryReference {
                        entry_id: entry.id.clone(),
                        directory_id: entry.directory_id.clone(),
                    });
                    export_paths.push(None);
                }
            }
        }

        let placed_entries: Vec<PlacedEntry> = entries
            .into_iter()
            .zip(export_paths)
            .filter_map(|(entry, export_path)| {
                export_path.map(|export_path| PlacedEntry { entry, export_path })
            })
            .collect();

        let mut placed_directories = Vec::new();
        for ((directory, path), keep) in directories.into_iter().zip(paths).zip(retained) {
            if let (true, Some(materialized_path)) = (keep, path) {
                placed_directories.push(PlacedDirectory {
                    directory,
                    materialized_path,
                });
            }
        }

        issues.extend(collisions(
            placed_directories
                .iter()
                .map(|d| (d.materialized_path.as_path(), d.directory.id.as_str())),
        ));
        issues.extend(collisions(
            placed_entries
                .iter()
                .map(|e| (e.export_path.as_path(), e.entry.id.as_str())),
        ));

        for issue in &issues {
            let mut event = ExportEvent::new(Stage::Hierarchy, EventKind::StructuralIssue)
                .with_detail(issue.to_string());
            if let Some(subject) = issue.subject() {
                event = event.with_subject(subject);
            }
            observer.on_event(&event);
        }

        Ok(Hierarchy {
            directories: placed_directories,
            entries: placed_entries,
            issues,
        })
    }

    fn directory_path(&self, directories: &[Directory], chain: &[usize]) -> PathBuf {
        let mut path = self.export_root.clone();
        for &idx in chain {
            path.push(&directories[idx].name);
        }
        path
    }
}

/// Drop records whose id was already seen, reporting each one dropped
fn keep_first<T>(
    records: &mut Vec<T>,
    id: impl Fn(&T) -> &String,
    stream: RecordStream,
    issues: &mut Vec<StructuralIssue>,
) {
    let mut seen = HashSet::new();
    records.retain(|record| {
        let record_id = id(record);
        if seen.insert(record_id.clone()) {
            return true;
        }
        issues.push(StructuralIssue::DuplicateId {
            stream,
            id: record_id.clone(),
        });
        false
    });
}

/// Walk from a directory up to its root, bounded by the directory count
fn walk_chain(
    directories: &[Directory],
    by_id: &HashMap<&str, usize>,
    start: usize,
) -> Result<Chain, HierarchyError> {
    let mut chain = vec![start];
    let mut current = start;

    while let Some(parent_id) = &directories[current].parent_id {
        let Some(&parent) = by_id.get(parent_id.as_str()) else {
            return Ok(Chain::Detached);
        };
        if chain.len() > directories.len() {
            return Err(HierarchyError::CycleDetected {
                directory_id: directories[start].id.clone(),
            });
        }
        chain.push(parent);
        current = parent;
    }

    chain.reverse();
    Ok(Chain::Rooted(chain))
}

/// One issue per path claimed by more than one id, in first-seen order
fn collisions<'a>(items: impl Iterator<Item = (&'a Path, &'a str)>) -> Vec<StructuralIssue> {
    let mut order: Vec<&Path> = Vec::new();
    let mut claims: HashMap<&Path, Vec<String>> = HashMap::new();
    for (path, id) in items {
        let ids = claims.entry(path).or_default();
        if ids.is_empty() {
            order.push(path);
        }
        ids.push(id.to_string());
    }

    order
        .into_iter()
        .filter_map(|path| {
            let ids = claims.remove(path)?;
            (ids.len() > 1).then(|| StructuralIssue::PathCollision {
                path: path.to_path_buf(),
                ids,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RecordingObserver;

    fn build(
        directories: Vec<Directory>,
        entries: Vec<Entry>,
    ) -> Result<Hierarchy, HierarchyError> {
        let mut observer = RecordingObserver::new();
        HierarchyBuilder::new("/out/World", "md", "README.md").build(directories, entries, &mut observer)
    }

    fn published(id: &str, name: &str, dir: &str) -> Entry {
        Entry::new(id, name, dir).with_visibility(2)
    }

    #[test]
    fn test_paths_follow_ancestor_names() {
        let hierarchy = build(
            vec![
                Directory::new("1", "A"),
                Directory::new("2", "B").with_parent("1"),
                Directory::new("3", "C").with_parent("2"),
            ],
            vec![published("10", "Note", "3")],
        )
        .unwrap();

        assert_eq!(hierarchy.directories.len(), 3);
        assert_eq!(hierarchy.directory("1").unwrap().path(), Path::new("/out/World/A"));
        assert_eq!(hierarchy.directory("2").unwrap().path(), Path::new("/out/World/A/B"));
        assert_eq!(
            hierarchy.directory("3").unwrap().path(),
            Path::new("/out/World/A/B/C")
        );
        assert_eq!(
            hierarchy.entry("10").unwrap().path(),
            Path::new("/out/World/A/B/C/Note.md")
        );
        assert!(hierarchy.issues.is_empty());
    }

    #[test]
    fn test_empty_branches_are_pruned() {
        let hierarchy = build(
            vec![
                Directory::new("1", "A"),
                Directory::new("2", "Empty").with_parent("1"),
                Directory::new("3", "Lonely"),
                Directory::new("4", "Full").with_parent("1"),
                Directory::new("5", "EmptyChild").with_parent("4"),
            ],
            vec![published("10", "Note", "4")],
        )
        .unwrap();

        let ids: Vec<_> = hierarchy
            .directories
            .iter()
            .map(|d| d.directory.id.as_str())
            .collect();
        assert_eq!(ids, vec!["1", "4"]);
    }

    #[test]
    fn test_cycle_is_detected() {
        let err = build(
            vec![
                Directory::new("1", "A").with_parent("2"),
                Directory::new("2", "B").with_parent("1"),
            ],
            vec![],
        )
        .unwrap_err();

        assert_eq!(
            err,
            HierarchyError::CycleDetected {
                directory_id: "1".to_string()
            }
        );
    }

    #[test]
    fn test_self_parent_is_a_cycle() {
        let err = build(vec![Directory::new("1", "A").with_parent("1")], vec![]).unwrap_err();
        assert!(matches!(err, HierarchyError::CycleDetected { .. }));
    }

    #[test]
    fn test_dangling_directory_reference() {
        let mut orphan = published("11", "Loose", "x");
        orphan.directory_id = None;

        let hierarchy = build(
            vec![Directory::new("1", "A")],
            vec![published("10", "Lost", "missing"), orphan],
        )
        .unwrap();

        assert!(hierarchy.entries.is_empty());
        assert!(hierarchy.directories.is_empty());
        assert_eq!(
            hierarchy.issues,
            vec![
                StructuralIssue::DanglingDirectoryReference {
                    entry_id: "10".to_string(),
                    directory_id: Some("missing".to_string()),
                },
                StructuralIssue::DanglingDirectoryReference {
                    entry_id: "11".to_string(),
                    directory_id: None,
                },
            ]
        );
    }

    #[test]
    fn test_missing_parent_detaches_subtree() {
        let hierarchy = build(
            vec![
                Directory::new("2", "B").with_parent("gone"),
                Directory::new("3", "C").with_parent("2"),
            ],
            vec![published("10", "Note", "3")],
        )
        .unwrap();

        assert!(hierarchy.directories.is_empty());
        assert!(hierarchy.entries.is_empty());
        assert!(hierarchy.issues.contains(&StructuralIssue::MissingParent {
            directory_id: "2".to_string(),
            parent_id: "gone".to_string(),
        }));
        assert!(hierarchy.issues.contains(&StructuralIssue::DetachedEntry {
            entry_id: "10".to_string(),
            directory_id: "3".to_string(),
        }));
    }

    #[test]
    fn test_collisions_are_reported_not_deduplicated() {
        let hierarchy = build(
            vec![Directory::new("1", "A")],
            vec![published("10", "Note", "1"), published("11", "Note", "1")],
        )
        .unwrap();

        assert_eq!(hierarchy.entries.len(), 2);
        assert_eq!(
            hierarchy.issues,
            vec![StructuralIssue::PathCollision {
                path: PathBuf::from("/out/World/A/Note.md"),
                ids: vec!["10".to_string(), "11".to_string()],
            }]
        );
    }

    #[test]
    fn test_entry_named_like_the_manifest_is_skipped() {
        let hierarchy = build(
            vec![Directory::new("1", "A"), Directory::new("2", "B")],
            vec![
                published("10", "README", "1"),
                published("11", "Handout", "1"),
                published("12", "README", "2"),
            ],
        )
        .unwrap();

        let ids: Vec<_> = hierarchy.entries.iter().map(|e| e.entry.id.as_str()).collect();
        assert_eq!(ids, vec!["11"]);
        // B only held the skipped entry, so it is pruned.
        assert!(hierarchy.directory("2").is_none());
        assert_eq!(
            hierarchy.issues,
            vec![
                StructuralIssue::ManifestCollision {
                    entry_id: "10".to_string(),
                    path: PathBuf::from("/out/World/A/README.md"),
                },
                StructuralIssue::ManifestCollision {
                    entry_id: "12".to_string(),
                    path: PathBuf::from("/out/World/B/README.md"),
                },
            ]
        );
    }

    #[test]
    fn test_duplicate_ids_keep_the_first_record() {
        let hierarchy = build(
            vec![Directory::new("1", "A"), Directory::new("1", "Shadow")],
            vec![published("10", "Note", "1"), published("10", "Copy", "1")],
        )
        .unwrap();

        assert_eq!(hierarchy.directories.len(), 1);
        assert_eq!(hierarchy.directory("1").unwrap().path(), Path::new("/out/World/A"));
        assert_eq!(hierarchy.entries.len(), 1);
        assert_eq!(hierarchy.entry("10").unwrap().entry.name, "Note");
        assert_eq!(
            hierarchy.issues,
            vec![
                StructuralIssue::DuplicateId {
                    stream: RecordStream::Folders,
                    id: "1".to_string(),
                },
                StructuralIssue::DuplicateId {
                    stream: RecordStream::Journal,
                    id: "10".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_deep_chain_is_not_a_cycle() {
        let mut directories = vec![Directory::new("0", "d0")];
        for i in 1..50 {
            directories.push(Directory::new(i.to_string(), format!("d{}", i)).with_parent((i - 1).to_string()));
        }

        let hierarchy = build(directories, vec![published("e", "Leaf", "49")]).unwrap();
        assert_eq!(hierarchy.directories.len(), 50);
        assert!(hierarchy.entry("e").unwrap().path().ends_with("d48/d49/Leaf.md"));
    }
}
