//! Reads the folder and journal streams of a world directory.
//!
//! Both streams are newline-delimited JSON. A line that fails to parse is
//! reported as a structural issue and loading moves on; only failing to
//! open or read a stream aborts. Lines are split as raw bytes, so invalid
//! UTF-8 fails the record it appears in and nothing else.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::config::RecordSettings;
use crate::domain::{
    Directory, Entry, EventKind, ExportEvent, ExportObserver, RecordStream, Stage,
    StructuralIssue,
};

/// Fatal errors while reading the record streams
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to open {stream} stream {}: {source}", .path.display())]
    Open {
        stream: RecordStream,
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to read {stream} stream at line {line}: {source}")]
    Read {
        stream: RecordStream,
        line: usize,
        source: io::Error,
    },
}

/// Raw folder record as stored in `folders.db`
#[derive(Debug, Deserialize)]
struct FolderRecord {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    parent: Option<String>,
}

/// Raw journal record as stored in `journal.db`
#[derive(Debug, Deserialize)]
struct JournalRecord {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    #[serde(default)]
    folder: Option<String>,
    #[serde(default)]
    content: Option<String>,
    permission: Permission,
    #[serde(default)]
    img: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Permission {
    default: i64,
}

/// Everything the loader produced
#[derive(Debug, Default)]
pub struct LoadedRecords {
    pub directories: Vec<Directory>,
    pub entries: Vec<Entry>,
    pub issues: Vec<StructuralIssue>,
}

/// Turns raw record lines into directories and entries
pub struct RecordLoader {
    settings: RecordSettings,
}

impl RecordLoader {
    pub fn new(settings: RecordSettings) -> Self {
        Self { settings }
    }

    /// Load both streams of a world directory
    pub fn load(
        &self,
        world: &Path,
        observer: &mut dyn ExportObserver,
    ) -> Result<LoadedRecords, LoadError> {
        let mut loaded = LoadedRecords::default();

        let folders = open_stream(RecordStream::Folders, &world.join(&self.settings.folders_file))?;
        loaded.directories = self.read_directories(folders, observer, &mut loaded.issues)?;

        let journal = open_stream(RecordStream::Journal, &world.join(&self.settings.entries_file))?;
        loaded.entries = self.read_entries(journal, observer, &mut loaded.issues)?;

        Ok(loaded)
    }

    /// Read directory records from a folder stream
    pub fn read_directories<R: BufRead>(
        &self,
        reader: R,
        observer: &mut dyn ExportObserver,
        issues: &mut Vec<StructuralIssue>,
    ) -> Result<Vec<Directory>, LoadError> {
        let mut directories = Vec::new();

        for (idx, line) in reader.split(b'\n').enumerate() {
            let line_no = idx + 1;
            let line = line.map_err(|source| LoadError::Read {
                stream: RecordStream::Folders,
                line: line_no,
                source,
            })?;
            if is_blank(&line) {
                continue;
            }

            match self.parse_directory(&line) {
                Ok(Some(directory)) => {
                    observer.on_event(
                        &ExportEvent::new(Stage::Load, EventKind::RecordLoaded)
                            .with_subject(&directory.id)
                            .with_detail(format!("directory `{}`", directory.name)),
                    );
                    directories.push(directory);
                }
                Ok(None) => {
                    observer.on_event(
                        &ExportEvent::new(Stage::Load, EventKind::RecordSkipped)
                            .with_detail(format!("folder line {} is not a journal directory", line_no)),
                    );
                }
                Err(e) => report_malformed(RecordStream::Folders, line_no, e, observer, issues),
            }
        }

        Ok(directories)
    }

    /// Read entry records from a journal stream
    pub fn read_entries<R: BufRead>(
        &self,
        reader: R,
        observer: &mut dyn ExportObserver,
        issues: &mut Vec<StructuralIssue>,
    ) -> Result<Vec<Entry>, LoadError> {
        let mut entries = Vec::new();

        for (idx, line) in reader.split(b'\n').enumerate() {
            let line_no = idx + 1;
            let line = line.map_err(|source| LoadError::Read {
                stream: RecordStream::Journal,
                line: line_no,
                source,
            })?;
            if is_blank(&line) {
                continue;
            }

            match self.parse_entry(&line) {
                Ok(Some(entry)) => {
                    observer.on_event(
                        &ExportEvent::new(Stage::Load, EventKind::RecordLoaded)
                            .with_subject(&entry.id)
                            .with_detail(format!("entry `{}`", entry.name)),
                    );
                    entries.push(entry);
                }
                // Unpublished entries leave no trace.
                Ok(None) => {}
                Err(e) => report_malformed(RecordStream::Journal, line_no, e, observer, issues),
            }
        }

        Ok(entries)
    }

    /// Parse one folder line. `Ok(None)` means a folder of another kind.
    pub fn parse_directory(&self, line: &[u8]) -> Result<Option<Directory>, serde_json::Error> {
        let record: FolderRecord = serde_json::from_slice(line)?;
        if record.kind != self.settings.directory_kind {
            return Ok(None);
        }

        Ok(Some(Directory {
            id: record.id,
            name: record.name,
            parent_id: record.parent,
        }))
    }

    /// Parse one journal line. `Ok(None)` means the entry is not published.
    pub fn parse_entry(&self, line: &[u8]) -> Result<Option<Entry>, serde_json::Error> {
        let record: JournalRecord = serde_json::from_slice(line)?;

        let mut content = record.content.unwrap_or_default();
        if let Some(img) = record.img.filter(|img| !img.is_empty()) {
            content.push_str(&format!("\n<p><img src=\"{}\"></p>", img));
        }

        let entry = Entry {
            id: record.id,
            name: record.name,
            content,
            directory_id: record.folder,
            visibility: record.permission.default,
        };
        Ok(entry
            .is_published(self.settings.publication_threshold)
            .then_some(entry))
    }
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

fn open_stream(stream: RecordStream, path: &Path) -> Result<BufReader<File>, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Open {
        stream,
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file))
}

fn report_malformed(
    stream: RecordStream,
    line: usize,
    error: serde_json::Error,
    observer: &mut dyn ExportObserver,
    issues: &mut Vec<StructuralIssue>,
) {
    let issue = StructuralIssue::MalformedRecord {
        stream,
        line,
        reason: error.to_string(),
    };
    observer.on_event(
        &ExportEvent::new(Stage::Load, EventKind::StructuralIssue).with_detail(issue.to_string()),
    );
    issues.push(issue);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RecordingObserver;
    use std::io::Cursor;

    fn loader() -> RecordLoader {
        RecordLoader::new(RecordSettings::default())
    }

    #[test]
    fn test_parse_journal_directory() {
        let line = r#"{"_id":"d2","name":"Places","type":"JournalEntry","parent":"d1","sort":0}"#;
        let directory = loader().parse_directory(line.as_bytes()).unwrap().unwrap();

        assert_eq!(directory.id, "d2");
        assert_eq!(directory.name, "Places");
        assert_eq!(directory.parent_id.as_deref(), Some("d1"));
    }

    #[test]
    fn test_other_folder_kinds_are_dropped() {
        let line = r#"{"_id":"a1","name":"Actors","type":"Actor","parent":null}"#;
        assert!(loader().parse_directory(line.as_bytes()).unwrap().is_none());
    }

    #[test]
    fn test_unpublished_entries_are_dropped() {
        let line = r#"{"_id":"e1","name":"GM Notes","folder":"d1","content":"secret","permission":{"default":0}}"#;
        assert!(loader().parse_entry(line.as_bytes()).unwrap().is_none());

        let line = r#"{"_id":"e2","name":"Handout","folder":"d1","content":"hi","permission":{"default":2}}"#;
        let entry = loader().parse_entry(line.as_bytes()).unwrap().unwrap();
        assert_eq!(entry.content, "hi");
        assert_eq!(entry.visibility, 2);
    }

    #[test]
    fn test_image_reference_is_appended_to_content() {
        let line = r#"{"_id":"e1","name":"Map","folder":"d1","content":"<p>Town</p>","img":"worlds/w/map%20one.png","permission":{"default":3}}"#;
        let entry = loader().parse_entry(line.as_bytes()).unwrap().unwrap();
        assert_eq!(
            entry.content,
            "<p>Town</p>\n<p><img src=\"worlds/w/map%20one.png\"></p>"
        );

        let line = r#"{"_id":"e2","name":"Plain","folder":"d1","content":"x","img":"","permission":{"default":3}}"#;
        let entry = loader().parse_entry(line.as_bytes()).unwrap().unwrap();
        assert_eq!(entry.content, "x");
    }

    #[test]
    fn test_malformed_lines_do_not_stop_the_stream() {
        let input = concat!(
            r#"{"_id":"d1","name":"A","type":"JournalEntry","parent":null}"#,
            "\n",
            "not json\n",
            "\n",
            r#"{"_id":"d2","type":"JournalEntry"}"#,
            "\n",
            r#"{"_id":"d3","name":"C","type":"JournalEntry","parent":"d1"}"#,
            "\n",
        );

        let mut observer = RecordingObserver::new();
        let mut issues = Vec::new();
        let directories = loader()
            .read_directories(Cursor::new(input), &mut observer, &mut issues)
            .unwrap();

        let ids: Vec<_> = directories.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["d1", "d3"]);
        assert_eq!(issues.len(), 2);
        assert!(matches!(
            issues[0],
            StructuralIssue::MalformedRecord { stream: RecordStream::Folders, line: 2, .. }
        ));
        assert!(matches!(issues[1], StructuralIssue::MalformedRecord { line: 4, .. }));
        assert_eq!(observer.of_kind(EventKind::StructuralIssue).len(), 2);
    }

    #[test]
    fn test_invalid_utf8_fails_only_that_record() {
        let mut input = Vec::new();
        input.extend_from_slice(
            br#"{"_id":"e1","name":"Good","folder":"d1","content":"ok","permission":{"default":2}}"#,
        );
        input.push(b'\n');
        input.extend_from_slice(br#"{"_id":"e2","name":"Bad"#);
        input.push(0xff);
        input.extend_from_slice(br#"","folder":"d1","content":"x","permission":{"default":2}}"#);
        input.push(b'\n');
        input.extend_from_slice(
            br#"{"_id":"e3","name":"Also Good","folder":"d1","content":"ok","permission":{"default":2}}"#,
        );

        let mut observer = RecordingObserver::new();
        let mut issues = Vec::new();
        let entries = loader()
            .read_entries(Cursor::new(input), &mut observer, &mut issues)
            .unwrap();

        let ids: Vec<_> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e1", "e3"]);
        assert_eq!(issues.len(), 1);
        assert!(matches!(
            issues[0],
            StructuralIssue::MalformedRecord { stream: RecordStream::Journal, line: 2, .. }
        ));
    }

    #[test]
    fn test_crlf_line_endings_parse() {
        let input = "{\"_id\":\"d1\",\"name\":\"A\",\"type\":\"JournalEntry\"}\r\n\r\n";

        let mut observer = RecordingObserver::new();
        let mut issues = Vec::new();
        let directories = loader()
            .read_directories(Cursor::new(input), &mut observer, &mut issues)
            .unwrap();

        assert_eq!(directories.len(), 1);
        assert!(issues.is_empty());
    }

    #[test]
    fn test_missing_stream_is_fatal() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut observer = RecordingObserver::new();

        let err = loader().load(temp.path(), &mut observer).unwrap_err();
        assert!(matches!(err, LoadError::Open { stream: RecordStream::Folders, .. }));
    }
}
