//! Configuration for journal exports.
//!
//! Configuration sources (highest priority first):
//! 1. CLI options (applied by the caller)
//! 2. Environment variables (JOURNAL_EXPORT_OUTPUT, JOURNAL_EXPORT_CONFIG)
//! 3. Config file (.journal-export/config.yaml, then ~/.journal-export/config.yaml)
//! 4. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .journal-export/config.yaml
//! - A relative output base in a config file is relative to the project
//!   directory (the parent of .journal-export/)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

const CONFIG_DIR: &str = ".journal-export";
const CONFIG_FILE: &str = "config.yaml";

pub const ENV_OUTPUT: &str = "JOURNAL_EXPORT_OUTPUT";
pub const ENV_CONFIG: &str = "JOURNAL_EXPORT_CONFIG";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    pub version: Option<String>,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub records: RecordsConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// Directory the collection folder is created in
    pub base_dir: Option<String>,
    /// Navigation manifest file name
    pub index_file: Option<String>,
    /// Extension for exported documents (without the dot)
    pub document_extension: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordsConfig {
    /// Folder stream, relative to the world directory
    pub folders_file: Option<String>,
    /// Journal stream, relative to the world directory
    pub entries_file: Option<String>,
    /// Folder `type` that marks journal directories
    pub directory_kind: Option<String>,
    /// Minimum default permission for an entry to be exported
    pub publication_threshold: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetsConfig {
    /// Ancestor directory name that anchors asset references
    pub data_marker: Option<String>,
}

/// Record stream settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSettings {
    pub folders_file: PathBuf,
    pub entries_file: PathBuf,
    pub directory_kind: String,
    pub publication_threshold: i64,
}

impl Default for RecordSettings {
    fn default() -> Self {
        Self {
            folders_file: Path::new("data").join("folders.db"),
            entries_file: Path::new("data").join("journal.db"),
            directory_kind: "JournalEntry".to_string(),
            publication_threshold: 2,
        }
    }
}

/// Fully resolved settings for one export run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSettings {
    /// Parent of the export root (the collection folder goes inside)
    pub output_base: PathBuf,
    pub index_file: String,
    pub document_extension: String,
    pub records: RecordSettings,
    pub data_marker: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            output_base: PathBuf::from("Journal Export"),
            index_file: "README.md".to_string(),
            document_extension: "md".to_string(),
            records: RecordSettings::default(),
            data_marker: "Data".to_string(),
        }
    }
}

impl ExportSettings {
    /// Settings with a different output base
    pub fn with_output_base(mut self, output_base: impl Into<PathBuf>) -> Self {
        self.output_base = output_base.into();
        self
    }
}

/// Resolved configuration plus where it came from
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub settings: ExportSettings,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// User-wide config file in the home directory, if present
fn home_config_file() -> Option<PathBuf> {
    let path = dirs::home_dir()?.join(CONFIG_DIR).join(CONFIG_FILE);
    path.exists().then_some(path)
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Directory that relative paths in a config file are resolved against
fn project_dir(config_path: &Path) -> &Path {
    let parent = config_path.parent().unwrap_or(Path::new("."));
    match parent.file_name() {
        Some(name) if name == CONFIG_DIR => parent.parent().unwrap_or(Path::new(".")),
        _ => parent,
    }
}

/// Resolve a path that may be relative to the config file's project directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Overlay a parsed config file onto settings
fn apply_config_file(settings: &mut ExportSettings, file: ConfigFile, base_dir: &Path) {
    if let Some(base) = file.output.base_dir {
        settings.output_base = resolve_path(base_dir, &base);
    }
    if let Some(index_file) = file.output.index_file {
        settings.index_file = index_file;
    }
    if let Some(ext) = file.output.document_extension {
        settings.document_extension = ext.trim_start_matches('.').to_string();
    }

    let records = &mut settings.records;
    if let Some(folders) = file.records.folders_file {
        records.folders_file = PathBuf::from(folders);
    }
    if let Some(entries) = file.records.entries_file {
        records.entries_file = PathBuf::from(entries);
    }
    if let Some(kind) = file.records.directory_kind {
        records.directory_kind = kind;
    }
    if let Some(threshold) = file.records.publication_threshold {
        records.publication_threshold = threshold;
    }

    if let Some(marker) = file.assets.data_marker {
        settings.data_marker = marker;
    }
}

/// Load configuration from all sources.
///
/// `explicit` is a config file named on the command line; it wins over
/// discovery and must exist.
pub fn load_config(explicit: Option<&Path>) -> Result<ResolvedConfig> {
    let config_file = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var(ENV_CONFIG).ok().map(PathBuf::from))
        .or_else(find_config_file)
        .or_else(home_config_file);

    let mut settings = ExportSettings::default();

    if let Some(ref path) = config_file {
        let file = load_config_file(path)?;
        apply_config_file(&mut settings, file, project_dir(path));
    }

    if let Ok(output) = std::env::var(ENV_OUTPUT) {
        settings.output_base = PathBuf::from(output);
    }

    Ok(ResolvedConfig {
        settings,
        config_file,
    })
}
