//! Command-line interface for journal-export.
//!
//! One run exports one world directory. Settings come from the config
//! layer and are overridden by the options given here.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use crate::config;
use crate::core::Exporter;
use crate::domain::{ExportReport, TracingObserver};

/// Exit status for fatal errors (matches clap's usage error status)
pub const EXIT_FATAL: u8 = 2;

/// journal-export - Export journal entries to a Markdown directory tree
#[derive(Parser, Debug)]
#[command(name = "journal-export")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// World directory (contains data/folders.db and data/journal.db)
    #[arg(short, long, value_name = "PATH")]
    pub world: PathBuf,

    /// Directory to create the collection folder in (overrides JOURNAL_EXPORT_OUTPUT)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Write a JSON report of the run to this file
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Config file to use instead of the discovered one
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Execute the export
    pub fn execute(self) -> Result<ExportReport> {
        let resolved = config::load_config(self.config.as_deref())?;
        if let Some(path) = &resolved.config_file {
            info!(config = %path.display(), "Using config file");
        }

        let mut settings = resolved.settings;
        if let Some(output) = self.output {
            settings.output_base = output;
        }

        let exporter = Exporter::new(settings);
        let mut observer = TracingObserver;
        let report = exporter
            .run(&self.world, &mut observer)
            .with_context(|| format!("Journal export of {} failed", self.world.display()))?;

        if let Some(path) = &self.report {
            write_report(&report, path)?;
        }

        if report.is_partial() {
            warn!("Export of `{}` is partial", report.collection);
        }
        eprintln!(
            "[Exported {} to {}: {}]",
            report.collection,
            report.export_root.display(),
            report.summary()
        );

        Ok(report)
    }
}

/// Save the run report as pretty JSON
fn write_report(report: &ExportReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create report directory: {}", parent.display()))?;
    }

    let content = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report: {}", path.display()))?;

    Ok(())
}
