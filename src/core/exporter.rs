//! Runs the export pipeline for one world directory.
//!
//! Stages run strictly in order: load, hierarchy, materialize, index,
//! assets. Fatal errors abort before anything further is written;
//! structural issues and best-effort failures end up in the report.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::instrument;

use crate::config::ExportSettings;
use crate::domain::{EventKind, ExportEvent, ExportObserver, ExportReport, Severity, Stage};

use super::assets::AssetResolver;
use super::hierarchy::{HierarchyBuilder, HierarchyError};
use super::index::IndexBuilder;
use super::loader::{LoadError, RecordLoader};
use super::materializer::TreeMaterializer;

/// Errors that abort an export run
#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),

    #[error("Failed to create export root {}: {source}", .path.display())]
    CreateRoot { path: PathBuf, source: io::Error },
}

impl ExportError {
    pub fn severity(&self) -> Severity {
        Severity::Fatal
    }
}

/// Main export engine
pub struct Exporter {
    settings: ExportSettings,
}

impl Default for Exporter {
    fn default() -> Self {
        Self::new(ExportSettings::default())
    }
}

impl Exporter {
    pub fn new(settings: ExportSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Collection name: the last component of the world path
    pub fn collection_name(world: &Path) -> String {
        world
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "world".to_string())
    }

    /// `<output base>/<collection name>`
    pub fn export_root(&self, world: &Path) -> PathBuf {
        self.settings.output_base.join(Self::collection_name(world))
    }

    /// Export one world directory
    #[instrument(skip_all, fields(world = %world.display()))]
    pub fn run(
        &self,
        world: &Path,
        observer: &mut dyn ExportObserver,
    ) -> Result<ExportReport, ExportError> {
        let collection = Self::collection_name(world);
        let export_root = self.export_root(world);
        let mut report = ExportReport::new(&collection, &export_root);

        stage_started(observer, Stage::Load, format!("Running journal export for {}", world.display()));
        let loaded = RecordLoader::new(self.settings.records.clone()).load(world, observer)?;
        report.structural.extend(loaded.issues);
        stage_completed(
            observer,
            Stage::Load,
            format!(
                "loaded {} directories and {} entries",
                loaded.directories.len(),
                loaded.entries.len()
            ),
        );

        stage_started(observer, Stage::Hierarchy, "pruning directories");
        let hierarchy = HierarchyBuilder::new(
            &export_root,
            &self.settings.document_extension,
            &self.settings.index_file,
        )
        .build(loaded.directories, loaded.entries, observer)?;
        report.structural.extend(hierarchy.issues.iter().cloned());
        stage_completed(
            observer,
            Stage::Hierarchy,
            format!(
                "retained {} directories and {} entries",
                hierarchy.directories.len(),
                hierarchy.entries.len()
            ),
        );

        stage_started(observer, Stage::Materialize, format!("creating {}", export_root.display()));
        TreeMaterializer::create_root(&export_root).map_err(|source| ExportError::CreateRoot {
            path: export_root.clone(),
            source,
        })?;
        let materialized = TreeMaterializer::materialize(&hierarchy, observer, &mut report.failures);
        report.directories_created = materialized.directories.len();
        report.documents_written = materialized.documents.len();
        stage_completed(
            observer,
            Stage::Materialize,
            format!(
                "created {} directories, wrote {} documents",
                report.directories_created, report.documents_written
            ),
        );

        stage_started(observer, Stage::Index, "creating navigation files");
        let manifests = IndexBuilder::new(
            &export_root,
            &collection,
            &self.settings.index_file,
            &self.settings.document_extension,
        )
        .build(&materialized, observer, &mut report.failures);
        report.indexes_written = manifests.len();
        stage_completed(observer, Stage::Index, format!("wrote {} navigation files", manifests.len()));

        stage_started(observer, Stage::Assets, "copying assets");
        let resolver = AssetResolver::new(world, &self.settings.data_marker);
        report.assets_copied =
            resolver.copy_all(&materialized.documents, observer, &mut report.failures);
        stage_completed(observer, Stage::Assets, format!("copied {} assets", report.assets_copied));

        report.finish();
        Ok(report)
    }
}

fn stage_started(observer: &mut dyn ExportObserver, stage: Stage, detail: impl Into<String>) {
    observer.on_event(&ExportEvent::new(stage, EventKind::StageStarted).with_detail(detail));
}

fn stage_completed(observer: &mut dyn ExportObserver, stage: Stage, detail: impl Into<String>) {
    observer.on_event(&ExportEvent::new(stage, EventKind::StageCompleted).with_detail(detail));
}
