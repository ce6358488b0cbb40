//! Batch loading of report files into the record store.
//!
//! A reseed clears the collection and then inserts file by file. These are separate store
//! calls, so a reader querying mid-run can see an empty or partly filled collection.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::analytics::CompanyDirectory;
use crate::error::{PipelineError, PipelineResult};
use crate::extract::{extract_document, DocumentExtraction, RowFailure};
use crate::mapper::ColumnLayout;
use crate::seed::read_seed_file;
use crate::source::{file_name, read_document, resolve_academic_year, SourceFormat};
use crate::store::{ConflictPolicy, InsertOutcome, RecordStore};

/// Quarantine entries kept in the run report across all files.
pub const MAX_QUARANTINE: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LoadMode {
    /// Clear the collection, then insert; duplicate ids in the batch are counted as failed.
    Reseed,
    /// Insert without clearing; ids already stored are counted as failed.
    Append,
    /// Insert without clearing; ids already stored are replaced.
    Upsert,
}

impl LoadMode {
    fn clears(self) -> bool {
        matches!(self, LoadMode::Reseed)
    }

    fn policy(self) -> ConflictPolicy {
        match self {
            LoadMode::Reseed | LoadMode::Append => ConflictPolicy::Skip,
            LoadMode::Upsert => ConflictPolicy::Replace,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Loaded,
    SkippedNoYear,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub file: String,
    pub academic_year: Option<String>,
    pub status: FileStatus,
    pub rows_seen: usize,
    pub records_extracted: usize,
    pub inserted: usize,
    pub failed: usize,
    pub error: Option<String>,
}

impl FileReport {
    fn new(file: String, academic_year: Option<String>, status: FileStatus) -> Self {
        Self {
            file,
            academic_year,
            status,
            rows_seen: 0,
            records_extracted: 0,
            inserted: 0,
            failed: 0,
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub files_processed: usize,
    pub files_failed: usize,
    pub files_skipped_no_year: usize,
    pub records_cleared: u64,
    pub records_extracted: usize,
    pub records_inserted: usize,
    pub records_failed: usize,
    pub rows_seen: usize,
    pub rows_rejected: usize,
    pub rows_short: usize,
    pub gender_mismatches: usize,
    /// Records in the store once the run finished.
    pub records_stored: Option<u64>,
    pub quarantine: Vec<RowFailure>,
    pub files: Vec<FileReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunReport {
    fn start() -> Self {
        Self {
            files_processed: 0,
            files_failed: 0,
            files_skipped_no_year: 0,
            records_cleared: 0,
            records_extracted: 0,
            records_inserted: 0,
            records_failed: 0,
            rows_seen: 0,
            rows_rejected: 0,
            rows_short: 0,
            gender_mismatches: 0,
            records_stored: None,
            quarantine: Vec::new(),
            files: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    fn absorb(&mut self, extraction: &DocumentExtraction, outcome: InsertOutcome) {
        let report = &extraction.report;
        self.rows_seen += report.rows_seen;
        self.rows_rejected += report.rows_failed();
        self.rows_short += report.short_rows;
        self.gender_mismatches += report.gender_mismatches;
        self.records_extracted += extraction.records.len();
        self.records_inserted += outcome.inserted;
        self.records_failed += outcome.failed;
        let room = MAX_QUARANTINE.saturating_sub(self.quarantine.len());
        self.quarantine
            .extend(report.samples.iter().take(room).cloned());
    }
}

pub struct LoadEngine<S: RecordStore> {
    store: Arc<S>,
    layout: ColumnLayout,
    directory: Option<Arc<CompanyDirectory>>,
}

impl<S: RecordStore> LoadEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            layout: ColumnLayout::standard(),
            directory: None,
        }
    }

    /// The directory is invalidated whenever a run completes.
    pub fn with_directory(mut self, directory: Arc<CompanyDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Loads every file in order. Only a store outage aborts the run.
    pub async fn run(&self, files: &[PathBuf], mode: LoadMode) -> PipelineResult<RunReport> {
        let mut report = RunReport::start();

        if mode.clears() {
            report.records_cleared = self.store.clear().await.map_err(|err| match err {
                PipelineError::StoreTimeout { .. } => PipelineError::StoreUnavailable(err.to_string()),
                other => other,
            })?;
            info!(removed = report.records_cleared, "cleared placement records");
        }

        for path in files {
            let file_report = self.load_file(path, mode.policy(), &mut report).await?;
            match file_report.status {
                FileStatus::Loaded => report.files_processed += 1,
                FileStatus::SkippedNoYear => report.files_skipped_no_year += 1,
                FileStatus::Failed => report.files_failed += 1,
            }
            report.files.push(file_report);
        }

        if let Some(directory) = &self.directory {
            directory.invalidate().await;
        }
        report.records_stored = match self.store.count().await {
            Ok(count) => Some(count),
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!(error = %err, "could not count stored records");
                None
            }
        };
        report.finished_at = Some(Utc::now());
        info!(
            files = report.files_processed,
            extracted = report.records_extracted,
            inserted = report.records_inserted,
            failed = report.records_failed,
            skipped_no_year = report.files_skipped_no_year,
            "load finished"
        );
        Ok(report)
    }

    async fn load_file(
        &self,
        path: &Path,
        policy: ConflictPolicy,
        report: &mut RunReport,
    ) -> PipelineResult<FileReport> {
        let name = file_name(path);
        let is_seed = SourceFormat::from_path(path) == Some(SourceFormat::Json);
        let year = resolve_academic_year(&name);

        // Seed files carry their year per record; tables need it from the file name.
        if year.is_none() && !is_seed {
            let err = PipelineError::YearUnresolved { file: name.clone() };
            warn!(file = %name, "{err}, skipping file");
            return Ok(FileReport::new(name, None, FileStatus::SkippedNoYear));
        }

        let extraction = match self.extract(path, year.as_deref(), is_seed) {
            Ok(extraction) => extraction,
            Err(err) => {
                error!(file = %name, error = %err, "extraction failed, skipping file");
                let mut failed = FileReport::new(name, year, FileStatus::Failed);
                failed.error = Some(err.to_string());
                return Ok(failed);
            }
        };

        let mut file_report = FileReport::new(name.clone(), year, FileStatus::Loaded);
        file_report.rows_seen = extraction.report.rows_seen;
        file_report.records_extracted = extraction.records.len();

        if extraction.records.is_empty() {
            info!(file = %name, "no records extracted");
            report.absorb(&extraction, InsertOutcome::default());
            return Ok(file_report);
        }

        let outcome = match self.store.insert_many(&extraction.records, policy).await {
            Ok(outcome) => outcome,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                let outcome = match &err {
                    PipelineError::PartialInsert { outcome, .. } => *outcome,
                    _ => InsertOutcome {
                        inserted: 0,
                        failed: extraction.records.len(),
                    },
                };
                error!(
                    file = %name,
                    error = %err,
                    inserted = outcome.inserted,
                    "insert failed, skipping rest of file"
                );
                report.absorb(&extraction, outcome);
                file_report.status = FileStatus::Failed;
                file_report.inserted = outcome.inserted;
                file_report.failed = outcome.failed;
                file_report.error = Some(err.to_string());
                return Ok(file_report);
            }
        };

        if outcome.failed > 0 {
            warn!(file = %name, failed = outcome.failed, "some records were not inserted");
        }
        info!(
            file = %name,
            inserted = outcome.inserted,
            rows = extraction.report.rows_seen,
            "loaded file"
        );
        file_report.inserted = outcome.inserted;
        file_report.failed = outcome.failed;
        report.absorb(&extraction, outcome);
        Ok(file_report)
    }

    fn extract(
        &self,
        path: &Path,
        year: Option<&str>,
        is_seed: bool,
    ) -> PipelineResult<DocumentExtraction> {
        if is_seed {
            return read_seed_file(path);
        }
        let year = year.ok_or_else(|| PipelineError::YearUnresolved {
            file: file_name(path),
        })?;
        let document = read_document(path)?;
        debug!(file = %document.name, rows = document.row_count(), "read source document");
        Ok(extract_document(&document, year, &self.layout))
    }
}
