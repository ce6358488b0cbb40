use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::models::PlacementRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Keep the stored document and count the incoming one as failed.
    Skip,
    /// Overwrite the stored document (last extraction wins).
    Replace,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOutcome {
    pub inserted: usize,
    pub failed: usize,
}

/// Document store holding [`PlacementRecord`]s keyed by id.
///
/// Inserts are unordered: a document that fails (for example a duplicate id under
/// [`ConflictPolicy::Skip`]) is counted and the rest of the batch still goes in.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn clear(&self) -> PipelineResult<u64>;
    async fn insert_many(
        &self,
        records: &[PlacementRecord],
        policy: ConflictPolicy,
    ) -> PipelineResult<InsertOutcome>;
    async fn all_records(&self) -> PipelineResult<Vec<PlacementRecord>>;
    async fn records_for_year(&self, academic_year: &str) -> PipelineResult<Vec<PlacementRecord>>;
    /// Newest academic year first.
    async fn records_for_company(&self, company_name: &str)
        -> PipelineResult<Vec<PlacementRecord>>;
    /// Sorted ascending.
    async fn company_names(&self) -> PipelineResult<Vec<String>>;
    async fn count(&self) -> PipelineResult<u64>;
}

/// Runs a store call under `timeout`, retrying once before giving up with
/// [`PipelineError::StoreTimeout`].
pub async fn with_timeout<T, F, Fut>(
    operation: &'static str,
    timeout: Duration,
    mut call: F,
) -> PipelineResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PipelineResult<T>>,
{
    for attempt in 1..=2 {
        match tokio::time::timeout(timeout, call()).await {
            Ok(result) => return result,
            Err(_) => warn!(operation, attempt, ?timeout, "record store call timed out"),
        }
    }
    Err(PipelineError::StoreTimeout { operation, timeout })
}

/// Inserts records one at a time through `insert`, which reports whether the row went in.
///
/// A rejected statement counts as failed and the batch continues. Any other non-fatal error
/// stops the batch and is returned as [`PipelineError::PartialInsert`], with the failing record
/// and everything after it counted as failed.
pub async fn insert_each<'a, F, Fut>(
    records: &'a [PlacementRecord],
    mut insert: F,
) -> PipelineResult<InsertOutcome>
where
    F: FnMut(&'a PlacementRecord) -> Fut,
    Fut: Future<Output = PipelineResult<bool>>,
{
    let mut outcome = InsertOutcome::default();
    for (idx, record) in records.iter().enumerate() {
        match insert(record).await {
            Ok(true) => outcome.inserted += 1,
            Ok(false) => {
                debug!(id = record.id(), "duplicate id, skipping insert");
                outcome.failed += 1;
            }
            Err(err) if err.is_fatal() => return Err(err),
            Err(PipelineError::Store(message)) => {
                debug!(id = record.id(), error = %message, "insert failed");
                outcome.failed += 1;
            }
            Err(err) => {
                outcome.failed += records.len() - idx;
                warn!(
                    id = record.id(),
                    inserted = outcome.inserted,
                    not_inserted = outcome.failed,
                    "batch insert interrupted"
                );
                return Err(PipelineError::PartialInsert {
                    outcome,
                    source: Box::new(err),
                });
            }
        }
    }
    Ok(outcome)
}

/// Keeps records in a map. Used for tests and `--dry-run` loads.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: Mutex<BTreeMap<String, PlacementRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> PipelineResult<std::sync::MutexGuard<'_, BTreeMap<String, PlacementRecord>>> {
        self.records
            .lock()
            .map_err(|_| PipelineError::StoreUnavailable("in-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn clear(&self) -> PipelineResult<u64> {
        let mut records = self.lock()?;
        let removed = records.len() as u64;
        records.clear();
        Ok(removed)
    }

    async fn insert_many(
        &self,
        batch: &[PlacementRecord],
        policy: ConflictPolicy,
    ) -> PipelineResult<InsertOutcome> {
        let mut records = self.lock()?;
        let mut outcome = InsertOutcome::default();
        for record in batch {
            let exists = records.contains_key(record.id());
            if exists && policy == ConflictPolicy::Skip {
                debug!(id = record.id(), "duplicate id, skipping insert");
                outcome.failed += 1;
                continue;
            }
            records.insert(record.id().to_string(), record.clone());
            outcome.inserted += 1;
        }
        Ok(outcome)
    }

    async fn all_records(&self) -> PipelineResult<Vec<PlacementRecord>> {
        Ok(self.lock()?.values().cloned().collect())
    }

    async fn records_for_year(&self, academic_year: &str) -> PipelineResult<Vec<PlacementRecord>> {
        Ok(self
            .lock()?
            .values()
            .filter(|r| r.academic_year == academic_year)
            .cloned()
            .collect())
    }

    async fn records_for_company(
        &self,
        company_name: &str,
    ) -> PipelineResult<Vec<PlacementRecord>> {
        let mut matching: Vec<PlacementRecord> = self
            .lock()?
            .values()
            .filter(|r| r.company_name == company_name)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.academic_year.cmp(&a.academic_year));
        Ok(matching)
    }

    async fn company_names(&self) -> PipelineResult<Vec<String>> {
        let names: BTreeSet<String> = self
            .lock()?
            .values()
            .map(|r| r.company_name.clone())
            .collect();
        Ok(names.into_iter().collect())
    }

    async fn count(&self) -> PipelineResult<u64> {
        Ok(self.lock()?.len() as u64)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::builder::build_record;
    use crate::mapper::{map_row, ColumnLayout};
    use crate::models::PlacementRecord;

    /// A record with the given hires split as CE/IT/E&TC and the given package.
    pub fn record(
        year: &str,
        company: &str,
        ce: u32,
        it: u32,
        entc: u32,
        salary: f64,
        cgpa: f64,
    ) -> PlacementRecord {
        let total = ce + it + entc;
        let cells = vec![
            "1".to_string(),
            company.to_string(),
            cgpa.to_string(),
            ce.to_string(),
            it.to_string(),
            entc.to_string(),
            total.to_string(),
            "0".to_string(),
            total.to_string(),
            salary.to_string(),
            total.to_string(),
            (salary * f64::from(total)).to_string(),
        ];
        let mapped = map_row(&ColumnLayout::standard(), &cells).expect("fixture row maps");
        build_record(year, mapped).expect("fixture row builds")
    }
}
