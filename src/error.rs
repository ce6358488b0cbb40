use std::time::Duration;

use thiserror::Error;

use crate::store::InsertOutcome;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("pdf error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid source pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// The file name carries no `YYYY-YY` academic year.
    #[error("could not resolve an academic year from '{file}'")]
    YearUnresolved { file: String },

    #[error("failed to extract '{file}': {message}")]
    Extraction { file: String, message: String },

    #[error("unsupported source format for '{file}'")]
    UnsupportedFormat { file: String },

    /// The record store cannot be reached. Fatal to the run.
    #[error("record store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("record store call '{operation}' timed out after {timeout:?} (retried once)")]
    StoreTimeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("record store query failed: {0}")]
    Store(String),

    /// A batch insert stopped part-way; `outcome` counts every record of the batch.
    #[error(
        "insert interrupted after {} records ({} not inserted): {source}",
        outcome.inserted,
        outcome.failed
    )]
    PartialInsert {
        outcome: InsertOutcome,
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Only losing the store aborts a run; everything else is contained per row or per file.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::StoreUnavailable(_))
    }
}

impl From<sqlx::Error> for PipelineError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => PipelineError::StoreUnavailable(err.to_string()),
            other => PipelineError::Store(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_store_unavailable_is_fatal() {
        assert!(PipelineError::StoreUnavailable("down".to_string()).is_fatal());
        assert!(!PipelineError::YearUnresolved {
            file: "report.pdf".to_string()
        }
        .is_fatal());
        assert!(!PipelineError::StoreTimeout {
            operation: "insert",
            timeout: Duration::from_secs(1)
        }
        .is_fatal());
    }

    #[test]
    fn pool_timeouts_map_to_store_unavailable() {
        let err: PipelineError = sqlx::Error::PoolTimedOut.into();
        assert!(err.is_fatal());

        let err: PipelineError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, PipelineError::Store(_)));
    }
}
