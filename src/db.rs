use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};
use crate::models::PlacementRecord;
use crate::store::{insert_each, with_timeout, ConflictPolicy, InsertOutcome, RecordStore};

pub async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set to reach the placement record store")?;

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.store_timeout)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres-backed store. Each record is a JSONB document keyed by its id.
#[derive(Debug, Clone)]
pub struct PgRecordStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgRecordStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    async fn fetch_documents(
        &self,
        operation: &'static str,
        sql: &'static str,
        bind: Option<&str>,
    ) -> PipelineResult<Vec<PlacementRecord>> {
        let rows = with_timeout(operation, self.timeout, || async move {
            let mut query = sqlx::query(sql);
            if let Some(value) = bind {
                query = query.bind(value);
            }
            Ok::<_, PipelineError>(query.fetch_all(&self.pool).await?)
        })
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let Json(record): Json<PlacementRecord> = row
                .try_get("document")
                .map_err(PipelineError::from)?;
            records.push(record);
        }
        Ok(records)
    }

    async fn insert_one(
        &self,
        record: &PlacementRecord,
        policy: ConflictPolicy,
    ) -> PipelineResult<bool> {
        let sql = match policy {
            ConflictPolicy::Skip => {
                r#"
                INSERT INTO placement.placement_records (id, academic_year, company_name, document)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (id) DO NOTHING
                "#
            }
            ConflictPolicy::Replace => {
                r#"
                INSERT INTO placement.placement_records (id, academic_year, company_name, document)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (id) DO UPDATE
                SET academic_year = EXCLUDED.academic_year,
                    company_name = EXCLUDED.company_name,
                    document = EXCLUDED.document,
                    loaded_at = now()
                "#
            }
        };

        let result = with_timeout("insert", self.timeout, || async move {
            Ok::<_, PipelineError>(sqlx::query(sql)
                .bind(record.id())
                .bind(&record.academic_year)
                .bind(&record.company_name)
                .bind(Json(record))
                .execute(&self.pool)
                .await?)
        })
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn clear(&self) -> PipelineResult<u64> {
        let result = with_timeout("clear", self.timeout, || async move {
            Ok::<_, PipelineError>(sqlx::query("DELETE FROM placement.placement_records")
                .execute(&self.pool)
                .await?)
        })
        .await?;
        Ok(result.rows_affected())
    }

    async fn insert_many(
        &self,
        records: &[PlacementRecord],
        policy: ConflictPolicy,
    ) -> PipelineResult<InsertOutcome> {
        insert_each(records, |record| self.insert_one(record, policy)).await
    }

    async fn all_records(&self) -> PipelineResult<Vec<PlacementRecord>> {
        self.fetch_documents(
            "all_records",
            "SELECT document FROM placement.placement_records ORDER BY id",
            None,
        )
        .await
    }

    async fn records_for_year(&self, academic_year: &str) -> PipelineResult<Vec<PlacementRecord>> {
        self.fetch_documents(
            "records_for_year",
            "SELECT document FROM placement.placement_records WHERE academic_year = $1 ORDER BY id",
            Some(academic_year),
        )
        .await
    }

    async fn records_for_company(
        &self,
        company_name: &str,
    ) -> PipelineResult<Vec<PlacementRecord>> {
        self.fetch_documents(
            "records_for_company",
            "SELECT document FROM placement.placement_records \
             WHERE company_name = $1 ORDER BY academic_year DESC",
            Some(company_name),
        )
        .await
    }

    async fn company_names(&self) -> PipelineResult<Vec<String>> {
        let rows = with_timeout("company_names", self.timeout, || async move {
            Ok::<_, PipelineError>(sqlx::query(
                "SELECT DISTINCT company_name FROM placement.placement_records ORDER BY company_name",
            )
            .fetch_all(&self.pool)
            .await?)
        })
        .await?;

        rows.into_iter()
            .map(|row| row.try_get("company_name").map_err(PipelineError::from))
            .collect()
    }

    async fn count(&self) -> PipelineResult<u64> {
        let row = with_timeout("count", self.timeout, || async move {
            Ok::<_, PipelineError>(sqlx::query("SELECT COUNT(*) AS total FROM placement.placement_records")
                .fetch_one(&self.pool)
                .await?)
        })
        .await?;
        let total: i64 = row.try_get("total")?;
        Ok(total.max(0) as u64)
    }
}
