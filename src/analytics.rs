use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::error::PipelineResult;
use crate::models::{CompanyDetail, CompanyProfile, GenderDivergence, PlacementRecord, YearlyStats};
use crate::stats::{self, StatsOptions};
use crate::store::RecordStore;

/// Cached list of distinct company names, used to spot company mentions in free text.
///
/// Nothing refreshes it implicitly: it is filled on first use or by [`Self::refresh`], and the
/// load engine calls [`Self::invalidate`] when a load finishes.
#[derive(Debug, Default)]
pub struct CompanyDirectory {
    names: RwLock<Option<Arc<Vec<String>>>>,
}

impl CompanyDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn refresh(&self, store: &dyn RecordStore) -> PipelineResult<Arc<Vec<String>>> {
        let names = Arc::new(store.company_names().await?);
        debug!(companies = names.len(), "refreshed company directory");
        *self.names.write().await = Some(Arc::clone(&names));
        Ok(names)
    }

    pub async fn invalidate(&self) {
        *self.names.write().await = None;
    }

    #[cfg(test)]
    pub async fn is_loaded(&self) -> bool {
        self.names.read().await.is_some()
    }

    pub async fn names(&self, store: &dyn RecordStore) -> PipelineResult<Arc<Vec<String>>> {
        if let Some(names) = self.names.read().await.as_ref() {
            return Ok(Arc::clone(names));
        }
        self.refresh(store).await
    }

    /// Company names that occur in `text`, ignoring case.
    pub async fn match_text(
        &self,
        store: &dyn RecordStore,
        text: &str,
    ) -> PipelineResult<Vec<String>> {
        let lowered = text.to_lowercase();
        let names = self.names(store).await?;
        Ok(names
            .iter()
            .filter(|name| lowered.contains(&name.to_lowercase()))
            .cloned()
            .collect())
    }
}

/// Queries consumed by the API and chat layers. Every call reads the store afresh.
pub struct AnalyticsService<S: RecordStore> {
    store: Arc<S>,
    directory: Arc<CompanyDirectory>,
    options: StatsOptions,
}

impl<S: RecordStore> AnalyticsService<S> {
    pub fn new(store: Arc<S>, directory: Arc<CompanyDirectory>) -> Self {
        Self {
            store,
            directory,
            options: StatsOptions::default(),
        }
    }

    pub fn with_options(mut self, options: StatsOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn yearly_stats(&self) -> PipelineResult<Vec<YearlyStats>> {
        let records = self.store.all_records().await?;
        Ok(stats::yearly_stats(&records, self.options))
    }

    pub async fn yearly_stats_for(&self, year: &str) -> PipelineResult<Option<YearlyStats>> {
        let records = self.store.records_for_year(year).await?;
        Ok(stats::yearly_stats_for(&records, year, self.options))
    }

    pub async fn company_profiles(&self) -> PipelineResult<Vec<CompanyProfile>> {
        let records = self.store.all_records().await?;
        Ok(stats::company_profiles(&records))
    }

    pub async fn company_profile(&self, company: &str) -> PipelineResult<Option<CompanyProfile>> {
        let records = self.store.records_for_company(company).await?;
        Ok(stats::company_profile(&records, company))
    }

    pub async fn company_detail(&self, company: &str) -> PipelineResult<Option<CompanyDetail>> {
        let records = self.store.records_for_company(company).await?;
        Ok(stats::company_detail(&records, company))
    }

    pub async fn gender_divergences(&self) -> PipelineResult<Vec<GenderDivergence>> {
        let records = self.store.all_records().await?;
        Ok(stats::gender_divergences(&records))
    }

    pub async fn company_records(&self, company: &str) -> PipelineResult<Vec<PlacementRecord>> {
        self.store.records_for_company(company).await
    }

    pub async fn company_names(&self) -> PipelineResult<Arc<Vec<String>>> {
        self.directory.names(self.store.as_ref()).await
    }

    pub async fn match_companies(&self, text: &str) -> PipelineResult<Vec<String>> {
        self.directory.match_text(self.store.as_ref(), text).await
    }
}
