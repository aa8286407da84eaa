//! Cache-or-analyze orchestration.
//!
//! One call performs at most one store read, one provider call and one store
//! write, strictly in that order. Concurrent calls for the same URL are not
//! coordinated: both may analyze and both may insert, and the next read picks
//! the newest row.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::analyzer::{AnalysisError, AppAnalyzer};
use crate::cache::{CacheLookup, FreshnessCache};
use crate::error::{AppError, Result};
use crate::model::AnalysisRecord;
use crate::store::StoreError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    #[serde(flatten)]
    pub record: AnalysisRecord,
    pub from_cache: bool,
}

/// Internal failure detail, logged and then collapsed into [`AppError::AnalysisFailed`].
#[derive(Debug, thiserror::Error)]
enum PipelineError {
    #[error("analysis error ({}): {0}", .0.kind())]
    Analysis(#[from] AnalysisError),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Source of "now" for freshness checks and record timestamps.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Clone)]
pub struct AnalysisService {
    cache: FreshnessCache,
    analyzer: AppAnalyzer,
    clock: Clock,
}

impl AnalysisService {
    pub fn new(cache: FreshnessCache, analyzer: AppAnalyzer) -> Self {
        Self::with_clock(cache, analyzer, Arc::new(Utc::now))
    }

    pub fn with_clock(cache: FreshnessCache, analyzer: AppAnalyzer, clock: Clock) -> Self {
        Self { cache, analyzer, clock }
    }

    pub fn cache(&self) -> &FreshnessCache {
        &self.cache
    }

    pub async fn get_or_analyze(&self, url: &str) -> Result<AnalysisOutcome> {
        if url.trim().is_empty() {
            return Err(AppError::InvalidRequest("url must not be empty".to_string()));
        }

        self.run(url).await.map_err(|err| {
            error!(%url, error = %err, "analysis failed");
            AppError::AnalysisFailed
        })
    }

    async fn run(&self, url: &str) -> std::result::Result<AnalysisOutcome, PipelineError> {
        match self.cache.lookup(url, (self.clock)()).await? {
            CacheLookup::Fresh(record) => {
                info!(%url, record_id = record.id, "cache hit");
                return Ok(AnalysisOutcome { record, from_cache: true });
            }
            CacheLookup::Stale(record) => {
                info!(%url, record_id = record.id, "cache expired, analyzing again");
            }
            CacheLookup::Miss => {
                info!(%url, "cache miss");
            }
        }

        info!(%url, provider = self.analyzer.provider_name(), "calling analysis provider");
        let analysis = self.analyzer.analyze(url).await?;

        // Timestamped when persisted, not when the request arrived.
        let record = self.cache.insert(url, analysis, (self.clock)()).await?;
        info!(
            %url,
            record_id = record.id,
            score = record.analysis.score,
            risk_level = %record.analysis.risk_level,
            "stored new analysis"
        );

        Ok(AnalysisOutcome { record, from_cache: false })
    }
}
