use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::model::{AnalysisRecord, AppAnalysis};
use crate::store::{AnalysisStore, NewAnalysis, StoreError};

/// How long an analysis stays valid: 15 days.
pub const FRESHNESS_WINDOW_MS: i64 = 15 * 24 * 3600 * 1000;

pub fn freshness_window() -> Duration {
    Duration::milliseconds(FRESHNESS_WINDOW_MS)
}

/// `true` while `now - timestamp` is strictly below the window.
pub fn is_fresh(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(timestamp) < freshness_window()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Miss,
    Fresh(AnalysisRecord),
    /// Expired but still stored; callers must not serve it.
    Stale(AnalysisRecord),
}

/// Store wrapper that applies the freshness window on reads.
///
/// Stale rows are never deleted here.
#[derive(Clone)]
pub struct FreshnessCache {
    store: Arc<dyn AnalysisStore>,
}

impl FreshnessCache {
    pub fn new(store: Arc<dyn AnalysisStore>) -> Self {
        Self { store }
    }

    pub async fn lookup_latest(&self, url: &str) -> Result<Option<AnalysisRecord>, StoreError> {
        self.store.find_latest_by_url(url).await
    }

    pub async fn lookup(&self, url: &str, now: DateTime<Utc>) -> Result<CacheLookup, StoreError> {
        Ok(match self.lookup_latest(url).await? {
            None => CacheLookup::Miss,
            Some(record) if is_fresh(record.timestamp, now) => CacheLookup::Fresh(record),
            Some(record) => CacheLookup::Stale(record),
        })
    }

    pub async fn insert(
        &self,
        url: &str,
        analysis: AppAnalysis,
        now: DateTime<Utc>,
    ) -> Result<AnalysisRecord, StoreError> {
        self.store
            .create(NewAnalysis {
                url: url.to_string(),
                analysis,
                timestamp: now,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RiskLevel;
    use crate::store::LibsqlStore;
    use pretty_assertions::assert_eq;

    fn analysis() -> AppAnalysis {
        AppAnalysis {
            app_name: "ExampleApp".into(),
            score: 17,
            risk_level: RiskLevel::Safe,
            country_of_origin: "Germany".into(),
            shareholders: vec![],
            positive_points: vec!["Open source".into()],
            negative_points: vec![],
            summary: "Solid.".into(),
        }
    }

    async fn test_cache() -> FreshnessCache {
        FreshnessCache::new(Arc::new(LibsqlStore::open_local(":memory:").await.unwrap()))
    }

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    #[test]
    fn window_is_fifteen_days() {
        assert_eq!(freshness_window(), Duration::days(15));
    }

    #[test]
    fn freshness_boundary() {
        let now = at(1_800_000_000_000);
        let one_ms = Duration::milliseconds(1);

        assert!(is_fresh(now - freshness_window() + one_ms, now));
        assert!(!is_fresh(now - freshness_window(), now));
        assert!(!is_fresh(now - freshness_window() - one_ms, now));
        assert!(is_fresh(now, now));
        // Clock skew: a record from the future is still fresh.
        assert!(is_fresh(now + Duration::hours(1), now));
    }

    #[tokio::test]
    async fn lookup_classifies_by_age() {
        let cache = test_cache().await;
        let created_at = at(1_800_000_000_000);
        let one_ms = Duration::milliseconds(1);

        assert_eq!(cache.lookup("https://x", created_at).await.unwrap(), CacheLookup::Miss);

        let record = cache.insert("https://x", analysis(), created_at).await.unwrap();

        let just_fresh = created_at + freshness_window() - one_ms;
        assert_eq!(
            cache.lookup("https://x", just_fresh).await.unwrap(),
            CacheLookup::Fresh(record.clone())
        );

        let just_stale = created_at + freshness_window() + one_ms;
        assert_eq!(
            cache.lookup("https://x", just_stale).await.unwrap(),
            CacheLookup::Stale(record.clone())
        );

        // Staleness does not evict.
        assert_eq!(cache.lookup_latest("https://x").await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn insert_appends_new_record() {
        let cache = test_cache().await;
        let first = cache.insert("https://x", analysis(), at(1_000)).await.unwrap();
        let second = cache.insert("https://x", analysis(), at(2_000)).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(cache.lookup_latest("https://x").await.unwrap(), Some(second));
    }
}
