//! Durable storage of analysis records.
//!
//! Records are append-only: a URL accumulates one row per analysis and reads
//! pick the newest. The production backend is a libSQL database, either a
//! local file or `":memory:"` for tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::Builder;

use crate::model::{AnalysisRecord, AppAnalysis, RiskLevel};

const MIGRATION_001: &str = include_str!("../migrations/001_app_analyses.sql");

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),
}

/// A validated analysis waiting to be persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewAnalysis {
    pub url: String,
    pub analysis: AppAnalysis,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// Most recent record for `url` by timestamp, if any.
    async fn find_latest_by_url(&self, url: &str) -> Result<Option<AnalysisRecord>, StoreError>;

    /// Appends a record. Existing rows for the same URL are left untouched.
    async fn create(&self, new: NewAnalysis) -> Result<AnalysisRecord, StoreError>;
}

pub struct LibsqlStore {
    #[allow(dead_code)]
    db: libsql::Database,
    conn: libsql::Connection,
}

impl LibsqlStore {
    /// Opens (or creates) the database at `path` and applies migrations.
    pub async fn open_local(path: &str) -> Result<Self, StoreError> {
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;

        conn.execute_batch(MIGRATION_001)
            .await
            .map_err(|e| StoreError::Migration(format!("001_app_analyses: {e}")))?;

        Ok(Self { db, conn })
    }
}

fn encode_list(items: &[String]) -> Result<String, StoreError> {
    serde_json::to_string(items).map_err(|e| StoreError::Query(format!("Failed to encode list: {e}")))
}

fn decode_list(raw: &str) -> Result<Vec<String>, StoreError> {
    serde_json::from_str(raw)
        .map_err(|e| StoreError::InvalidState(format!("Failed to decode list '{raw}': {e}")))
}

fn millis_to_datetime(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::InvalidState(format!("Timestamp out of range: {ms}")))
}

fn row_to_record(row: &libsql::Row) -> Result<AnalysisRecord, StoreError> {
    let score = row.get::<i64>(3)?;
    Ok(AnalysisRecord {
        id: row.get::<i64>(0)?,
        url: row.get::<String>(1)?,
        analysis: AppAnalysis {
            app_name: row.get::<String>(2)?,
            score: u8::try_from(score)
                .map_err(|_| StoreError::InvalidState(format!("Stored score out of range: {score}")))?,
            risk_level: row.get::<String>(4)?.parse::<RiskLevel>().map_err(StoreError::InvalidState)?,
            country_of_origin: row.get::<String>(5)?,
            shareholders: decode_list(&row.get::<String>(6)?)?,
            positive_points: decode_list(&row.get::<String>(7)?)?,
            negative_points: decode_list(&row.get::<String>(8)?)?,
            summary: row.get::<String>(9)?,
        },
        timestamp: millis_to_datetime(row.get::<i64>(10)?)?,
    })
}

#[async_trait]
impl AnalysisStore for LibsqlStore {
    async fn find_latest_by_url(&self, url: &str) -> Result<Option<AnalysisRecord>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, url, app_name, score, risk_level, country_of_origin,
                        shareholders, positive_points, negative_points, summary, timestamp
                 FROM app_analyses
                 WHERE url = ?1
                 ORDER BY timestamp DESC, id DESC
                 LIMIT 1",
                [url],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row_to_record(&row)?)),
            None => Ok(None),
        }
    }

    async fn create(&self, new: NewAnalysis) -> Result<AnalysisRecord, StoreError> {
        // Stored at millisecond precision; hand back exactly what was stored.
        let millis = new.timestamp.timestamp_millis();
        let timestamp = millis_to_datetime(millis)?;
        let a = &new.analysis;

        let mut rows = self
            .conn
            .query(
                "INSERT INTO app_analyses (url, app_name, score, risk_level, country_of_origin,
                        shareholders, positive_points, negative_points, summary, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 RETURNING id",
                libsql::params![
                    new.url.as_str(),
                    a.app_name.as_str(),
                    i64::from(a.score),
                    a.risk_level.as_str(),
                    a.country_of_origin.as_str(),
                    encode_list(&a.shareholders)?,
                    encode_list(&a.positive_points)?,
                    encode_list(&a.negative_points)?,
                    a.summary.as_str(),
                    millis
                ],
            )
            .await?;

        let row = rows
            .next()
            .await?
            .ok_or_else(|| StoreError::Query("INSERT returned no id".to_string()))?;
        let id = row.get::<i64>(0)?;

        Ok(AnalysisRecord {
            id,
            url: new.url,
            analysis: new.analysis,
            timestamp,
        })
    }
}
