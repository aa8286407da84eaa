use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MIN_SCORE: i64 = 0;
pub const MAX_SCORE: i64 = 20;
pub const MAX_SUMMARY_CHARS: usize = 3000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Safe,
    Moderate,
    High,
    Critical,
}

impl RiskLevel {
    /// Variants in declaration order; `NAMES[i]` is the text of `ALL[i]`.
    pub const ALL: [RiskLevel; 4] = [
        RiskLevel::Safe,
        RiskLevel::Moderate,
        RiskLevel::High,
        RiskLevel::Critical,
    ];
    pub const NAMES: &'static [&'static str] = &["SAFE", "MODERATE", "HIGH", "CRITICAL"];

    pub fn as_str(self) -> &'static str {
        Self::NAMES[self as usize]
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| format!("unknown risk level '{s}'"))
    }
}

/// A validated assessment as produced by the analysis provider.
///
/// Carries no URL or timestamp; those are attached when it is persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppAnalysis {
    pub app_name: String,
    pub score: u8,
    pub risk_level: RiskLevel,
    pub country_of_origin: String,
    pub shareholders: Vec<String>,
    pub positive_points: Vec<String>,
    pub negative_points: Vec<String>,
    pub summary: String,
}

/// One immutable persisted analysis for a URL at a point in time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub id: i64,
    pub url: String,
    #[serde(flatten)]
    pub analysis: AppAnalysis,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}
