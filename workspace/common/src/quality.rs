use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityLevel {
    Excellent,
    Good,
    Acceptable,
    Fair,
    Poor,
}

impl QualityLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 95.0 {
            QualityLevel::Excellent
        } else if score >= 85.0 {
            QualityLevel::Good
        } else if score >= 70.0 {
            QualityLevel::Acceptable
        } else if score >= 50.0 {
            QualityLevel::Fair
        } else {
            QualityLevel::Poor
        }
    }
}

/// Outcome of validating a single reading.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct QualityReport {
    pub quality_score: f64,
    pub quality_level: QualityLevel,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
    pub is_valid: bool,
    pub is_reliable: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct BatchQualityReport {
    pub total_readings: usize,
    pub valid_readings: usize,
    pub reliable_readings: usize,
    pub invalid_readings: usize,
    pub average_quality_score: f64,
    pub pass_rate: f64,
    pub reliability_rate: f64,
    /// Issue counts keyed by the field or category that raised them
    pub issue_summary: BTreeMap<String, usize>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct CityQualitySummary {
    pub average_score: f64,
    pub min_score: f64,
    pub max_score: f64,
    pub samples: usize,
    pub trend: String,
}

/// Response for `GET /api/v1/accuracy/data-quality`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct DataQualityOverview {
    pub cities_with_baselines: usize,
    pub cities_tracked: usize,
    pub city_quality: BTreeMap<String, CityQualitySummary>,
    pub valid_ranges: BTreeMap<String, ValueRange>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct CityQualityTrend {
    pub city_id: String,
    pub current_score: f64,
    pub average_score: f64,
    pub samples: usize,
    pub recent_trend: String,
    pub timestamp: DateTime<Utc>,
}
