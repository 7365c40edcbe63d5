use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccuracyStatus {
    Initializing,
    Excellent,
    Good,
    Acceptable,
    NeedsAttention,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccuracyTrend {
    Improving,
    Declining,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccuracyStability {
    InsufficientData,
    VeryStable,
    Stable,
    Moderate,
    Volatile,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct CityAccuracyStats {
    pub accuracy: f64,
    pub samples: usize,
    pub last_validated: DateTime<Utc>,
    pub trend: AccuracyTrend,
    pub stability: AccuracyStability,
}

/// Response for `GET /api/v1/accuracy/overall`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct OverallAccuracy {
    pub overall_accuracy: f64,
    pub status: AccuracyStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub target: f64,
    pub minimum: f64,
    pub cities: BTreeMap<String, CityAccuracyStats>,
    pub cities_meeting_target: usize,
    pub total_cities: usize,
    pub validation_pending: bool,
    pub total_validations: usize,
    pub model_version: String,
    pub ensemble_models: usize,
    pub timestamp: DateTime<Utc>,
}

/// Result of matching recorded predictions against observed readings.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ValidationReport {
    pub city_id: String,
    pub matches: usize,
    pub accuracy: f64,
    pub mae: f64,
    pub rmse: f64,
    pub mape: f64,
    pub high_confidence_accuracy: f64,
    /// Accuracy per forecast horizon in hours
    pub horizon_accuracy: BTreeMap<i64, f64>,
    pub bias: f64,
    pub needs_retraining: bool,
    pub meets_target: bool,
    pub calibration_factor: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct PerformanceReport {
    pub model_version: String,
    pub total_validations: usize,
    pub cities_tracked: usize,
    pub calibration_factors: BTreeMap<String, f64>,
    pub bias_corrections: BTreeMap<String, f64>,
    pub target_accuracy: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct CalibrationResponse {
    pub calibration_factors: BTreeMap<String, f64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct AccuracyHistoryResponse {
    pub city_id: String,
    pub accuracy_history: Vec<f64>,
    pub average: f64,
    pub samples: usize,
    pub timestamp: DateTime<Utc>,
}
