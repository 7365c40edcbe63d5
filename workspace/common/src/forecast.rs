use crate::quality::{QualityLevel, QualityReport};
use crate::risk::RiskLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Symmetric uncertainty band around a forecast value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

/// Raw output of each ensemble member for one hour.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ModelBreakdown {
    pub pattern: f64,
    pub weather: f64,
    pub persistence: f64,
    pub climatology: f64,
    pub api: f64,
    pub neural: f64,
    pub meta: f64,
}

/// One hourly forecast point.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ForecastPoint {
    /// Hours ahead of generation time, starting at 0
    pub hour: u32,
    pub time: DateTime<Utc>,
    pub dust: f64,
    /// Confidence in percent (50..=98)
    pub confidence: f64,
    pub confidence_interval: ConfidenceInterval,
    pub risk_level: RiskLevel,
    pub data_quality: QualityLevel,
    pub model_breakdown: ModelBreakdown,
    pub model_agreement: f64,
}

/// A contiguous run of forecast hours at or above the HIGH threshold.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct RiskPeriod {
    pub start_hour: u32,
    /// Exclusive
    pub end_hour: u32,
    pub start_time: DateTime<Utc>,
    /// Time of the last hour inside the period
    pub end_time: DateTime<Utc>,
    pub duration_hours: u32,
    pub peak_dust: f64,
    pub severity: RiskLevel,
    pub recommendation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ForecastSummary {
    pub peak_dust: f64,
    pub peak_hour: u32,
    pub peak_time: DateTime<Utc>,
    pub min_dust: f64,
    pub avg_dust: f64,
    pub hours_above_moderate: usize,
    pub hours_above_high: usize,
    pub hours_above_severe: usize,
}

/// Condensed accuracy status embedded into every prediction.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct AccuracyInfo {
    pub overall_accuracy: f64,
    pub status: crate::accuracy::AccuracyStatus,
    pub validation_pending: bool,
    pub models_active: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct AccuracyMetrics {
    pub model_agreement: f64,
    pub data_quality: f64,
    pub sources_used: usize,
    pub ensemble_models: usize,
    pub kalman_filtered: bool,
}

/// Full ensemble forecast for one city.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct PredictionData {
    pub city_id: String,
    pub generated_at: DateTime<Utc>,
    pub model_version: String,
    pub data_quality: QualityReport,
    pub forecast_24h: Vec<ForecastPoint>,
    pub forecast_72h: Vec<ForecastPoint>,
    pub risk_periods: Vec<RiskPeriod>,
    pub next_risk_period: Option<RiskPeriod>,
    pub summary: ForecastSummary,
    pub accuracy_info: AccuracyInfo,
    pub model_weights: BTreeMap<String, f64>,
    pub accuracy_metrics: AccuracyMetrics,
}

/// Response for `GET /api/v1/predictions/{city_id}/risk-periods`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RiskPeriodsResponse {
    pub city_id: String,
    pub risk_periods: Vec<RiskPeriod>,
}
