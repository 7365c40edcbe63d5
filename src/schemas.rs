use chrono::{DateTime, Utc};
use common::{
    AccuracyHistoryResponse, AccuracyInfo, AccuracyMetrics, AccuracyStability, AccuracyStatus,
    AccuracyTrend, Alert, AlertList, CalibrationResponse, City, CityAccuracyStats, CityDustData,
    CityList, CityQualitySummary, ConfidenceInterval, CurrentDustResponse, DataQualityOverview,
    DustHistoryResponse, DustReading, DustTrend, ForecastPoint, ForecastSummary, ModelBreakdown,
    OverallAccuracy, PerformanceReport, PredictionData, QualityLevel, QualityReport, RiskLevel, RiskPeriod,
    RiskPeriodsResponse, ValidationReport, ValueRange,
};
use compute::ForecastEngine;
use moka::future::Cache;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use utoipa::{OpenApi, ToSchema};

use crate::config::Settings;
use crate::middleware::RateLimiter;
use crate::services::collector::DataCollector;
use crate::services::hub::BroadcastHub;
use crate::services::telemetry::MetricsRecorder;

/// Application state shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    /// Cache for current readings and predictions
    pub cache: Cache<String, CachedData>,
    /// Forecasting engine with its per-city learning state
    pub engine: Arc<Mutex<ForecastEngine>>,
    pub collector: Arc<DataCollector>,
    /// Fan-out channel for WebSocket subscribers
    pub hub: BroadcastHub,
    pub rate_limiter: Arc<RateLimiter>,
    /// Prometheus gauges served by the metrics endpoint
    pub metrics: Arc<MetricsRecorder>,
    pub cities: Arc<Vec<City>>,
    pub settings: Arc<Settings>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn city(&self, city_id: &str) -> Option<&City> {
        self.cities.iter().find(|c| c.id == city_id)
    }
}

/// Cached data types
#[derive(Clone, Debug)]
pub enum CachedData {
    Current(CityDustData),
    Prediction(PredictionData),
}

pub fn current_cache_key(city_id: &str) -> String {
    format!("current_{}", city_id)
}

pub fn prediction_cache_key(city_id: &str, hours: u32) -> String {
    format!("prediction_{}_{}", city_id, hours)
}

/// Error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: &str) -> Self {
        Self {
            error: error.into(),
            code: code.to_string(),
            success: false,
        }
    }

    pub fn city_not_found(city_id: &str) -> Self {
        Self::new(format!("City {} not found", city_id), "CITY_NOT_FOUND")
    }

    pub fn database_error() -> Self {
        Self::new("Database error occurred", "DATABASE_ERROR")
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
    pub timestamp: DateTime<Utc>,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root::service_info,
        crate::handlers::root::service_health,
        crate::handlers::health::health_check,
        crate::handlers::health::detailed_health,
        crate::handlers::health::metrics,
        crate::handlers::health::readiness,
        crate::handlers::health::liveness,
        crate::handlers::dust::get_current_dust,
        crate::handlers::dust::get_city_dust,
        crate::handlers::dust::get_dust_history,
        crate::handlers::cities::list_cities,
        crate::handlers::cities::get_city,
        crate::handlers::predictions::get_predictions,
        crate::handlers::predictions::get_risk_periods,
        crate::handlers::alerts::get_alerts,
        crate::handlers::alerts::get_active_alerts,
        crate::handlers::alerts::get_city_alerts,
        crate::handlers::accuracy::get_overall_accuracy,
        crate::handlers::accuracy::get_city_accuracy,
        crate::handlers::accuracy::trigger_validation,
        crate::handlers::accuracy::get_data_quality,
        crate::handlers::accuracy::get_calibration,
        crate::handlers::accuracy::get_performance,
        crate::handlers::accuracy::get_accuracy_history,
        crate::handlers::analytics::get_overview,
        crate::handlers::analytics::get_city_history,
        crate::handlers::analytics::export_city_data,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            crate::handlers::root::ServiceInfo,
            crate::handlers::root::ServiceFeatures,
            crate::handlers::root::ServiceEndpoints,
            crate::handlers::root::ServiceHealth,
            crate::handlers::health::DetailedHealthResponse,
            crate::handlers::health::ComponentCheck,
            crate::handlers::health::ProbeResponse,
            crate::handlers::dust::HistoryQuery,
            crate::handlers::predictions::PredictionQuery,
            crate::handlers::alerts::CityAlertsResponse,
            crate::handlers::accuracy::CityAccuracyResponse,
            crate::handlers::accuracy::ValidationStarted,
            crate::handlers::accuracy::AccuracyHistoryQuery,
            crate::handlers::analytics::AnalyticsOverview,
            crate::handlers::analytics::ModelAccuracyStats,
            crate::handlers::analytics::CityAnalytics,
            crate::handlers::analytics::DustStatistics,
            crate::handlers::analytics::HourlyAverage,
            crate::handlers::analytics::RiskDistribution,
            crate::handlers::analytics::ExportQuery,
            crate::handlers::analytics::ExportResponse,
            crate::handlers::analytics::CsvExport,
            City,
            CityList,
            CityDustData,
            CurrentDustResponse,
            DustReading,
            DustHistoryResponse,
            DustTrend,
            RiskLevel,
            ForecastPoint,
            ConfidenceInterval,
            ModelBreakdown,
            RiskPeriod,
            RiskPeriodsResponse,
            ForecastSummary,
            PredictionData,
            AccuracyInfo,
            AccuracyMetrics,
            QualityLevel,
            QualityReport,
            Alert,
            AlertList,
            OverallAccuracy,
            AccuracyStatus,
            AccuracyTrend,
            AccuracyStability,
            CityAccuracyStats,
            ValidationReport,
            CalibrationResponse,
            PerformanceReport,
            AccuracyHistoryResponse,
            DataQualityOverview,
            CityQualitySummary,
            ValueRange,
        )
    ),
    tags(
        (name = "service", description = "Service descriptor"),
        (name = "health", description = "Health, readiness and metrics endpoints"),
        (name = "dust", description = "Current and historical dust readings"),
        (name = "cities", description = "Monitored cities"),
        (name = "predictions", description = "Ensemble dust forecasts"),
        (name = "alerts", description = "Dust storm alerts"),
        (name = "accuracy", description = "Forecast accuracy and data quality"),
        (name = "analytics", description = "Historical analytics and exports"),
    ),
    info(
        title = "HABOOB API",
        description = "Dust storm monitoring and forecasting for UAE cities",
        version = "0.1.0",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;
