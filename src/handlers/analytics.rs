use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use axum_valid::Valid;
use chrono::{DateTime, Duration, Utc};
use common::{round_to, City, DustReading, RiskLevel};
use compute::stats;
use model::entities::dust_reading;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, error, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::schemas::{AppState, ErrorResponse};
use crate::services::{alerts, store};

const DEFAULT_PERIOD_HOURS: u32 = 168;
/// Hourly averages beyond this many buckets are dropped, oldest first
const MAX_HOURLY_AVERAGES: usize = 168;
const MODEL_ACCURACY_WINDOW_DAYS: i64 = 30;
const CSV_HEADER: &str = "timestamp,dust,pm10,pm2_5,temperature,humidity,wind_speed,risk_level";

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ModelAccuracyStats {
    /// Validations stored in the last 30 days
    pub validations: usize,
    pub average_accuracy: Option<f64>,
    pub average_mae: Option<f64>,
    pub average_rmse: Option<f64>,
}

/// Dashboard summary over the last 24 hours
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AnalyticsOverview {
    pub total_readings: usize,
    pub avg_dust_24h: f64,
    pub max_dust_24h: f64,
    pub min_dust_24h: f64,
    pub active_alerts: usize,
    pub model_accuracy: ModelAccuracyStats,
    pub cities_monitored: usize,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DustStatistics {
    pub avg_dust: f64,
    pub max_dust: f64,
    pub min_dust: f64,
    /// Population standard deviation, 0 for a single reading
    pub std_dev: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HourlyAverage {
    /// Hour bucket formatted as `YYYY-MM-DD HH:00`
    pub time: String,
    pub avg_dust: f64,
}

/// Reading counts per risk band
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct RiskDistribution {
    pub low: usize,
    pub moderate: usize,
    pub high: usize,
    pub severe: usize,
    pub extreme: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CityAnalytics {
    pub city_id: String,
    pub city_name: String,
    pub period_hours: u32,
    pub data_points: usize,
    pub statistics: Option<DustStatistics>,
    pub hourly_averages: Vec<HourlyAverage>,
    pub risk_distribution: RiskDistribution,
    /// Set when there is no stored data for the period
    pub message: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams, Validate)]
pub struct AnalyticsHistoryQuery {
    /// Period in hours (default: 168, max: 720)
    #[validate(range(min = 1, max = 720))]
    pub hours: Option<u32>,
}

#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
pub struct ExportQuery {
    /// `json` (default) or `csv`
    pub format: Option<String>,
    /// Period in hours (default: 168, max: 720)
    #[validate(range(min = 1, max = 720))]
    pub hours: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExportResponse {
    pub city: City,
    pub exported_at: DateTime<Utc>,
    pub period_hours: u32,
    pub data: Vec<DustReading>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CsvExport {
    pub csv: String,
}

fn database_failure(e: sea_orm::DbErr) -> (StatusCode, Json<ErrorResponse>) {
    error!("Analytics query failed: {}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse::database_error()))
}

fn dust_values(readings: &[dust_reading::Model]) -> Vec<f64> {
    readings.iter().map(|r| r.dust).collect()
}

fn statistics(values: &[f64]) -> Option<DustStatistics> {
    let avg = stats::mean(values)?;
    let max = values.iter().copied().fold(f64::MIN, f64::max);
    let min = values.iter().copied().fold(f64::MAX, f64::min);
    let std_dev = if values.len() > 1 { stats::std_dev(values).unwrap_or(0.0) } else { 0.0 };
    Some(DustStatistics {
        avg_dust: round_to(avg, 2),
        max_dust: round_to(max, 2),
        min_dust: round_to(min, 2),
        std_dev: round_to(std_dev, 2),
    })
}

/// Average dust per clock hour, oldest first, keeping the newest 168 hours.
fn hourly_averages(readings: &[dust_reading::Model]) -> Vec<HourlyAverage> {
    let mut buckets: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for reading in readings {
        let key = reading.timestamp.format("%Y-%m-%d %H:00").to_string();
        buckets.entry(key).or_default().push(reading.dust);
    }

    let averages: Vec<HourlyAverage> = buckets
        .into_iter()
        .filter_map(|(time, values)| {
            stats::mean(&values).map(|avg| HourlyAverage {
                time,
                avg_dust: round_to(avg, 2),
            })
        })
        .collect();

    let skip = averages.len().saturating_sub(MAX_HOURLY_AVERAGES);
    averages.into_iter().skip(skip).collect()
}

fn risk_distribution(values: &[f64]) -> RiskDistribution {
    let mut distribution = RiskDistribution::default();
    for value in values {
        match RiskLevel::from_dust(*value) {
            RiskLevel::Low => distribution.low += 1,
            RiskLevel::Moderate => distribution.moderate += 1,
            RiskLevel::High => distribution.high += 1,
            RiskLevel::Severe => distribution.severe += 1,
            RiskLevel::Extreme => distribution.extreme += 1,
        }
    }
    distribution
}

fn csv_field<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn to_csv(readings: &[DustReading]) -> String {
    let mut lines = Vec::with_capacity(readings.len() + 1);
    lines.push(CSV_HEADER.to_string());
    for r in readings {
        lines.push(format!(
            "{},{},{},{},{},{},{},{}",
            r.timestamp.to_rfc3339(),
            r.dust,
            csv_field(r.pm10),
            csv_field(r.pm2_5),
            csv_field(r.temperature),
            csv_field(r.humidity),
            csv_field(r.wind_speed),
            r.risk_level.as_str()
        ));
    }
    lines.join("\n")
}

/// Summary of the last 24 hours across all cities
#[utoipa::path(
    get,
    path = "/api/v1/analytics/overview",
    tag = "analytics",
    responses(
        (status = 200, description = "Dashboard overview", body = AnalyticsOverview),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument]
pub async fn get_overview(
    State(state): State<AppState>,
) -> Result<Json<AnalyticsOverview>, (StatusCode, Json<ErrorResponse>)> {
    trace!("Entering get_overview function");
    let now = Utc::now();

    let readings = store::all_readings_since(&state.db, now - Duration::hours(24))
        .await
        .map_err(database_failure)?;
    let values = dust_values(&readings);
    let summary = statistics(&values);

    let active_alerts = alerts::active_alerts(&state.db, now).await.map_err(database_failure)?;

    let validations = store::accuracy_since(&state.db, now - Duration::days(MODEL_ACCURACY_WINDOW_DAYS))
        .await
        .map_err(database_failure)?;
    let accuracy: Vec<f64> = validations.iter().map(|v| v.accuracy_percent).collect();
    let mae: Vec<f64> = validations.iter().map(|v| v.mae).collect();
    let rmse: Vec<f64> = validations.iter().map(|v| v.rmse).collect();
    debug!(
        "Overview over {} readings and {} validations",
        readings.len(),
        validations.len()
    );

    Ok(Json(AnalyticsOverview {
        total_readings: readings.len(),
        avg_dust_24h: summary.as_ref().map(|s| s.avg_dust).unwrap_or(0.0),
        max_dust_24h: summary.as_ref().map(|s| s.max_dust).unwrap_or(0.0),
        min_dust_24h: summary.as_ref().map(|s| s.min_dust).unwrap_or(0.0),
        active_alerts: active_alerts.len(),
        model_accuracy: ModelAccuracyStats {
            validations: validations.len(),
            average_accuracy: stats::mean(&accuracy).map(|v| round_to(v, 2)),
            average_mae: stats::mean(&mae).map(|v| round_to(v, 2)),
            average_rmse: stats::mean(&rmse).map(|v| round_to(v, 2)),
        },
        cities_monitored: state.cities.len(),
        last_updated: now,
    }))
}

/// Statistics, hourly averages and risk distribution for one city
#[utoipa::path(
    get,
    path = "/api/v1/analytics/history/{city_id}",
    tag = "analytics",
    params(
        ("city_id" = String, Path, description = "City identifier"),
        AnalyticsHistoryQuery
    ),
    responses(
        (status = 200, description = "City analytics", body = CityAnalytics),
        (status = 400, description = "Hours outside 1..=720"),
        (status = 404, description = "City not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument]
pub async fn get_city_history(
    Path(city_id): Path<String>,
    Valid(Query(query)): Valid<Query<AnalyticsHistoryQuery>>,
    State(state): State<AppState>,
) -> Result<Json<CityAnalytics>, (StatusCode, Json<ErrorResponse>)> {
    let Some(city) = state.city(&city_id) else {
        return Err((StatusCode::NOT_FOUND, Json(ErrorResponse::city_not_found(&city_id))));
    };
    let hours = query.hours.unwrap_or(DEFAULT_PERIOD_HOURS);

    let readings = store::readings_since(&state.db, &city.id, Utc::now() - Duration::hours(hours as i64))
        .await
        .map_err(database_failure)?;

    let values = dust_values(&readings);
    let message = if readings.is_empty() {
        Some("No historical data available yet".to_string())
    } else {
        None
    };

    Ok(Json(CityAnalytics {
        city_id: city.id.clone(),
        city_name: city.name.clone(),
        period_hours: hours,
        data_points: readings.len(),
        statistics: statistics(&values),
        hourly_averages: hourly_averages(&readings),
        risk_distribution: risk_distribution(&values),
        message,
    }))
}

/// Export stored readings as JSON or CSV
#[utoipa::path(
    get,
    path = "/api/v1/analytics/export/{city_id}",
    tag = "analytics",
    params(
        ("city_id" = String, Path, description = "City identifier"),
        ExportQuery
    ),
    responses(
        (status = 200, description = "Readings as JSON, or a `CsvExport` when format=csv", body = ExportResponse),
        (status = 400, description = "Unsupported format", body = ErrorResponse),
        (status = 404, description = "City not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument]
pub async fn export_city_data(
    Path(city_id): Path<String>,
    Valid(Query(query)): Valid<Query<ExportQuery>>,
    State(state): State<AppState>,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let Some(city) = state.city(&city_id) else {
        return Err((StatusCode::NOT_FOUND, Json(ErrorResponse::city_not_found(&city_id))));
    };
    let format = query.format.as_deref().unwrap_or("json").to_ascii_lowercase();
    if format != "json" && format != "csv" {
        warn!("Unsupported export format requested: {}", format);
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Format must be 'json' or 'csv'", "INVALID_FORMAT")),
        ));
    }
    let hours = query.hours.unwrap_or(DEFAULT_PERIOD_HOURS);

    let readings = store::readings_since(&state.db, &city.id, Utc::now() - Duration::hours(hours as i64))
        .await
        .map_err(database_failure)?;
    let data: Vec<DustReading> = readings.iter().map(store::to_dust_reading).collect();
    debug!("Exporting {} readings for {} as {}", data.len(), city.id, format);

    let response = if format == "csv" {
        Json(CsvExport { csv: to_csv(&data) }).into_response()
    } else {
        Json(ExportResponse {
            city: city.clone(),
            exported_at: Utc::now(),
            period_hours: hours,
            data,
        })
        .into_response()
    };
    Ok(response)
}
