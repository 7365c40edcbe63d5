use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use common::{
    AccuracyHistoryResponse, CalibrationResponse, DataQualityOverview, OverallAccuracy, PerformanceReport,
    ValidationReport,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, trace};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::schemas::{AppState, ErrorResponse};
use crate::services::validation::{self, CityValidation};

/// Outcome of validating one city on demand
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CityAccuracyResponse {
    pub city_id: String,
    /// Set when the city could not be scored
    pub message: Option<String>,
    pub accuracy: Option<f64>,
    pub report: Option<ValidationReport>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ValidationStarted {
    pub message: String,
    pub status: String,
}

#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
pub struct AccuracyHistoryQuery {
    /// Days of validation history (default: 7, max: 30)
    #[validate(range(min = 1, max = 30))]
    pub days: Option<u32>,
}

/// Ensemble accuracy across all validated cities
#[utoipa::path(
    get,
    path = "/api/v1/accuracy/overall",
    tag = "accuracy",
    responses(
        (status = 200, description = "Overall forecast accuracy", body = OverallAccuracy)
    )
)]
#[instrument]
pub async fn get_overall_accuracy(State(state): State<AppState>) -> Json<OverallAccuracy> {
    trace!("Entering get_overall_accuracy function");
    Json(state.engine.lock().await.tracker.overall_accuracy(Utc::now()))
}

/// Validate one city's recent forecasts against stored readings
#[utoipa::path(
    get,
    path = "/api/v1/accuracy/city/{city_id}",
    tag = "accuracy",
    params(
        ("city_id" = String, Path, description = "City identifier"),
    ),
    responses(
        (status = 200, description = "Validation result or the reason none was produced", body = CityAccuracyResponse),
        (status = 404, description = "City not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument]
pub async fn get_city_accuracy(
    Path(city_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<CityAccuracyResponse>, (StatusCode, Json<ErrorResponse>)> {
    let Some(city) = state.city(&city_id) else {
        return Err((StatusCode::NOT_FOUND, Json(ErrorResponse::city_not_found(&city_id))));
    };

    let outcome = match validation::validate_city(&state, &city.id).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Database error while validating {}: {}", city.id, e);
            return Err((StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse::database_error())));
        }
    };

    let mut response = CityAccuracyResponse {
        city_id: city.id.clone(),
        message: None,
        accuracy: None,
        report: None,
        timestamp: Utc::now(),
    };
    match outcome {
        CityValidation::NoReadings => {
            response.message = Some("No readings found for validation".to_string());
        }
        CityValidation::Unscored(e) => {
            response.message = Some(e.to_string());
        }
        CityValidation::Validated(report) => {
            response.accuracy = Some(report.accuracy);
            response.report = Some(report);
        }
    }
    Ok(Json(response))
}

/// Start a validation pass over all cities in the background
#[utoipa::path(
    post,
    path = "/api/v1/accuracy/validate",
    tag = "accuracy",
    responses(
        (status = 202, description = "Validation started", body = ValidationStarted)
    )
)]
#[instrument]
pub async fn trigger_validation(State(state): State<AppState>) -> (StatusCode, Json<ValidationStarted>) {
    info!("Manual validation requested");
    let background = state.clone();
    tokio::spawn(async move {
        let validated = validation::validate_all_cities(&background).await;
        debug!("Manual validation scored {} cities", validated);
    });

    (
        StatusCode::ACCEPTED,
        Json(ValidationStarted {
            message: "Validation started".to_string(),
            status: "processing".to_string(),
        }),
    )
}

/// Data quality statistics per city
#[utoipa::path(
    get,
    path = "/api/v1/accuracy/data-quality",
    tag = "accuracy",
    responses(
        (status = 200, description = "Data quality overview", body = DataQualityOverview)
    )
)]
#[instrument]
pub async fn get_data_quality(State(state): State<AppState>) -> Json<DataQualityOverview> {
    Json(state.engine.lock().await.quality.quality_report())
}

/// Current per-city calibration factors
#[utoipa::path(
    get,
    path = "/api/v1/accuracy/calibration",
    tag = "accuracy",
    responses(
        (status = 200, description = "Calibration factors", body = CalibrationResponse)
    )
)]
#[instrument]
pub async fn get_calibration(State(state): State<AppState>) -> Json<CalibrationResponse> {
    Json(state.engine.lock().await.tracker.calibration_factors(Utc::now()))
}

/// Validation counts, calibration factors and bias corrections
#[utoipa::path(
    get,
    path = "/api/v1/accuracy/performance",
    tag = "accuracy",
    responses(
        (status = 200, description = "Model performance report", body = PerformanceReport)
    )
)]
#[instrument]
pub async fn get_performance(State(state): State<AppState>) -> Json<PerformanceReport> {
    Json(state.engine.lock().await.tracker.performance_report(Utc::now()))
}

/// Validation accuracy history for one city
#[utoipa::path(
    get,
    path = "/api/v1/accuracy/history/{city_id}",
    tag = "accuracy",
    params(
        ("city_id" = String, Path, description = "City identifier"),
        AccuracyHistoryQuery
    ),
    responses(
        (status = 200, description = "Accuracy history", body = AccuracyHistoryResponse),
        (status = 400, description = "Days outside 1..=30"),
        (status = 404, description = "City not found", body = ErrorResponse)
    )
)]
#[instrument]
pub async fn get_accuracy_history(
    Path(city_id): Path<String>,
    Valid(Query(query)): Valid<Query<AccuracyHistoryQuery>>,
    State(state): State<AppState>,
) -> Result<Json<AccuracyHistoryResponse>, (StatusCode, Json<ErrorResponse>)> {
    let Some(city) = state.city(&city_id) else {
        return Err((StatusCode::NOT_FOUND, Json(ErrorResponse::city_not_found(&city_id))));
    };
    let days = query.days.unwrap_or(7);
    debug!("Fetching {} days of accuracy history for {}", days, city.id);

    // One validation per hour at most
    let limit = days as usize * 24;
    Ok(Json(state.engine.lock().await.tracker.accuracy_history(&city.id, limit, Utc::now())))
}
