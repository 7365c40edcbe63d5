use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use common::{Alert, AlertList};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, trace};
use utoipa::ToSchema;

use crate::schemas::{AppState, ErrorResponse};
use crate::services::alerts;

/// Alerts raised for a single city
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CityAlertsResponse {
    pub city_id: String,
    pub count: usize,
    /// Newest first
    pub alerts: Vec<Alert>,
}

fn database_failure(context: &str, e: sea_orm::DbErr) -> (StatusCode, Json<ErrorResponse>) {
    error!("Failed to load {}: {}", context, e);
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse::database_error()))
}

/// Most recent alerts across all cities
#[utoipa::path(
    get,
    path = "/api/v1/alerts",
    tag = "alerts",
    responses(
        (status = 200, description = "Up to 100 most recent alerts", body = AlertList),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument]
pub async fn get_alerts(State(state): State<AppState>) -> Result<Json<AlertList>, (StatusCode, Json<ErrorResponse>)> {
    trace!("Entering get_alerts function");

    let alerts = alerts::list_alerts(&state.db)
        .await
        .map_err(|e| database_failure("alerts", e))?;
    debug!("Returning {} alerts", alerts.len());

    Ok(Json(AlertList {
        count: alerts.len(),
        alerts,
    }))
}

/// Alerts that have not expired yet
#[utoipa::path(
    get,
    path = "/api/v1/alerts/active",
    tag = "alerts",
    responses(
        (status = 200, description = "Unexpired alerts", body = AlertList),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument]
pub async fn get_active_alerts(
    State(state): State<AppState>,
) -> Result<Json<AlertList>, (StatusCode, Json<ErrorResponse>)> {
    let alerts = alerts::active_alerts(&state.db, Utc::now())
        .await
        .map_err(|e| database_failure("active alerts", e))?;

    Ok(Json(AlertList {
        count: alerts.len(),
        alerts,
    }))
}

/// Alert history for one city
#[utoipa::path(
    get,
    path = "/api/v1/alerts/city/{city_id}",
    tag = "alerts",
    params(
        ("city_id" = String, Path, description = "City identifier"),
    ),
    responses(
        (status = 200, description = "City alerts", body = CityAlertsResponse),
        (status = 404, description = "City not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument]
pub async fn get_city_alerts(
    Path(city_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<CityAlertsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let Some(city) = state.city(&city_id) else {
        return Err((StatusCode::NOT_FOUND, Json(ErrorResponse::city_not_found(&city_id))));
    };

    let alerts = alerts::city_alerts(&state.db, &city.id)
        .await
        .map_err(|e| database_failure("city alerts", e))?;

    Ok(Json(CityAlertsResponse {
        city_id: city.id.clone(),
        count: alerts.len(),
        alerts,
    }))
}
