use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::Utc;
use common::{City, PredictionData, RiskPeriodsResponse};
use compute::ensemble::{DEFAULT_HORIZON_HOURS, MAX_HORIZON_HOURS};
use serde::Deserialize;
use tracing::{debug, error, info, instrument, trace};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::schemas::{prediction_cache_key, AppState, CachedData, ErrorResponse};
use crate::services::collector::to_observation;

/// Query parameters for forecasts
#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
pub struct PredictionQuery {
    /// Forecast horizon in hours (default: 72, max: 120)
    #[validate(range(min = 1, max = 120))]
    pub hours: Option<u32>,
}

async fn forecast(
    state: &AppState,
    city: &City,
    hours: u32,
) -> Result<PredictionData, (StatusCode, Json<ErrorResponse>)> {
    let cache_key = prediction_cache_key(&city.id, hours);
    if let Some(CachedData::Prediction(prediction)) = state.cache.get(&cache_key).await {
        trace!("Serving cached {}h forecast for {}", hours, city.id);
        return Ok(prediction);
    }

    let current = state.collector.current_reading(state, city).await;
    let observation = to_observation(&current);

    let result = {
        let mut engine = state.engine.lock().await;
        engine.predict(&observation, hours, Utc::now())
    };

    match result {
        Ok(prediction) => {
            info!("Generated {}h forecast for {}", hours, city.id);
            state
                .cache
                .insert(cache_key, CachedData::Prediction(prediction.clone()))
                .await;
            Ok(prediction)
        }
        Err(e) => {
            error!("Forecast failed for {}: {}", city.id, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(e.to_string(), "PREDICTION_ERROR")),
            ))
        }
    }
}

/// Ensemble dust forecast for one city
#[utoipa::path(
    get,
    path = "/api/v1/predictions/{city_id}",
    tag = "predictions",
    params(
        ("city_id" = String, Path, description = "City identifier"),
        PredictionQuery
    ),
    responses(
        (status = 200, description = "Hourly forecast with risk periods", body = PredictionData),
        (status = 400, description = "Horizon outside 1..=120"),
        (status = 404, description = "City not found", body = ErrorResponse),
        (status = 500, description = "Forecast failed", body = ErrorResponse)
    )
)]
#[instrument]
pub async fn get_predictions(
    Path(city_id): Path<String>,
    Valid(Query(query)): Valid<Query<PredictionQuery>>,
    State(state): State<AppState>,
) -> Result<Json<PredictionData>, (StatusCode, Json<ErrorResponse>)> {
    let Some(city) = state.city(&city_id) else {
        return Err((StatusCode::NOT_FOUND, Json(ErrorResponse::city_not_found(&city_id))));
    };
    let hours = query.hours.unwrap_or(DEFAULT_HORIZON_HOURS).min(MAX_HORIZON_HOURS);
    debug!("Forecasting {} hours for {}", hours, city_id);

    forecast(&state, city, hours).await.map(Json)
}

/// Upcoming HIGH-or-worse periods in the 72-hour forecast
#[utoipa::path(
    get,
    path = "/api/v1/predictions/{city_id}/risk-periods",
    tag = "predictions",
    params(
        ("city_id" = String, Path, description = "City identifier"),
    ),
    responses(
        (status = 200, description = "Forecast risk periods", body = RiskPeriodsResponse),
        (status = 404, description = "City not found", body = ErrorResponse),
        (status = 500, description = "Forecast failed", body = ErrorResponse)
    )
)]
#[instrument]
pub async fn get_risk_periods(
    Path(city_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<RiskPeriodsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let Some(city) = state.city(&city_id) else {
        return Err((StatusCode::NOT_FOUND, Json(ErrorResponse::city_not_found(&city_id))));
    };

    let prediction = forecast(&state, city, DEFAULT_HORIZON_HOURS).await?;
    Ok(Json(RiskPeriodsResponse {
        city_id: city.id.clone(),
        risk_periods: prediction.risk_periods,
    }))
}
