use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{Duration, Utc};
use common::{CityDustData, CurrentDustResponse, DustHistoryResponse};
use futures::future::join_all;
use serde::Deserialize;
use tracing::{debug, error, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::schemas::{current_cache_key, AppState, CachedData, ErrorResponse};
use crate::services::store;

/// Query parameters for reading history
#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
pub struct HistoryQuery {
    /// Hours of history to return (default: 24, max one week)
    #[validate(range(min = 1, max = 168))]
    pub hours: Option<u32>,
}

/// Current conditions for every city
#[utoipa::path(
    get,
    path = "/api/v1/dust/current",
    tag = "dust",
    responses(
        (status = 200, description = "Current readings for all cities", body = CurrentDustResponse)
    )
)]
#[instrument]
pub async fn get_current_dust(State(state): State<AppState>) -> Json<CurrentDustResponse> {
    trace!("Entering get_current_dust function");

    let mut cities: Vec<CityDustData> = Vec::with_capacity(state.cities.len());
    for city in state.cities.iter() {
        if let Some(CachedData::Current(data)) = state.cache.get(&current_cache_key(&city.id)).await {
            cities.push(data);
        }
    }

    if cities.is_empty() {
        debug!("No cached readings, collecting all cities");
        let collector = &state.collector;
        cities = join_all(state.cities.iter().map(|city| collector.current_reading(&state, city))).await;
    }
    cities.sort_by(|a, b| a.city_name.cmp(&b.city_name));

    Json(CurrentDustResponse {
        timestamp: Utc::now(),
        count: cities.len(),
        cities,
    })
}

/// Current conditions for one city
#[utoipa::path(
    get,
    path = "/api/v1/dust/current/{city_id}",
    tag = "dust",
    params(
        ("city_id" = String, Path, description = "City identifier, e.g. dubai"),
    ),
    responses(
        (status = 200, description = "Current reading", body = CityDustData),
        (status = 404, description = "City not found", body = ErrorResponse)
    )
)]
#[instrument]
pub async fn get_city_dust(
    Path(city_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<CityDustData>, (StatusCode, Json<ErrorResponse>)> {
    let Some(city) = state.city(&city_id) else {
        warn!("Requested unknown city: {}", city_id);
        return Err((StatusCode::NOT_FOUND, Json(ErrorResponse::city_not_found(&city_id))));
    };

    Ok(Json(state.collector.current_reading(&state, city).await))
}

/// Stored readings for one city, oldest first
#[utoipa::path(
    get,
    path = "/api/v1/dust/history/{city_id}",
    tag = "dust",
    params(
        ("city_id" = String, Path, description = "City identifier"),
        HistoryQuery
    ),
    responses(
        (status = 200, description = "Reading history", body = DustHistoryResponse),
        (status = 400, description = "Invalid query"),
        (status = 404, description = "City not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument]
pub async fn get_dust_history(
    Path(city_id): Path<String>,
    Valid(Query(query)): Valid<Query<HistoryQuery>>,
    State(state): State<AppState>,
) -> Result<Json<DustHistoryResponse>, (StatusCode, Json<ErrorResponse>)> {
    let Some(city) = state.city(&city_id) else {
        return Err((StatusCode::NOT_FOUND, Json(ErrorResponse::city_not_found(&city_id))));
    };
    let hours = query.hours.unwrap_or(24);
    debug!("Fetching {}h of history for {}", hours, city_id);

    let since = Utc::now() - Duration::hours(hours as i64);
    let readings = match store::readings_since(&state.db, &city.id, since).await {
        Ok(readings) => readings,
        Err(e) => {
            error!("Failed to load history for {}: {}", city_id, e);
            return Err((StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse::database_error())));
        }
    };

    let data: Vec<_> = readings.iter().map(store::to_dust_reading).collect();
    Ok(Json(DustHistoryResponse {
        city_id: city.id.clone(),
        city_name: city.name.clone(),
        hours,
        count: data.len(),
        data,
    }))
}
