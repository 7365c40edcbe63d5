use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use common::{City, CityList};
use tracing::{instrument, warn};

use crate::schemas::{AppState, ErrorResponse};

/// All monitored cities
#[utoipa::path(
    get,
    path = "/api/v1/cities",
    tag = "cities",
    responses(
        (status = 200, description = "Monitored cities", body = CityList)
    )
)]
#[instrument]
pub async fn list_cities(State(state): State<AppState>) -> Json<CityList> {
    let cities = state.cities.as_ref().clone();
    Json(CityList {
        count: cities.len(),
        cities,
    })
}

/// One monitored city
#[utoipa::path(
    get,
    path = "/api/v1/cities/{city_id}",
    tag = "cities",
    params(
        ("city_id" = String, Path, description = "City identifier"),
    ),
    responses(
        (status = 200, description = "City details", body = City),
        (status = 404, description = "City not found", body = ErrorResponse)
    )
)]
#[instrument]
pub async fn get_city(
    Path(city_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<City>, (StatusCode, Json<ErrorResponse>)> {
    match state.city(&city_id) {
        Some(city) => Ok(Json(city.clone())),
        None => {
            warn!("Requested unknown city: {}", city_id);
            Err((StatusCode::NOT_FOUND, Json(ErrorResponse::city_not_found(&city_id))))
        }
    }
}
