use axum::{extract::State, response::Json};
use chrono::{DateTime, Utc};
use compute::accuracy::ENSEMBLE_MODELS;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;

use crate::schemas::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ServiceFeatures {
    pub ml_models: usize,
    pub data_sources: Vec<String>,
    pub cities: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ServiceEndpoints {
    pub api: String,
    pub docs: String,
    pub health: String,
    pub accuracy: String,
    pub metrics: String,
    pub websocket: String,
}

/// Service descriptor returned at `/`
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub features: ServiceFeatures,
    pub endpoints: ServiceEndpoints,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ServiceHealth {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

/// Describe the service and where its endpoints live
#[utoipa::path(
    get,
    path = "/",
    tag = "service",
    responses(
        (status = 200, description = "Service descriptor", body = ServiceInfo)
    )
)]
#[instrument]
pub async fn service_info(State(state): State<AppState>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: "HABOOB".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "production".to_string(),
        timestamp: Utc::now(),
        features: ServiceFeatures {
            ml_models: ENSEMBLE_MODELS,
            data_sources: state.collector.source_names(),
            cities: state.cities.len(),
        },
        endpoints: ServiceEndpoints {
            api: "/api/v1".to_string(),
            docs: "/api/docs".to_string(),
            health: "/api/v1/health".to_string(),
            accuracy: "/api/v1/accuracy/overall".to_string(),
            metrics: "/api/v1/health/metrics".to_string(),
            websocket: "/ws".to_string(),
        },
    })
}

/// Shallow liveness check for load balancers
#[utoipa::path(
    get,
    path = "/health",
    tag = "service",
    responses(
        (status = 200, description = "Service is up", body = ServiceHealth)
    )
)]
pub async fn service_health() -> Json<ServiceHealth> {
    Json(ServiceHealth {
        status: "healthy".to_string(),
        service: "haboob".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}
