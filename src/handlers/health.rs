use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{instrument, warn};
use utoipa::ToSchema;

use crate::schemas::{AppState, ErrorResponse, HealthResponse};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ComponentCheck {
    /// healthy or unhealthy
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DetailedHealthResponse {
    /// healthy when every component is, degraded otherwise
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: i64,
    pub checks: BTreeMap<String, ComponentCheck>,
}

/// Readiness and liveness probe body
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProbeResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 500, description = "Service is unhealthy", body = ErrorResponse)
    )
)]
#[instrument]
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, StatusCode> {
    // Test database connection
    let db_status = match state.db.ping().await {
        Ok(_) => "connected".to_string(),
        Err(_) => "disconnected".to_string(),
    };

    let response = HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: db_status,
        timestamp: Utc::now(),
    };

    Ok(Json(response))
}

/// Health of the database, the accuracy tracker and the data quality checker
#[utoipa::path(
    get,
    path = "/api/v1/health/detailed",
    tag = "health",
    responses(
        (status = 200, description = "Component health", body = DetailedHealthResponse)
    )
)]
#[instrument]
pub async fn detailed_health(State(state): State<AppState>) -> Json<DetailedHealthResponse> {
    let mut checks = BTreeMap::new();

    let database = match state.db.ping().await {
        Ok(_) => ComponentCheck {
            status: "healthy".to_string(),
            message: "Connected".to_string(),
        },
        Err(e) => {
            warn!("Database ping failed: {}", e);
            ComponentCheck {
                status: "unhealthy".to_string(),
                message: e.to_string(),
            }
        }
    };
    checks.insert("database".to_string(), database);

    let (accuracy, quality) = {
        let engine = state.engine.lock().await;
        (engine.tracker.overall_accuracy(Utc::now()), engine.quality.quality_report())
    };
    checks.insert(
        "accuracy_tracker".to_string(),
        ComponentCheck {
            status: "healthy".to_string(),
            message: format!("{:.2}% overall accuracy ({:?})", accuracy.overall_accuracy, accuracy.status),
        },
    );
    checks.insert(
        "data_quality".to_string(),
        ComponentCheck {
            status: "healthy".to_string(),
            message: format!("{} cities with baselines", quality.cities_with_baselines),
        },
    );
    checks.insert(
        "websocket".to_string(),
        ComponentCheck {
            status: "healthy".to_string(),
            message: format!("{} subscribers", state.hub.subscriber_count()),
        },
    );

    let healthy = checks.values().all(|c| c.status == "healthy");
    let now = Utc::now();
    Json(DetailedHealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: now,
        uptime_seconds: (now - state.started_at).num_seconds(),
        checks,
    })
}

/// Prometheus text exposition of accuracy metrics
#[utoipa::path(
    get,
    path = "/api/v1/health/metrics",
    tag = "health",
    responses(
        (status = 200, description = "Metrics in Prometheus text format", body = String, content_type = "text/plain")
    )
)]
#[instrument]
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let now = Utc::now();
    let accuracy = state.engine.lock().await.tracker.overall_accuracy(now);
    state.metrics.record(&accuracy, (now - state.started_at).num_seconds());

    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], state.metrics.render())
}

/// Ready once the database answers
#[utoipa::path(
    get,
    path = "/api/v1/health/readiness",
    tag = "health",
    responses(
        (status = 200, description = "Ready to serve", body = ProbeResponse),
        (status = 503, description = "Database unavailable", body = ErrorResponse)
    )
)]
#[instrument]
pub async fn readiness(State(state): State<AppState>) -> Result<Json<ProbeResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.db.ping().await {
        Ok(_) => Ok(Json(ProbeResponse {
            status: "ready".to_string(),
            timestamp: Utc::now(),
        })),
        Err(e) => {
            warn!("Readiness check failed: {}", e);
            Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new("Database unavailable", "NOT_READY")),
            ))
        }
    }
}

/// Alive as long as the process answers
#[utoipa::path(
    get,
    path = "/api/v1/health/liveness",
    tag = "health",
    responses(
        (status = 200, description = "Process is alive", body = ProbeResponse)
    )
)]
pub async fn liveness() -> Json<ProbeResponse> {
    Json(ProbeResponse {
        status: "alive".to_string(),
        timestamp: Utc::now(),
    })
}
