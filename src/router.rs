use crate::handlers::{
    accuracy::{
        get_accuracy_history, get_calibration, get_city_accuracy, get_data_quality, get_overall_accuracy,
        get_performance, trigger_validation,
    },
    alerts::{get_active_alerts, get_alerts, get_city_alerts},
    analytics::{export_city_data, get_city_history, get_overview},
    cities::{get_city, list_cities},
    dust::{get_city_dust, get_current_dust, get_dust_history},
    health::{detailed_health, health_check, liveness, metrics, readiness},
    predictions::{get_predictions, get_risk_periods},
    root::{service_health, service_info},
    ws::ws_handler,
};
use crate::middleware::{json_errors, rate_limit};
use crate::schemas::{ApiDoc, AppState};
use axum::{
    http::{header, HeaderValue},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, set_header::SetResponseHeaderLayer, timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Service descriptor and live updates
        .route("/", get(service_info))
        .route("/health", get(service_health))
        .route("/ws", get(ws_handler))
        // Dust readings
        .route("/api/v1/dust/current", get(get_current_dust))
        .route("/api/v1/dust/current/:city_id", get(get_city_dust))
        .route("/api/v1/dust/history/:city_id", get(get_dust_history))
        // Cities
        .route("/api/v1/cities", get(list_cities))
        .route("/api/v1/cities/:city_id", get(get_city))
        // Forecasts
        .route("/api/v1/predictions/:city_id", get(get_predictions))
        .route("/api/v1/predictions/:city_id/risk-periods", get(get_risk_periods))
        // Alerts
        .route("/api/v1/alerts", get(get_alerts))
        .route("/api/v1/alerts/active", get(get_active_alerts))
        .route("/api/v1/alerts/city/:city_id", get(get_city_alerts))
        // Accuracy tracking
        .route("/api/v1/accuracy/overall", get(get_overall_accuracy))
        .route("/api/v1/accuracy/city/:city_id", get(get_city_accuracy))
        .route("/api/v1/accuracy/validate", post(trigger_validation))
        .route("/api/v1/accuracy/data-quality", get(get_data_quality))
        .route("/api/v1/accuracy/calibration", get(get_calibration))
        .route("/api/v1/accuracy/performance", get(get_performance))
        .route("/api/v1/accuracy/history/:city_id", get(get_accuracy_history))
        // Analytics
        .route("/api/v1/analytics/overview", get(get_overview))
        .route("/api/v1/analytics/history/:city_id", get(get_city_history))
        .route("/api/v1/analytics/export/:city_id", get(export_city_data))
        // Health and probes
        .route("/api/v1/health", get(health_check))
        .route("/api/v1/health/detailed", get(detailed_health))
        .route("/api/v1/health/metrics", get(metrics))
        .route("/api/v1/health/readiness", get(readiness))
        .route("/api/v1/health/liveness", get(liveness))
        // Swagger UI
        .merge(SwaggerUi::new("/api/docs").url("/api/openapi.json", ApiDoc::openapi()))
        // Add middleware, outermost first
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive())
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::X_FRAME_OPTIONS,
                    HeaderValue::from_static("DENY"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::X_XSS_PROTECTION,
                    HeaderValue::from_static("1; mode=block"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::REFERRER_POLICY,
                    HeaderValue::from_static("strict-origin-when-cross-origin"),
                ))
                .layer(from_fn_with_state(state.clone(), rate_limit))
                .layer(from_fn(json_errors))
                .layer(TimeoutLayer::new(Duration::from_secs(30))),
        )
        .with_state(state)
}
