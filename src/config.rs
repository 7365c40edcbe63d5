use anyhow::{Context, Result};
use chrono::Utc;
use common::uae_cities;
use compute::default_engine;
use moka::future::Cache;
use sea_orm::{Database, DatabaseConnection};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::middleware::RateLimiter;
use crate::schemas::AppState;
use crate::services::collector::DataCollector;
use crate::services::hub::BroadcastHub;
use crate::services::sources::{default_sources, DataSource};
use crate::services::telemetry::MetricsRecorder;
use crate::services::validation::load_calibration;

/// Runtime settings, layered from defaults and `HABOOB_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Seconds between background collection cycles
    pub collection_interval_secs: u64,
    /// Validate accuracy for all cities every this many cycles
    pub validation_every_cycles: u64,
    /// How long a raised alert stays active
    pub alert_ttl_hours: i64,
    pub rate_limit_per_minute: usize,
    /// Lifetime of cached current readings and predictions
    pub cache_ttl_secs: u64,
    /// Timeout for upstream data source requests
    pub http_timeout_secs: u64,
    /// Seed for the climatology member's noise
    pub model_seed: u64,
    /// Start the background collector together with the server
    pub collector_enabled: bool,
    pub aqicn_api_key: Option<String>,
    pub openweather_api_key: Option<String>,
    pub weatherapi_key: Option<String>,
    pub weatherstack_api_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            collection_interval_secs: 60,
            validation_every_cycles: 60,
            alert_ttl_hours: 6,
            rate_limit_per_minute: 120,
            cache_ttl_secs: 300,
            http_timeout_secs: 30,
            model_seed: 42,
            collector_enabled: true,
            aqicn_api_key: None,
            openweather_api_key: None,
            weatherapi_key: None,
            weatherstack_api_key: None,
        }
    }
}

impl Settings {
    /// Load settings from `.env` and the environment on top of the defaults.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Settings::default();

        let settings = config::Config::builder()
            .set_default("collection_interval_secs", defaults.collection_interval_secs as i64)?
            .set_default("validation_every_cycles", defaults.validation_every_cycles as i64)?
            .set_default("alert_ttl_hours", defaults.alert_ttl_hours)?
            .set_default("rate_limit_per_minute", defaults.rate_limit_per_minute as i64)?
            .set_default("cache_ttl_secs", defaults.cache_ttl_secs as i64)?
            .set_default("http_timeout_secs", defaults.http_timeout_secs as i64)?
            .set_default("model_seed", defaults.model_seed as i64)?
            .set_default("collector_enabled", defaults.collector_enabled)?
            .add_source(config::Environment::with_prefix("HABOOB").try_parsing(true))
            .build()
            .context("Failed to build configuration")?
            .try_deserialize::<Settings>()
            .context("Invalid HABOOB_* configuration")?;

        if settings.collection_interval_secs == 0 || settings.validation_every_cycles == 0 {
            anyhow::bail!("collection_interval_secs and validation_every_cycles must be positive");
        }
        Ok(settings)
    }
}

/// Build application state around an existing connection.
///
/// `sources` is the set of upstream providers the collector queries; with no
/// sources every collection falls back to cached or synthetic readings.
pub fn build_app_state(db: DatabaseConnection, settings: Settings, sources: Vec<Box<dyn DataSource>>) -> AppState {
    let cities = uae_cities();
    let engine = default_engine(settings.model_seed, cities.len());

    let cache = Cache::builder()
        .max_capacity(1000)
        .time_to_live(Duration::from_secs(settings.cache_ttl_secs))
        .build();

    AppState {
        db,
        cache,
        engine: Arc::new(Mutex::new(engine)),
        collector: Arc::new(DataCollector::new(sources)),
        hub: BroadcastHub::new(256),
        rate_limiter: Arc::new(RateLimiter::new(settings.rate_limit_per_minute)),
        metrics: Arc::new(MetricsRecorder::new()),
        cities: Arc::new(cities),
        settings: Arc::new(settings),
        started_at: Utc::now(),
    }
}

/// Initialize application state with a specific database URL
pub async fn initialize_app_state_with_url(database_url: &str, settings: Settings) -> Result<AppState> {
    info!("Connecting to database: {}", database_url);
    let db = Database::connect(database_url).await?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.http_timeout_secs))
        .user_agent(concat!("haboob/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to create HTTP client")?;

    let sources = default_sources(&client, &settings);
    debug!(
        "Configured data sources: {:?}",
        sources.iter().map(|s| s.name()).collect::<Vec<_>>()
    );

    let state = build_app_state(db, settings, sources);

    match load_calibration(&state).await {
        Ok(loaded) => info!("Loaded {} calibration factors", loaded),
        Err(e) => warn!("Could not load calibration factors: {}", e),
    }

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.collection_interval_secs, 60);
        assert_eq!(settings.alert_ttl_hours, 6);
        assert_eq!(settings.rate_limit_per_minute, 120);
        assert_eq!(settings.cache_ttl_secs, 300);
        assert!(settings.aqicn_api_key.is_none());
    }

    #[tokio::test]
    async fn test_build_app_state_covers_all_cities() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let state = build_app_state(db, Settings::default(), Vec::new());

        assert_eq!(state.cities.len(), 8);
        assert!(state.city("abu_dhabi").is_some());
        assert!(state.city("riyadh").is_none());
        assert_eq!(state.rate_limiter.limit(), 120);
        assert!(state.collector.source_names().is_empty());
    }
}
