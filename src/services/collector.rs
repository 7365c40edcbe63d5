//! Collection of current conditions from all sources, city by city.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use common::{round_to, Alert, City, CityDustData, DustTrend, PredictionData, RiskLevel};
use compute::ensemble::DEFAULT_HORIZON_HOURS;
use compute::fusion::{self, SourceReading};
use compute::observation::Observation;
use futures::future::join_all;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::schemas::{current_cache_key, AppState, CachedData};
use crate::services::sources::DataSource;
use crate::services::{alerts, store, validation};

const CACHED_QUALITY: &str = "cached";
const FALLBACK_QUALITY: &str = "fallback";
const CACHED_CONFIDENCE: f64 = 40.0;
const SYNTHETIC_CONFIDENCE: f64 = 25.0;
const DEFAULT_VISIBILITY: f64 = 10_000.0;
/// Forecasts are persisted at most this often per city
const FORECAST_SAVE_INTERVAL_MINUTES: i64 = 60;

#[derive(Debug)]
pub struct DataCollector {
    sources: Vec<Box<dyn DataSource>>,
    /// Dust from each city's previous collection, for the trend
    previous_dust: Mutex<HashMap<String, f64>>,
    forecasts_saved_at: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl DataCollector {
    pub fn new(sources: Vec<Box<dyn DataSource>>) -> Self {
        Self {
            sources,
            previous_dust: Mutex::new(HashMap::new()),
            forecasts_saved_at: Mutex::new(HashMap::new()),
        }
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    /// Query every source concurrently, keeping the ones that answered.
    async fn fetch_sources(&self, city: &City) -> Vec<SourceReading> {
        let results = join_all(self.sources.iter().map(|s| s.fetch(city.lat, city.lon))).await;

        self.sources
            .iter()
            .zip(results)
            .filter_map(|(source, result)| match result {
                Ok(observation) => Some(SourceReading {
                    source: source.name().to_string(),
                    weight: source.weight(),
                    observation,
                }),
                Err(e) => {
                    warn!("{} failed for {}: {:#}", source.name(), city.id, e);
                    None
                }
            })
            .collect()
    }

    /// Replace the city's previous dust value and return the trend relative to it.
    fn update_trend(&self, city_id: &str, dust: f64) -> DustTrend {
        let mut previous = match self.previous_dust.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        fusion::trend(previous.insert(city_id.to_string(), dust), dust)
    }

    fn forecast_due(&self, city_id: &str, now: DateTime<Utc>) -> bool {
        let mut saved = match self.forecasts_saved_at.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match saved.get(city_id) {
            Some(last) if now - *last < Duration::minutes(FORECAST_SAVE_INTERVAL_MINUTES) => false,
            _ => {
                saved.insert(city_id.to_string(), now);
                true
            }
        }
    }

    /// Fuse all sources for one city, feed the engine and assemble the published reading.
    ///
    /// Falls back to the cached or a synthetic reading when no source answers.
    #[instrument(skip(self, state, city), fields(city_id = %city.id))]
    pub async fn collect_city(&self, state: &AppState, city: &City) -> Result<CityDustData> {
        let now = Utc::now();
        let readings = self.fetch_sources(city).await;
        if readings.is_empty() {
            warn!("No source data for {}, using fallback", city.id);
            return Ok(self.fallback(state, city, now).await);
        }

        let fused = fusion::fuse(&city.id, now, &readings);
        let confidence = fusion::confidence(&readings);

        let prediction = {
            let mut engine = state.engine.lock().await;
            engine.observe_and_predict(&fused, DEFAULT_HORIZON_HOURS, now)?
        };

        if self.forecast_due(&city.id, now) {
            if let Err(e) = store::save_forecast(&state.db, &prediction).await {
                error!("Failed to store forecast for {}: {}", city.id, e);
            }
        }

        let trend = self.update_trend(&city.id, fused.dust.unwrap_or(0.0));
        let sources = readings.iter().map(|r| r.source.clone()).collect();
        debug!("Collected {} from {} sources", city.id, readings.len());
        Ok(assemble(city, &fused, sources, confidence, Some(&prediction), trend))
    }

    /// The cached reading marked as such, or a synthetic one when nothing is cached.
    async fn fallback(&self, state: &AppState, city: &City, now: DateTime<Utc>) -> CityDustData {
        match state.cache.get(&current_cache_key(&city.id)).await {
            Some(CachedData::Current(cached)) => CityDustData {
                timestamp: now,
                confidence: CACHED_CONFIDENCE,
                data_quality: CACHED_QUALITY.to_string(),
                sources_used: 0,
                sources_list: Vec::new(),
                ..cached
            },
            _ => synthetic_reading(city, now),
        }
    }

    /// The cached reading for a city, collecting it first when the cache has none.
    pub async fn current_reading(&self, state: &AppState, city: &City) -> CityDustData {
        if let Some(CachedData::Current(data)) = state.cache.get(&current_cache_key(&city.id)).await {
            trace!("Serving cached reading for {}", city.id);
            return data;
        }
        let data = match self.collect_city(state, city).await {
            Ok(data) => data,
            Err(e) => {
                error!("Collection failed for {}: {:#}", city.id, e);
                self.fallback(state, city, Utc::now()).await
            }
        };
        state
            .cache
            .insert(current_cache_key(&city.id), CachedData::Current(data.clone()))
            .await;
        data
    }

    /// Collect every city concurrently, then cache, persist and raise alerts.
    ///
    /// Returns the readings together with the alerts newly raised by them.
    pub async fn collect_all_cities(&self, state: &AppState) -> (Vec<CityDustData>, Vec<Alert>) {
        let results = join_all(state.cities.iter().map(|city| self.collect_city(state, city))).await;
        let now = Utc::now();

        let mut collected = Vec::with_capacity(results.len());
        let mut raised = Vec::new();
        for (city, result) in state.cities.iter().zip(results) {
            let data = match result {
                Ok(data) => data,
                Err(e) => {
                    error!("Collection failed for {}: {:#}", city.id, e);
                    self.fallback(state, city, now).await
                }
            };

            state
                .cache
                .insert(current_cache_key(&city.id), CachedData::Current(data.clone()))
                .await;

            // Fallback readings are served but never stored or alerted on
            if is_live(&data) {
                if let Err(e) = store::save_reading(&state.db, &data).await {
                    error!("Failed to store reading for {}: {}", city.id, e);
                }
                match alerts::raise_for_reading(&state.db, &data, now, state.settings.alert_ttl_hours).await {
                    Ok(Some(alert)) => raised.push(alert),
                    Ok(None) => {}
                    Err(e) => error!("Failed to raise alert for {}: {}", city.id, e),
                }
            }
            collected.push(data);
        }

        (collected, raised)
    }
}

/// Assemble the published reading for a city from its fused observation.
pub fn assemble(
    city: &City,
    obs: &Observation,
    sources: Vec<String>,
    confidence: f64,
    prediction: Option<&PredictionData>,
    trend: DustTrend,
) -> CityDustData {
    let dust = obs.dust.unwrap_or(0.0);
    let pm10 = obs.pm10.unwrap_or(0.0);
    let pm2_5 = obs.pm2_5.unwrap_or(0.0);

    CityDustData {
        city_id: city.id.clone(),
        city_name: city.name.clone(),
        lat: city.lat,
        lon: city.lon,
        timestamp: obs.timestamp,
        dust: round_to(dust, 2),
        pm10: round_to(pm10, 2),
        pm2_5: round_to(pm2_5, 2),
        aqi: fusion::aqi(pm2_5, pm10),
        temperature: round_to(obs.temperature.unwrap_or(0.0), 1),
        humidity: round_to(obs.humidity.unwrap_or(0.0), 1),
        wind_speed: round_to(obs.wind_speed.unwrap_or(0.0), 1),
        wind_direction: round_to(obs.wind_direction.unwrap_or(0.0), 0),
        visibility: round_to(obs.visibility.unwrap_or(DEFAULT_VISIBILITY), 0),
        pressure: obs.pressure.map(|p| round_to(p, 1)),
        risk_level: RiskLevel::from_dust(dust),
        risk_score: fusion::risk_score(obs),
        confidence: round_to(confidence, 1),
        sources_used: sources.len(),
        data_quality: fusion::data_quality_label(sources.len()).to_string(),
        sources_list: sources,
        forecast_24h: prediction.map(|p| p.forecast_24h.clone()).unwrap_or_default(),
        forecast_72h: prediction.map(|p| p.forecast_72h.clone()).unwrap_or_default(),
        next_risk_period: prediction.and_then(|p| p.next_risk_period.clone()),
        trend,
    }
}

/// Plausible clear-day conditions used when no source and no cache is available.
pub fn synthetic_reading(city: &City, now: DateTime<Utc>) -> CityDustData {
    let mut rng = rand::thread_rng();
    let dust: f64 = rng.gen_range(15.0..45.0);

    CityDustData {
        city_id: city.id.clone(),
        city_name: city.name.clone(),
        lat: city.lat,
        lon: city.lon,
        timestamp: now,
        dust: round_to(dust, 2),
        pm10: round_to(dust * 1.2, 2),
        pm2_5: round_to(dust * 0.4, 2),
        aqi: (dust * 2.0) as i32,
        temperature: round_to(rng.gen_range(28.0..42.0), 1),
        humidity: round_to(rng.gen_range(20.0..60.0), 1),
        wind_speed: round_to(rng.gen_range(5.0..25.0), 1),
        wind_direction: round_to(rng.gen_range(0.0..360.0), 0),
        visibility: round_to(rng.gen_range(5_000.0..15_000.0), 0),
        pressure: None,
        risk_level: RiskLevel::from_dust(dust),
        risk_score: dust as i32,
        confidence: SYNTHETIC_CONFIDENCE,
        sources_used: 0,
        sources_list: Vec::new(),
        forecast_24h: Vec::new(),
        forecast_72h: Vec::new(),
        next_risk_period: None,
        trend: DustTrend::Stable,
        data_quality: FALLBACK_QUALITY.to_string(),
    }
}

/// Whether a reading was fused from sources in this collection rather than served from a fallback.
pub fn is_live(data: &CityDustData) -> bool {
    data.data_quality != CACHED_QUALITY && data.data_quality != FALLBACK_QUALITY
}

/// Observation rebuilt from a published reading, for forecasting on demand.
pub fn to_observation(data: &CityDustData) -> Observation {
    Observation {
        dust: Some(data.dust),
        pm10: Some(data.pm10),
        pm2_5: Some(data.pm2_5),
        aqi: Some(data.aqi as f64),
        temperature: Some(data.temperature),
        humidity: Some(data.humidity),
        wind_speed: Some(data.wind_speed),
        wind_direction: Some(data.wind_direction),
        visibility: Some(data.visibility),
        pressure: data.pressure,
        sources_used: data.sources_used,
        ..Observation::new(data.city_id.clone(), data.timestamp)
    }
}

/// Collect on a fixed interval until the process exits, pushing every cycle to WebSocket subscribers.
pub async fn run_collection_loop(state: AppState) {
    let period = std::time::Duration::from_secs(state.settings.collection_interval_secs);
    let mut interval = tokio::time::interval(period);
    let mut cycle: u64 = 0;
    info!(
        "Collector started: {} cities every {}s",
        state.cities.len(),
        state.settings.collection_interval_secs
    );

    loop {
        interval.tick().await;
        cycle += 1;

        let (data, raised) = state.collector.collect_all_cities(&state).await;
        let live = data.iter().filter(|d| is_live(d)).count();
        info!("Collection cycle {}: {}/{} cities from live sources", cycle, live, data.len());

        state.hub.publish("bulk_update", &data);
        for alert in &raised {
            state.hub.publish("alert", alert);
        }

        if cycle % state.settings.validation_every_cycles == 0 {
            validation::validate_all_cities(&state).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{build_app_state, Settings};
    use crate::test_utils::test_utils::{setup_test_app_state, setup_test_db};
    use async_trait::async_trait;
    use common::uae_cities;

    fn dubai() -> City {
        uae_cities().into_iter().find(|c| c.id == "dubai").unwrap()
    }

    fn storm_observation(dust: f64) -> Observation {
        Observation {
            dust: Some(dust),
            pm10: Some(dust * 1.3),
            pm2_5: Some(dust * 0.3),
            temperature: Some(38.0),
            humidity: Some(20.0),
            wind_speed: Some(30.0),
            wind_direction: Some(290.0),
            sources_used: 2,
            ..Observation::new("dubai", Utc::now())
        }
    }

    /// Reports the same dust level for every city
    #[derive(Debug)]
    struct FixedSource(f64);

    #[async_trait]
    impl DataSource for FixedSource {
        fn name(&self) -> &'static str {
            "Fixed"
        }

        fn weight(&self) -> f64 {
            1.0
        }

        fn requires_key(&self) -> bool {
            false
        }

        async fn fetch(&self, _lat: f64, _lon: f64) -> Result<Observation> {
            Ok(storm_observation(self.0))
        }
    }

    #[test]
    fn test_assemble_rounds_and_derives() {
        let obs = Observation {
            dust: Some(123.456),
            pm10: Some(150.0),
            pm2_5: Some(40.04),
            temperature: Some(41.26),
            humidity: Some(18.0),
            wind_speed: Some(32.0),
            wind_direction: Some(231.6),
            sources_used: 2,
            ..Observation::new("dubai", Utc::now())
        };
        let sources = vec!["Open-Meteo".to_string(), "AQICN".to_string()];

        let data = assemble(&dubai(), &obs, sources, 81.26, None, DustTrend::Rising);
        assert_eq!(data.dust, 123.46);
        assert_eq!(data.temperature, 41.3);
        assert_eq!(data.wind_direction, 232.0);
        assert_eq!(data.visibility, 10_000.0);
        assert_eq!(data.risk_level, RiskLevel::Severe);
        assert_eq!(data.aqi, fusion::aqi(40.04, 150.0));
        assert_eq!(data.confidence, 81.3);
        assert_eq!(data.sources_used, 2);
        assert_eq!(data.data_quality, "fair");
        assert!(data.forecast_72h.is_empty());
    }

    #[test]
    fn test_synthetic_reading_ranges() {
        let now = Utc::now();
        for _ in 0..50 {
            let data = synthetic_reading(&dubai(), now);
            assert!((15.0..=45.0).contains(&data.dust));
            assert!((28.0..=42.0).contains(&data.temperature));
            assert!((5_000.0..=15_000.0).contains(&data.visibility));
            assert_eq!(data.confidence, 25.0);
            assert_eq!(data.sources_used, 0);
            assert_eq!(data.data_quality, "fallback");
            assert!(data.risk_level <= RiskLevel::Moderate);
        }
    }

    #[test]
    fn test_trend_follows_previous_collection() {
        let collector = DataCollector::new(Vec::new());
        assert_eq!(collector.update_trend("dubai", 40.0), DustTrend::Stable);
        assert_eq!(collector.update_trend("dubai", 60.0), DustTrend::Rising);
        assert_eq!(collector.update_trend("dubai", 52.0), DustTrend::Falling);
        assert_eq!(collector.update_trend("sharjah", 10.0), DustTrend::Stable);
    }

    #[test]
    fn test_forecast_saved_once_per_hour() {
        let collector = DataCollector::new(Vec::new());
        let now = Utc::now();
        assert!(collector.forecast_due("dubai", now));
        assert!(!collector.forecast_due("dubai", now + Duration::minutes(30)));
        assert!(collector.forecast_due("dubai", now + Duration::minutes(61)));
    }

    #[tokio::test]
    async fn test_fallback_prefers_cached_reading() {
        let state = setup_test_app_state().await;
        let city = dubai();

        // Nothing cached: synthetic
        let first = state.collector.current_reading(&state, &city).await;
        assert_eq!(first.data_quality, "fallback");

        // Now cached: served as-is
        let again = state.collector.current_reading(&state, &city).await;
        assert_eq!(again, first);

        // A failed collection degrades the cached reading
        let degraded = state.collector.collect_city(&state, &city).await.unwrap();
        assert_eq!(degraded.data_quality, "cached");
        assert_eq!(degraded.confidence, 40.0);
        assert_eq!(degraded.dust, first.dust);
    }

    #[tokio::test]
    async fn test_collect_all_cities_without_sources() {
        let state = setup_test_app_state().await;
        let (data, raised) = state.collector.collect_all_cities(&state).await;

        assert_eq!(data.len(), 8);
        assert!(raised.is_empty());
        // Fallback readings are not persisted
        let stored = store::all_readings_since(&state.db, Utc::now() - Duration::hours(1)).await.unwrap();
        assert!(stored.is_empty());
        assert_eq!(state.cache.get(&current_cache_key("fujairah")).await.map(|_| ()), Some(()));
    }

    #[tokio::test]
    async fn test_cached_fallback_is_not_stored_or_alerted() {
        let state = setup_test_app_state().await;
        let city = dubai();

        // A live storm reading from an earlier cycle
        let sources = vec!["Open-Meteo".to_string(), "AQICN".to_string()];
        let live = assemble(&city, &storm_observation(150.0), sources, 80.0, None, DustTrend::Rising);
        assert!(is_live(&live));
        state
            .cache
            .insert(current_cache_key("dubai"), CachedData::Current(live))
            .await;

        let (data, raised) = state.collector.collect_all_cities(&state).await;
        let served = data.iter().find(|d| d.city_id == "dubai").unwrap();
        assert_eq!(served.data_quality, "cached");
        assert_eq!(served.dust, 150.0);
        assert_eq!(served.sources_used, 0);
        assert!(served.sources_list.is_empty());
        assert!(!is_live(served));

        assert!(raised.is_empty());
        let stored = store::all_readings_since(&state.db, Utc::now() - Duration::hours(1)).await.unwrap();
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn test_live_readings_are_stored_and_alerted() {
        let db = setup_test_db().await;
        let sources: Vec<Box<dyn DataSource>> = vec![Box::new(FixedSource(160.0))];
        let state = build_app_state(db, Settings::default(), sources);

        let (data, raised) = state.collector.collect_all_cities(&state).await;
        assert_eq!(data.len(), 8);
        assert!(data.iter().all(is_live));
        assert!(data.iter().all(|d| d.sources_list == vec!["Fixed".to_string()]));
        assert_eq!(raised.len(), 8);

        let stored = store::all_readings_since(&state.db, Utc::now() - Duration::hours(1)).await.unwrap();
        assert_eq!(stored.len(), 8);
    }

    #[test]
    fn test_to_observation() {
        let data = synthetic_reading(&dubai(), Utc::now());
        let obs = to_observation(&data);
        assert_eq!(obs.city_id, "dubai");
        assert_eq!(obs.dust, Some(data.dust));
        assert_eq!(obs.visibility, Some(data.visibility));
        assert!(obs.forecast_dust.is_empty());
    }
}
