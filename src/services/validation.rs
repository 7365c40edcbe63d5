//! Matching stored readings against recorded forecasts.

use chrono::{Duration, Utc};
use common::ValidationReport;
use compute::accuracy::ActualReading;
use compute::error::ComputeError;
use compute::observation::Observation;
use model::entities::dust_reading;
use sea_orm::DbErr;
use tracing::{debug, error, info, instrument, warn};

use crate::schemas::AppState;
use crate::services::store;

/// Readings this far back are compared with the forecasts that covered them.
const VALIDATION_WINDOW_HOURS: i64 = 24;
/// Calibration factors older than this are not restored on startup.
const CALIBRATION_MAX_AGE_DAYS: i64 = 7;

#[derive(Debug)]
pub enum CityValidation {
    /// No readings were stored in the validation window
    NoReadings,
    /// Readings exist but the engine could not score them
    Unscored(ComputeError),
    Validated(ValidationReport),
}

/// Validate one city's recorded forecasts against its last day of readings.
///
/// A successful validation is persisted together with the updated calibration factor.
#[instrument(skip(state))]
pub async fn validate_city(state: &AppState, city_id: &str) -> Result<CityValidation, DbErr> {
    let now = Utc::now();
    let readings = store::readings_since(&state.db, city_id, now - Duration::hours(VALIDATION_WINDOW_HOURS)).await?;
    if readings.is_empty() {
        debug!("No readings found for validating {}", city_id);
        return Ok(CityValidation::NoReadings);
    }

    let actual: Vec<ActualReading> = readings
        .iter()
        .map(|r| ActualReading {
            timestamp: r.timestamp,
            dust: r.dust,
        })
        .collect();

    let observations: Vec<Observation> = readings.iter().map(stored_observation).collect();

    let result = {
        let mut engine = state.engine.lock().await;
        engine.quality.update_baselines(city_id, &observations);
        engine.tracker.validate_predictions(city_id, &actual, now)
    };

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            debug!("Validation for {} not scored: {}", city_id, e);
            return Ok(CityValidation::Unscored(e));
        }
    };

    store::save_accuracy(&state.db, &report).await?;
    store::upsert_calibration(&state.db, city_id, report.calibration_factor, now).await?;

    info!(
        "Validated {}: {:.2}% accuracy over {} matches",
        city_id, report.accuracy, report.matches
    );
    Ok(CityValidation::Validated(report))
}

fn stored_observation(reading: &dust_reading::Model) -> Observation {
    Observation {
        dust: Some(reading.dust),
        pm10: reading.pm10,
        pm2_5: reading.pm2_5,
        aqi: reading.aqi.map(f64::from),
        temperature: reading.temperature,
        humidity: reading.humidity,
        wind_speed: reading.wind_speed,
        wind_direction: reading.wind_direction,
        visibility: reading.visibility,
        pressure: reading.pressure,
        sources_used: reading.sources_used.max(0) as usize,
        ..Observation::new(reading.city_id.clone(), reading.timestamp)
    }
}

/// Validate every configured city, returning how many were scored.
pub async fn validate_all_cities(state: &AppState) -> usize {
    let mut validated = 0;
    for city in state.cities.iter() {
        match validate_city(state, &city.id).await {
            Ok(CityValidation::Validated(_)) => validated += 1,
            Ok(_) => {}
            Err(e) => error!("Database error while validating {}: {}", city.id, e),
        }
    }

    let overall = state.engine.lock().await.tracker.overall_accuracy(Utc::now());
    info!(
        "Validation pass complete: {}/{} cities scored, overall accuracy {:.2}%",
        validated,
        state.cities.len(),
        overall.overall_accuracy
    );
    validated
}

/// Restore recent calibration factors into the engine, returning how many were loaded.
pub async fn load_calibration(state: &AppState) -> Result<usize, DbErr> {
    let since = Utc::now() - Duration::days(CALIBRATION_MAX_AGE_DAYS);
    let factors = store::calibrations_since(&state.db, since).await?;
    let count = factors.len();
    if count == 0 {
        warn!("No recent calibration factors found, starting uncalibrated");
    }
    state.engine.lock().await.tracker.load_calibration(factors);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::testing::city_data;
    use crate::test_utils::test_utils::setup_test_app_state;

    #[tokio::test]
    async fn test_validate_city_without_readings() {
        let state = setup_test_app_state().await;
        let outcome = validate_city(&state, "dubai").await.unwrap();
        assert!(matches!(outcome, CityValidation::NoReadings));
    }

    #[tokio::test]
    async fn test_validate_city_without_predictions() {
        let state = setup_test_app_state().await;
        store::save_reading(&state.db, &city_data("dubai", 40.0, 30)).await.unwrap();

        let outcome = validate_city(&state, "dubai").await.unwrap();
        assert!(matches!(outcome, CityValidation::Unscored(ComputeError::NoPredictions(_))));
        assert_eq!(validate_all_cities(&state).await, 0);
    }

    #[tokio::test]
    async fn test_validation_refreshes_quality_baselines() {
        let state = setup_test_app_state().await;
        for i in 0..50 {
            let dust = 30.0 + (i % 7) as f64;
            store::save_reading(&state.db, &city_data("ajman", dust, i * 20)).await.unwrap();
        }

        validate_city(&state, "ajman").await.unwrap();
        let overview = state.engine.lock().await.quality.quality_report();
        assert_eq!(overview.cities_with_baselines, 1);
    }

    #[tokio::test]
    async fn test_load_calibration() {
        let state = setup_test_app_state().await;
        assert_eq!(load_calibration(&state).await.unwrap(), 0);

        store::upsert_calibration(&state.db, "sharjah", 1.07, Utc::now()).await.unwrap();
        assert_eq!(load_calibration(&state).await.unwrap(), 1);
        let factor = state.engine.lock().await.tracker.calibration_factor("sharjah");
        assert_eq!(factor, 1.07);
    }
}
