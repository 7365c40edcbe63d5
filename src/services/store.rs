//! Persistence of readings, forecasts and accuracy bookkeeping.

use chrono::{DateTime, Utc};
use common::{CityDustData, DustReading, PredictionData, RiskLevel, ValidationReport};
use model::entities::{dust_reading, model_accuracy, model_calibration, prediction};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::str::FromStr;
use tracing::{debug, trace};

pub async fn save_reading(db: &DatabaseConnection, data: &CityDustData) -> Result<dust_reading::Model, DbErr> {
    trace!("Persisting reading for {}", data.city_id);
    dust_reading::ActiveModel {
        city_id: Set(data.city_id.clone()),
        timestamp: Set(data.timestamp),
        dust: Set(data.dust),
        pm10: Set(Some(data.pm10)),
        pm2_5: Set(Some(data.pm2_5)),
        aqi: Set(Some(data.aqi)),
        temperature: Set(Some(data.temperature)),
        humidity: Set(Some(data.humidity)),
        wind_speed: Set(Some(data.wind_speed)),
        wind_direction: Set(Some(data.wind_direction)),
        visibility: Set(Some(data.visibility)),
        pressure: Set(data.pressure),
        risk_level: Set(data.risk_level.as_str().to_string()),
        risk_score: Set(Some(data.risk_score)),
        confidence: Set(Some(data.confidence)),
        sources_used: Set(data.sources_used as i32),
        raw_data: Set(serde_json::to_string(data).ok()),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Readings for one city at or after `since`, oldest first.
pub async fn readings_since(
    db: &DatabaseConnection,
    city_id: &str,
    since: DateTime<Utc>,
) -> Result<Vec<dust_reading::Model>, DbErr> {
    dust_reading::Entity::find()
        .filter(dust_reading::Column::CityId.eq(city_id))
        .filter(dust_reading::Column::Timestamp.gte(since))
        .order_by_asc(dust_reading::Column::Timestamp)
        .all(db)
        .await
}

/// Readings for every city at or after `since`, oldest first.
pub async fn all_readings_since(db: &DatabaseConnection, since: DateTime<Utc>) -> Result<Vec<dust_reading::Model>, DbErr> {
    dust_reading::Entity::find()
        .filter(dust_reading::Column::Timestamp.gte(since))
        .order_by_asc(dust_reading::Column::Timestamp)
        .all(db)
        .await
}

pub fn to_dust_reading(model: &dust_reading::Model) -> DustReading {
    DustReading {
        timestamp: model.timestamp,
        dust: model.dust,
        pm10: model.pm10,
        pm2_5: model.pm2_5,
        aqi: model.aqi,
        temperature: model.temperature,
        humidity: model.humidity,
        wind_speed: model.wind_speed,
        wind_direction: model.wind_direction,
        visibility: model.visibility,
        risk_level: RiskLevel::from_str(&model.risk_level).unwrap_or_else(|_| RiskLevel::from_dust(model.dust)),
        confidence: model.confidence,
    }
}

/// Store every hourly point of a forecast so it can be audited later.
pub async fn save_forecast(db: &DatabaseConnection, forecast: &PredictionData) -> Result<u64, DbErr> {
    let rows: Vec<prediction::ActiveModel> = forecast
        .forecast_72h
        .iter()
        .map(|point| prediction::ActiveModel {
            city_id: Set(forecast.city_id.clone()),
            prediction_time: Set(forecast.generated_at),
            target_time: Set(point.time),
            hour_ahead: Set(point.hour as i32),
            predicted_dust: Set(point.dust),
            confidence: Set(point.confidence),
            model_version: Set(forecast.model_version.clone()),
            ..Default::default()
        })
        .collect();

    let count = rows.len() as u64;
    if rows.is_empty() {
        return Ok(0);
    }
    prediction::Entity::insert_many(rows).exec(db).await?;
    debug!("Stored {} forecast points for {}", count, forecast.city_id);
    Ok(count)
}

pub async fn save_accuracy(db: &DatabaseConnection, report: &ValidationReport) -> Result<model_accuracy::Model, DbErr> {
    model_accuracy::ActiveModel {
        city_id: Set(report.city_id.clone()),
        validated_at: Set(report.timestamp),
        matches: Set(report.matches as i32),
        mae: Set(report.mae),
        rmse: Set(report.rmse),
        mape: Set(report.mape),
        accuracy_percent: Set(report.accuracy),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn accuracy_since(db: &DatabaseConnection, since: DateTime<Utc>) -> Result<Vec<model_accuracy::Model>, DbErr> {
    model_accuracy::Entity::find()
        .filter(model_accuracy::Column::ValidatedAt.gte(since))
        .order_by_asc(model_accuracy::Column::ValidatedAt)
        .all(db)
        .await
}

pub async fn upsert_calibration(
    db: &DatabaseConnection,
    city_id: &str,
    factor: f64,
    now: DateTime<Utc>,
) -> Result<model_calibration::Model, DbErr> {
    let existing = model_calibration::Entity::find()
        .filter(model_calibration::Column::CityId.eq(city_id))
        .one(db)
        .await?;

    match existing {
        Some(model) => {
            let mut active: model_calibration::ActiveModel = model.into();
            active.calibration_factor = Set(factor);
            active.updated_at = Set(now);
            active.update(db).await
        }
        None => {
            model_calibration::ActiveModel {
                city_id: Set(city_id.to_string()),
                calibration_factor: Set(factor),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await
        }
    }
}

/// Calibration factors updated at or after `since`.
pub async fn calibrations_since(db: &DatabaseConnection, since: DateTime<Utc>) -> Result<Vec<(String, f64)>, DbErr> {
    let rows = model_calibration::Entity::find()
        .filter(model_calibration::Column::UpdatedAt.gte(since))
        .all(db)
        .await?;
    Ok(rows.into_iter().map(|r| (r.city_id, r.calibration_factor)).collect())
}


#[cfg(test)]
mod tests {
    use super::testing::city_data;
    use super::*;
    use crate::test_utils::test_utils::setup_test_db;
    use chrono::Duration;

    #[tokio::test]
    async fn test_readings_roundtrip_through_dto() {
        let db = setup_test_db().await;
        save_reading(&db, &city_data("dubai", 65.0, 120)).await.unwrap();
        save_reading(&db, &city_data("dubai", 30.0, 10)).await.unwrap();
        save_reading(&db, &city_data("sharjah", 12.0, 10)).await.unwrap();

        let recent = readings_since(&db, "dubai", Utc::now() - Duration::hours(1)).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].dust, 30.0);

        let dubai = readings_since(&db, "dubai", Utc::now() - Duration::hours(3)).await.unwrap();
        let dto = to_dust_reading(&dubai[0]);
        assert_eq!(dto.risk_level, RiskLevel::High);
        assert!((dto.pm10.unwrap() - 78.0).abs() < 1e-9);
        assert!(dubai[0].raw_data.as_deref().unwrap().contains("\"city_id\":\"dubai\""));

        assert_eq!(all_readings_since(&db, Utc::now() - Duration::hours(3)).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_calibration_upsert() {
        let db = setup_test_db().await;
        let now = Utc::now();
        upsert_calibration(&db, "dubai", 1.05, now).await.unwrap();
        upsert_calibration(&db, "dubai", 0.97, now).await.unwrap();
        upsert_calibration(&db, "al_ain", 1.10, now - Duration::days(10)).await.unwrap();

        let recent = calibrations_since(&db, now - Duration::days(7)).await.unwrap();
        assert_eq!(recent, vec![("dubai".to_string(), 0.97)]);
    }
}
