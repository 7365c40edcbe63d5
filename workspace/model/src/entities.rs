//! This file serves as the root for all SeaORM entity modules.
//! Readings, forecasts, alerts and the accuracy bookkeeping that feeds
//! calibration are all persisted through these models.

pub mod alert;
pub mod dust_reading;
pub mod model_accuracy;
pub mod model_calibration;
pub mod prediction;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::alert::Entity as Alert;
    pub use super::dust_reading::Entity as DustReading;
    pub use super::model_accuracy::Entity as ModelAccuracy;
    pub use super::model_calibration::Entity as ModelCalibration;
    pub use super::prediction::Entity as Prediction;
}

#[cfg(test)]
mod test {
    use chrono::{Duration, Utc};
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{
        ActiveModelTrait, ColumnTrait, Database, DatabaseConnection, DbErr, EntityTrait,
        QueryFilter, QueryOrder, Set,
    };

    use super::*;
    use prelude::*;

    async fn setup_db() -> Result<DatabaseConnection, DbErr> {
        let db = Database::connect("sqlite::memory:").await?;
        Migrator::up(&db, None).await.expect("Migrations failed.");
        Ok(db)
    }

    fn reading(city_id: &str, minutes_ago: i64, dust: f64) -> dust_reading::ActiveModel {
        dust_reading::ActiveModel {
            city_id: Set(city_id.to_string()),
            timestamp: Set(Utc::now() - Duration::minutes(minutes_ago)),
            dust: Set(dust),
            pm10: Set(Some(dust * 1.2)),
            pm2_5: Set(Some(dust * 0.4)),
            aqi: Set(Some(80)),
            temperature: Set(Some(36.5)),
            humidity: Set(Some(35.0)),
            wind_speed: Set(Some(14.0)),
            wind_direction: Set(Some(230.0)),
            visibility: Set(Some(8000.0)),
            pressure: Set(None),
            risk_level: Set("MODERATE".to_string()),
            risk_score: Set(Some(22)),
            confidence: Set(Some(75.0)),
            sources_used: Set(2),
            raw_data: Set(None),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_dust_readings_roundtrip() -> Result<(), DbErr> {
        let db = setup_db().await?;

        reading("dubai", 30, 35.0).insert(&db).await?;
        reading("dubai", 10, 42.0).insert(&db).await?;
        reading("sharjah", 5, 18.0).insert(&db).await?;

        let dubai = DustReading::find()
            .filter(dust_reading::Column::CityId.eq("dubai"))
            .order_by_asc(dust_reading::Column::Timestamp)
            .all(&db)
            .await?;

        assert_eq!(dubai.len(), 2);
        assert_eq!(dubai[0].dust, 35.0);
        assert_eq!(dubai[1].dust, 42.0);
        assert_eq!(dubai[1].pm10, Some(42.0 * 1.2));

        let all = DustReading::find().all(&db).await?;
        assert_eq!(all.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_alerts_and_calibration() -> Result<(), DbErr> {
        let db = setup_db().await?;
        let now = Utc::now();

        alert::ActiveModel {
            alert_key: Set(format!("dubai_{}", now.timestamp())),
            city_id: Set("dubai".to_string()),
            city_name: Set("Dubai".to_string()),
            severity: Set("SEVERE".to_string()),
            message: Set("SEVERE dust storm warning for Dubai.".to_string()),
            dust_level: Set(130.0),
            triggered_at: Set(now),
            expires_at: Set(Some(now + Duration::hours(6))),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let calibration = model_calibration::ActiveModel {
            city_id: Set("dubai".to_string()),
            calibration_factor: Set(1.0),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let mut active: model_calibration::ActiveModel = calibration.into();
        active.calibration_factor = Set(1.08);
        active.update(&db).await?;

        let alerts = Alert::find().all(&db).await?;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, "SEVERE");

        let factors = ModelCalibration::find().all(&db).await?;
        assert_eq!(factors.len(), 1);
        assert_eq!(factors[0].calibration_factor, 1.08);

        model_accuracy::ActiveModel {
            city_id: Set("dubai".to_string()),
            validated_at: Set(now),
            matches: Set(12),
            mae: Set(3.2),
            rmse: Set(4.1),
            mape: Set(8.5),
            accuracy_percent: Set(93.2),
            ..Default::default()
        }
        .insert(&db)
        .await?;
        assert_eq!(ModelAccuracy::find().all(&db).await?.len(), 1);

        prediction::ActiveModel {
            city_id: Set("dubai".to_string()),
            prediction_time: Set(now),
            target_time: Set(now + Duration::hours(3)),
            hour_ahead: Set(3),
            predicted_dust: Set(41.0),
            confidence: Set(88.0),
            model_version: Set("6.0.0-ultra-accuracy".to_string()),
            ..Default::default()
        }
        .insert(&db)
        .await?;
        assert_eq!(Prediction::find().all(&db).await?.len(), 1);

        Ok(())
    }
}
