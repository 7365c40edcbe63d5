use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create dust_readings table
        manager
            .create_table(
                Table::create()
                    .table(DustReadings::Table)
                    .if_not_exists()
                    .col(pk_auto(DustReadings::Id))
                    .col(string(DustReadings::CityId))
                    .col(timestamp_with_time_zone(DustReadings::Timestamp))
                    .col(double(DustReadings::Dust))
                    .col(double_null(DustReadings::Pm10))
                    .col(double_null(DustReadings::Pm25))
                    .col(integer_null(DustReadings::Aqi))
                    .col(double_null(DustReadings::Temperature))
                    .col(double_null(DustReadings::Humidity))
                    .col(double_null(DustReadings::WindSpeed))
                    .col(double_null(DustReadings::WindDirection))
                    .col(double_null(DustReadings::Visibility))
                    .col(double_null(DustReadings::Pressure))
                    .col(string(DustReadings::RiskLevel))
                    .col(integer_null(DustReadings::RiskScore))
                    .col(double_null(DustReadings::Confidence))
                    .col(integer(DustReadings::SourcesUsed).default(0))
                    .col(text_null(DustReadings::RawData))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_readings_city_time")
                    .table(DustReadings::Table)
                    .col(DustReadings::CityId)
                    .col(DustReadings::Timestamp)
                    .to_owned(),
            )
            .await?;

        // Create predictions table
        manager
            .create_table(
                Table::create()
                    .table(Predictions::Table)
                    .if_not_exists()
                    .col(pk_auto(Predictions::Id))
                    .col(string(Predictions::CityId))
                    .col(timestamp_with_time_zone(Predictions::PredictionTime))
                    .col(timestamp_with_time_zone(Predictions::TargetTime))
                    .col(integer(Predictions::HourAhead))
                    .col(double(Predictions::PredictedDust))
                    .col(double(Predictions::Confidence))
                    .col(string(Predictions::ModelVersion))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_predictions_city")
                    .table(Predictions::Table)
                    .col(Predictions::CityId)
                    .col(Predictions::TargetTime)
                    .to_owned(),
            )
            .await?;

        // Create alerts table
        manager
            .create_table(
                Table::create()
                    .table(Alerts::Table)
                    .if_not_exists()
                    .col(pk_auto(Alerts::Id))
                    .col(string(Alerts::AlertKey).unique_key())
                    .col(string(Alerts::CityId))
                    .col(string(Alerts::CityName))
                    .col(string(Alerts::Severity))
                    .col(string(Alerts::Message))
                    .col(double(Alerts::DustLevel))
                    .col(timestamp_with_time_zone(Alerts::TriggeredAt))
                    .col(timestamp_with_time_zone_null(Alerts::ExpiresAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_alerts_city")
                    .table(Alerts::Table)
                    .col(Alerts::CityId)
                    .col(Alerts::TriggeredAt)
                    .to_owned(),
            )
            .await?;

        // Create model_accuracy table
        manager
            .create_table(
                Table::create()
                    .table(ModelAccuracy::Table)
                    .if_not_exists()
                    .col(pk_auto(ModelAccuracy::Id))
                    .col(string(ModelAccuracy::CityId))
                    .col(timestamp_with_time_zone(ModelAccuracy::ValidatedAt))
                    .col(integer(ModelAccuracy::Matches))
                    .col(double(ModelAccuracy::Mae))
                    .col(double(ModelAccuracy::Rmse))
                    .col(double(ModelAccuracy::Mape))
                    .col(double(ModelAccuracy::AccuracyPercent))
                    .to_owned(),
            )
            .await?;

        // Create model_calibration table
        manager
            .create_table(
                Table::create()
                    .table(ModelCalibration::Table)
                    .if_not_exists()
                    .col(pk_auto(ModelCalibration::Id))
                    .col(string(ModelCalibration::CityId).unique_key())
                    .col(double(ModelCalibration::CalibrationFactor).default(1.0))
                    .col(timestamp_with_time_zone(ModelCalibration::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ModelCalibration::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ModelAccuracy::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Alerts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Predictions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DustReadings::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum DustReadings {
    Table,
    Id,
    CityId,
    Timestamp,
    Dust,
    Pm10,
    #[sea_orm(iden = "pm2_5")]
    Pm25,
    Aqi,
    Temperature,
    Humidity,
    WindSpeed,
    WindDirection,
    Visibility,
    Pressure,
    RiskLevel,
    RiskScore,
    Confidence,
    SourcesUsed,
    RawData,
}

#[derive(DeriveIden)]
enum Predictions {
    Table,
    Id,
    CityId,
    PredictionTime,
    TargetTime,
    HourAhead,
    PredictedDust,
    Confidence,
    ModelVersion,
}

#[derive(DeriveIden)]
enum Alerts {
    Table,
    Id,
    AlertKey,
    CityId,
    CityName,
    Severity,
    Message,
    DustLevel,
    TriggeredAt,
    ExpiresAt,
}

#[derive(DeriveIden)]
enum ModelAccuracy {
    Table,
    Id,
    CityId,
    ValidatedAt,
    Matches,
    Mae,
    Rmse,
    Mape,
    AccuracyPercent,
}

#[derive(DeriveIden)]
enum ModelCalibration {
    Table,
    Id,
    CityId,
    CalibrationFactor,
    UpdatedAt,
}
