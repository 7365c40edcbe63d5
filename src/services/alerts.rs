use chrono::{DateTime, Duration, Utc};
use common::{Alert, CityDustData, RiskLevel};
use model::entities::alert;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Most alerts returned by the listing endpoints
pub const MAX_LISTED_ALERTS: u64 = 100;

/// Alerts are raised from HIGH upwards.
pub fn alert_level(dust: f64) -> Option<RiskLevel> {
    match RiskLevel::from_dust(dust) {
        RiskLevel::Low | RiskLevel::Moderate => None,
        level => Some(level),
    }
}

pub fn alert_message(level: RiskLevel, city_name: &str) -> String {
    match level {
        RiskLevel::Extreme => format!("EXTREME sandstorm conditions in {}! Stay indoors!", city_name),
        RiskLevel::Severe => format!("SEVERE dust storm warning for {}. Limit outdoor activities.", city_name),
        _ => format!("HIGH dust levels in {}. Sensitive groups should take precautions.", city_name),
    }
}

/// The alert a reading warrants, if any.
pub fn build_alert(data: &CityDustData, now: DateTime<Utc>, ttl_hours: i64) -> Option<Alert> {
    let level = alert_level(data.dust)?;
    Some(Alert {
        id: format!("{}_{}", data.city_id, now.timestamp()),
        city_id: data.city_id.clone(),
        city_name: data.city_name.clone(),
        level,
        message: alert_message(level, &data.city_name),
        dust_level: data.dust,
        timestamp: now,
        expires_at: Some(now + Duration::hours(ttl_hours)),
    })
}

fn to_alert(model: alert::Model) -> Option<Alert> {
    let level = match RiskLevel::from_str(&model.severity) {
        Ok(level) => level,
        Err(_) => {
            warn!("Skipping alert {} with unknown severity {}", model.alert_key, model.severity);
            return None;
        }
    };
    Some(Alert {
        id: model.alert_key,
        city_id: model.city_id,
        city_name: model.city_name,
        level,
        message: model.message,
        dust_level: model.dust_level,
        timestamp: model.triggered_at,
        expires_at: model.expires_at,
    })
}

fn unexpired(now: DateTime<Utc>) -> Condition {
    Condition::any()
        .add(alert::Column::ExpiresAt.gt(now))
        .add(alert::Column::ExpiresAt.is_null())
}

/// Persist the alert a reading warrants unless an unexpired one of the same level already exists.
///
/// Returns the newly raised alert.
pub async fn raise_for_reading(
    db: &DatabaseConnection,
    data: &CityDustData,
    now: DateTime<Utc>,
    ttl_hours: i64,
) -> Result<Option<Alert>, DbErr> {
    let Some(alert) = build_alert(data, now, ttl_hours) else {
        return Ok(None);
    };

    let existing = alert::Entity::find()
        .filter(alert::Column::CityId.eq(alert.city_id.as_str()))
        .filter(alert::Column::Severity.eq(alert.level.as_str()))
        .filter(unexpired(now))
        .one(db)
        .await?;
    if let Some(existing) = existing {
        debug!("Alert {} still active, not raising another", existing.alert_key);
        return Ok(None);
    }

    alert::ActiveModel {
        alert_key: Set(alert.id.clone()),
        city_id: Set(alert.city_id.clone()),
        city_name: Set(alert.city_name.clone()),
        severity: Set(alert.level.as_str().to_string()),
        message: Set(alert.message.clone()),
        dust_level: Set(alert.dust_level),
        triggered_at: Set(alert.timestamp),
        expires_at: Set(alert.expires_at),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!("Raised {} alert for {} at {:.1} µg/m³", alert.level, alert.city_name, alert.dust_level);
    Ok(Some(alert))
}

/// Most recent alerts first.
pub async fn list_alerts(db: &DatabaseConnection) -> Result<Vec<Alert>, DbErr> {
    let models = alert::Entity::find()
        .order_by_desc(alert::Column::TriggeredAt)
        .limit(MAX_LISTED_ALERTS)
        .all(db)
        .await?;
    Ok(models.into_iter().filter_map(to_alert).collect())
}

pub async fn active_alerts(db: &DatabaseConnection, now: DateTime<Utc>) -> Result<Vec<Alert>, DbErr> {
    let models = alert::Entity::find()
        .filter(unexpired(now))
        .order_by_desc(alert::Column::TriggeredAt)
        .all(db)
        .await?;
    Ok(models.into_iter().filter_map(to_alert).collect())
}

pub async fn city_alerts(db: &DatabaseConnection, city_id: &str) -> Result<Vec<Alert>, DbErr> {
    let models = alert::Entity::find()
        .filter(alert::Column::CityId.eq(city_id))
        .order_by_desc(alert::Column::TriggeredAt)
        .limit(MAX_LISTED_ALERTS)
        .all(db)
        .await?;
    Ok(models.into_iter().filter_map(to_alert).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::testing::city_data;
    use crate::test_utils::test_utils::setup_test_db;

    #[test]
    fn test_alert_levels() {
        assert_eq!(alert_level(49.9), None);
        assert_eq!(alert_level(50.0), Some(RiskLevel::High));
        assert_eq!(alert_level(100.0), Some(RiskLevel::Severe));
        assert_eq!(alert_level(250.0), Some(RiskLevel::Extreme));
    }

    #[test]
    fn test_build_alert() {
        let now = Utc::now();
        let alert = build_alert(&city_data("al_ain", 130.0, 0), now, 6).unwrap();
        assert_eq!(alert.id, format!("al_ain_{}", now.timestamp()));
        assert_eq!(alert.level, RiskLevel::Severe);
        assert_eq!(alert.message, "SEVERE dust storm warning for al_ain. Limit outdoor activities.");
        assert_eq!(alert.expires_at, Some(now + Duration::hours(6)));
        assert!(build_alert(&city_data("al_ain", 35.0, 0), now, 6).is_none());
    }

    #[tokio::test]
    async fn test_active_alert_suppresses_duplicates() {
        let db = setup_test_db().await;
        let now = Utc::now();
        let storm = city_data("dubai", 120.0, 0);

        assert!(raise_for_reading(&db, &storm, now, 6).await.unwrap().is_some());
        let later = now + Duration::minutes(5);
        assert!(raise_for_reading(&db, &storm, later, 6).await.unwrap().is_none());

        // A different level is a new alert
        let extreme = city_data("dubai", 260.0, 0);
        assert!(raise_for_reading(&db, &extreme, later, 6).await.unwrap().is_some());

        // Once expired the same level can be raised again
        let next_day = now + Duration::hours(7);
        assert!(raise_for_reading(&db, &storm, next_day, 6).await.unwrap().is_some());

        assert_eq!(list_alerts(&db).await.unwrap().len(), 3);
        assert_eq!(city_alerts(&db, "dubai").await.unwrap().len(), 3);
        assert!(city_alerts(&db, "sharjah").await.unwrap().is_empty());

        let active = active_alerts(&db, next_day).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].level, RiskLevel::Severe);
    }
}
