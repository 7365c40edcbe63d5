use crate::risk::RiskLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A dust warning raised for a city.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct Alert {
    /// `{city_id}_{unix_timestamp}`
    pub id: String,
    pub city_id: String,
    pub city_name: String,
    pub level: RiskLevel,
    pub message: String,
    pub dust_level: f64,
    pub timestamp: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|expires| expires > now).unwrap_or(true)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AlertList {
    pub count: usize,
    pub alerts: Vec<Alert>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn alert(expires_at: Option<DateTime<Utc>>) -> Alert {
        Alert {
            id: "dubai_1".to_string(),
            city_id: "dubai".to_string(),
            city_name: "Dubai".to_string(),
            level: RiskLevel::High,
            message: "HIGH dust levels in Dubai.".to_string(),
            dust_level: 60.0,
            timestamp: Utc::now(),
            expires_at,
        }
    }

    #[test]
    fn test_alert_activity() {
        let now = Utc::now();
        assert!(alert(Some(now + Duration::hours(1))).is_active(now));
        assert!(!alert(Some(now - Duration::minutes(1))).is_active(now));
        assert!(alert(None).is_active(now));
    }
}
