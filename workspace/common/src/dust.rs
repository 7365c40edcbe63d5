use crate::forecast::{ForecastPoint, RiskPeriod};
use crate::risk::RiskLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Short-term direction of the dust reading compared with the previous collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DustTrend {
    Rising,
    Falling,
    Stable,
}

/// Fused current conditions for one city as served by `/dust/current`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct CityDustData {
    pub city_id: String,
    pub city_name: String,
    pub lat: f64,
    pub lon: f64,
    pub timestamp: DateTime<Utc>,
    pub dust: f64,
    pub pm10: f64,
    pub pm2_5: f64,
    pub aqi: i32,
    pub temperature: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub wind_direction: f64,
    pub visibility: f64,
    pub pressure: Option<f64>,
    pub risk_level: RiskLevel,
    pub risk_score: i32,
    pub confidence: f64,
    pub sources_used: usize,
    pub sources_list: Vec<String>,
    pub forecast_24h: Vec<ForecastPoint>,
    pub forecast_72h: Vec<ForecastPoint>,
    pub next_risk_period: Option<RiskPeriod>,
    pub trend: DustTrend,
    /// excellent, good, fair, limited, cached or fallback
    pub data_quality: String,
}

/// Response for `GET /api/v1/dust/current`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentDustResponse {
    pub timestamp: DateTime<Utc>,
    pub count: usize,
    pub cities: Vec<CityDustData>,
}

/// A persisted reading as returned by the history endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct DustReading {
    pub timestamp: DateTime<Utc>,
    pub dust: f64,
    pub pm10: Option<f64>,
    pub pm2_5: Option<f64>,
    pub aqi: Option<i32>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<f64>,
    pub visibility: Option<f64>,
    pub risk_level: RiskLevel,
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DustHistoryResponse {
    pub city_id: String,
    pub city_name: String,
    pub hours: u32,
    pub count: usize,
    pub data: Vec<DustReading>,
}
