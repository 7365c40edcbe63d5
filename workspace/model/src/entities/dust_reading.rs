use sea_orm::entity::prelude::*;

/// A fused reading for one city at one collection instant.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "dust_readings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub city_id: String,
    pub timestamp: DateTimeUtc,
    pub dust: f64,
    pub pm10: Option<f64>,
    pub pm2_5: Option<f64>,
    pub aqi: Option<i32>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<f64>,
    pub visibility: Option<f64>,
    pub pressure: Option<f64>,
    pub risk_level: String,
    pub risk_score: Option<i32>,
    pub confidence: Option<f64>,
    pub sources_used: i32,
    /// The full serialized payload served to clients
    #[sea_orm(column_type = "Text", nullable)]
    pub raw_data: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
