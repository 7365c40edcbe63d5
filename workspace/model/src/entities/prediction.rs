use sea_orm::entity::prelude::*;

/// A persisted forecast point, later joined against observed readings.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "predictions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub city_id: String,
    pub prediction_time: DateTimeUtc,
    pub target_time: DateTimeUtc,
    pub hour_ahead: i32,
    pub predicted_dust: f64,
    pub confidence: f64,
    pub model_version: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
