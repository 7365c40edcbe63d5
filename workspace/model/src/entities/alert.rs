use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "alerts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Public identifier, `{city_id}_{unix_timestamp}`
    #[sea_orm(unique)]
    pub alert_key: String,
    pub city_id: String,
    pub city_name: String,
    pub severity: String,
    pub message: String,
    pub dust_level: f64,
    pub triggered_at: DateTimeUtc,
    pub expires_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
