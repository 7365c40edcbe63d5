use sea_orm::entity::prelude::*;

/// One validation run for one city.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "model_accuracy")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub city_id: String,
    pub validated_at: DateTimeUtc,
    pub matches: i32,
    pub mae: f64,
    pub rmse: f64,
    pub mape: f64,
    pub accuracy_percent: f64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
