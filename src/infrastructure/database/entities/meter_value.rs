//! MeterValue entity, one row per sampled value

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "meter_values")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub charge_point_id: String,

    pub connector_id: i32,

    #[sea_orm(nullable)]
    pub transaction_id: Option<i32>,

    pub timestamp: DateTimeUtc,

    pub measurand: String,

    pub value: f64,

    pub unit: String,

    pub context: String,

    pub location: String,

    #[sea_orm(nullable)]
    pub phase: Option<String>,

    pub format: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
