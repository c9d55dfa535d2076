//! ErrorEvent entity

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "error_events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub charge_point_id: String,

    /// NULL for charge-point-wide errors (connector 0)
    #[sea_orm(nullable)]
    pub connector_id: Option<i32>,

    pub error_code: String,

    #[sea_orm(nullable)]
    pub description: Option<String>,

    #[sea_orm(nullable)]
    pub vendor_error_code: Option<String>,

    pub occurred_at: DateTimeUtc,

    #[sea_orm(nullable)]
    pub resolved_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
