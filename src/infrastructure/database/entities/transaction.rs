//! Transaction entity

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Also the OCPP transactionId handed to the charge point
    #[sea_orm(primary_key)]
    pub id: i32,

    pub charge_point_id: String,

    pub connector_id: i32,

    pub id_tag: String,

    /// Wh
    pub meter_start: i32,

    #[sea_orm(nullable)]
    pub meter_stop: Option<i32>,

    #[sea_orm(nullable)]
    pub energy_delivered_wh: Option<i32>,

    pub started_at: DateTimeUtc,

    #[sea_orm(nullable)]
    pub stopped_at: Option<DateTimeUtc>,

    #[sea_orm(nullable)]
    pub stop_reason: Option<String>,

    #[sea_orm(nullable)]
    pub reservation_id: Option<i32>,

    /// Active, Completed, Aborted
    pub status: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::charge_point::Entity",
        from = "Column::ChargePointId",
        to = "super::charge_point::Column::Id"
    )]
    ChargePoint,
}

impl Related<super::charge_point::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ChargePoint.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
