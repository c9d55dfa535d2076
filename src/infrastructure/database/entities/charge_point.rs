//! ChargePoint entity

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "charge_points")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Unknown until the first BootNotification
    #[sea_orm(nullable)]
    pub vendor: Option<String>,

    #[sea_orm(nullable)]
    pub model: Option<String>,

    #[sea_orm(nullable)]
    pub serial_number: Option<String>,

    #[sea_orm(nullable)]
    pub firmware_version: Option<String>,

    #[sea_orm(nullable)]
    pub iccid: Option<String>,

    #[sea_orm(nullable)]
    pub imsi: Option<String>,

    pub is_connected: bool,

    /// Status last reported for connector 0
    #[sea_orm(nullable)]
    pub status: Option<String>,

    #[sea_orm(nullable)]
    pub last_heartbeat_at: Option<DateTimeUtc>,

    #[sea_orm(nullable)]
    pub last_boot_at: Option<DateTimeUtc>,

    #[sea_orm(nullable)]
    pub last_connect_at: Option<DateTimeUtc>,

    #[sea_orm(nullable)]
    pub last_tx_start_at: Option<DateTimeUtc>,

    #[sea_orm(nullable)]
    pub last_tx_stop_at: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::connector::Entity")]
    Connectors,
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
}

impl Related<super::connector::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Connectors.def()
    }
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
