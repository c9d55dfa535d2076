//! Create charge_points table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ChargePoints::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ChargePoints::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ChargePoints::Vendor).string())
                    .col(ColumnDef::new(ChargePoints::Model).string())
                    .col(ColumnDef::new(ChargePoints::SerialNumber).string())
                    .col(ColumnDef::new(ChargePoints::FirmwareVersion).string())
                    .col(ColumnDef::new(ChargePoints::Iccid).string())
                    .col(ColumnDef::new(ChargePoints::Imsi).string())
                    .col(
                        ColumnDef::new(ChargePoints::IsConnected)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(ChargePoints::Status).string())
                    .col(ColumnDef::new(ChargePoints::LastHeartbeatAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(ChargePoints::LastBootAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(ChargePoints::LastConnectAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(ChargePoints::LastTxStartAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(ChargePoints::LastTxStopAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(ChargePoints::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ChargePoints::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum ChargePoints {
    Table,
    Id,
    Vendor,
    Model,
    SerialNumber,
    FirmwareVersion,
    Iccid,
    Imsi,
    IsConnected,
    Status,
    LastHeartbeatAt,
    LastBootAt,
    LastConnectAt,
    LastTxStartAt,
    LastTxStopAt,
    CreatedAt,
}
