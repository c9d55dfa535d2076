//! Create error_events table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ErrorEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ErrorEvents::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ErrorEvents::ChargePointId).string().not_null())
                    .col(ColumnDef::new(ErrorEvents::ConnectorId).integer())
                    .col(ColumnDef::new(ErrorEvents::ErrorCode).string().not_null())
                    .col(ColumnDef::new(ErrorEvents::Description).string())
                    .col(ColumnDef::new(ErrorEvents::VendorErrorCode).string())
                    .col(
                        ColumnDef::new(ErrorEvents::OccurredAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ErrorEvents::ResolvedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ErrorEvents::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum ErrorEvents {
    Table,
    Id,
    ChargePointId,
    ConnectorId,
    ErrorCode,
    Description,
    VendorErrorCode,
    OccurredAt,
    ResolvedAt,
}
