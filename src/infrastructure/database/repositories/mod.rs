//! Database repository implementations
//!
//! Per-aggregate SeaORM repositories + unified RepositoryProvider.

pub mod charge_point_repository;
pub mod connector_repository;
pub mod error_event_repository;
pub mod meter_value_repository;
pub mod repository_provider;
pub mod transaction_repository;

pub use repository_provider::SeaOrmRepositoryProvider;

use tracing::warn;

use crate::domain::{DomainError, DomainResult};

fn db_err(e: sea_orm::DbErr) -> DomainError {
    DomainError::Storage(format!("Database error: {}", e))
}

/// Connector ids are stored as signed 32-bit integers.
fn connector_column(connector_id: u32) -> DomainResult<i32> {
    i32::try_from(connector_id).map_err(|_| {
        warn!(connector_id, "Connector id does not fit the connector_id column");
        DomainError::Validation(format!("connector id {} is out of range", connector_id))
    })
}

fn stored_connector_id(value: i32) -> u32 {
    u32::try_from(value).unwrap_or_else(|_| {
        warn!(value, "Negative connector id in storage, reading it as 0");
        0
    })
}
