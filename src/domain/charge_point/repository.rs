//! Charge Point repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{ChargePoint, ConnectorStatus};
use crate::domain::DomainResult;

#[async_trait]
pub trait ChargePointRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> DomainResult<Option<ChargePoint>>;

    /// Insert or replace the whole row.
    async fn upsert(&self, charge_point: ChargePoint) -> DomainResult<()>;

    /// Record a connector-0 status. Creates the charge point if unknown.
    async fn update_status(&self, id: &str, status: ConnectorStatus) -> DomainResult<()>;

    /// Flip the connectivity flag; `last_connect_at` is set on connect.
    /// Creates the charge point if unknown.
    async fn set_connected(&self, id: &str, connected: bool, at: DateTime<Utc>)
        -> DomainResult<()>;

    /// Existing row, or a fresh unsaved one.
    async fn find_or_new(&self, id: &str) -> DomainResult<ChargePoint> {
        Ok(self
            .find_by_id(id)
            .await?
            .unwrap_or_else(|| ChargePoint::new(id)))
    }
}
