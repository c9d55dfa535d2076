use async_trait::async_trait;

use super::model::{Connector, ConnectorStatusUpdate};
use crate::domain::DomainResult;

#[async_trait]
pub trait ConnectorRepository: Send + Sync {
    async fn find(&self, charge_point_id: &str, connector_id: u32)
        -> DomainResult<Option<Connector>>;

    async fn get_or_create(&self, charge_point_id: &str, connector_id: u32)
        -> DomainResult<Connector>;

    /// Apply a status report, creating the connector on first sight.
    async fn update_status(
        &self,
        charge_point_id: &str,
        connector_id: u32,
        update: ConnectorStatusUpdate,
    ) -> DomainResult<Connector>;

    async fn find_by_charge_point(&self, charge_point_id: &str) -> DomainResult<Vec<Connector>>;
}
