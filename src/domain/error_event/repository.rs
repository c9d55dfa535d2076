use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{ErrorEvent, NewErrorEvent};
use crate::domain::DomainResult;

#[async_trait]
pub trait ErrorEventRepository: Send + Sync {
    async fn record(&self, event: NewErrorEvent) -> DomainResult<ErrorEvent>;

    /// Unresolved events for one scope (`None` = the charge point itself).
    async fn find_open(
        &self,
        charge_point_id: &str,
        connector_id: Option<u32>,
    ) -> DomainResult<Vec<ErrorEvent>>;

    /// Mark every unresolved event of the scope resolved; returns the count.
    async fn resolve_open(
        &self,
        charge_point_id: &str,
        connector_id: Option<u32>,
        at: DateTime<Utc>,
    ) -> DomainResult<u64>;
}
