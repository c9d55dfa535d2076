use async_trait::async_trait;

use super::model::{MeterValue, NewMeterValue};
use crate::domain::DomainResult;

#[async_trait]
pub trait MeterValueRepository: Send + Sync {
    /// Insert a batch of samples, returns how many were stored.
    async fn append(&self, values: Vec<NewMeterValue>) -> DomainResult<usize>;

    /// Latest `Energy.Active.Import.Register` sample linked to the transaction.
    async fn find_last_for_transaction(&self, transaction_id: i32)
        -> DomainResult<Option<MeterValue>>;
}
