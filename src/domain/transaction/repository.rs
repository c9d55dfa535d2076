//! Transaction repository interface

use async_trait::async_trait;

use super::model::{NewTransaction, Transaction, TransactionClosure};
use crate::domain::DomainResult;

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Persist a new Active transaction and assign its id.
    async fn create(&self, transaction: NewTransaction) -> DomainResult<Transaction>;

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Transaction>>;

    /// Active transactions on one connector, oldest first. More than one
    /// means a previous session never sent StopTransaction.
    async fn find_active_for_connector(
        &self,
        charge_point_id: &str,
        connector_id: u32,
    ) -> DomainResult<Vec<Transaction>>;

    /// Close an Active transaction. `Ok(None)` when the id is unknown or
    /// the transaction is no longer Active.
    async fn close(&self, id: i32, closure: TransactionClosure)
        -> DomainResult<Option<Transaction>>;
}
