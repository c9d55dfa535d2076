//! SeaORM implementation of TransactionRepository

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use tracing::{debug, warn};

use super::{connector_column, db_err, stored_connector_id};
use crate::domain::{
    DomainResult, NewTransaction, Transaction, TransactionClosure, TransactionRepository,
    TransactionStatus,
};
use crate::infrastructure::database::entities::transaction;

pub struct SeaOrmTransactionRepository {
    db: DatabaseConnection,
}

impl SeaOrmTransactionRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(t: transaction::Model) -> Transaction {
    let status = t.status.parse().unwrap_or_else(|e: String| {
        warn!(transaction_id = t.id, error = e.as_str(), "Treating unknown status as Aborted");
        TransactionStatus::Aborted
    });

    Transaction {
        id: t.id,
        charge_point_id: t.charge_point_id,
        connector_id: stored_connector_id(t.connector_id),
        id_tag: t.id_tag,
        meter_start: t.meter_start,
        meter_stop: t.meter_stop,
        energy_delivered_wh: t.energy_delivered_wh,
        started_at: t.started_at,
        stopped_at: t.stopped_at,
        stop_reason: t.stop_reason,
        reservation_id: t.reservation_id,
        status,
    }
}

// ── TransactionRepository impl ──────────────────────────────────

#[async_trait]
impl TransactionRepository for SeaOrmTransactionRepository {
    async fn create(&self, tx: NewTransaction) -> DomainResult<Transaction> {
        let model = transaction::ActiveModel {
            id: NotSet,
            charge_point_id: Set(tx.charge_point_id),
            connector_id: Set(connector_column(tx.connector_id)?),
            id_tag: Set(tx.id_tag),
            meter_start: Set(tx.meter_start),
            meter_stop: Set(None),
            energy_delivered_wh: Set(None),
            started_at: Set(tx.started_at),
            stopped_at: Set(None),
            stop_reason: Set(None),
            reservation_id: Set(tx.reservation_id),
            status: Set(TransactionStatus::Active.as_str().to_string()),
        };
        let saved = model.insert(&self.db).await.map_err(db_err)?;
        debug!(transaction_id = saved.id, "Transaction created");
        Ok(model_to_domain(saved))
    }

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Transaction>> {
        let model = transaction::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(model_to_domain))
    }

    async fn find_active_for_connector(
        &self,
        charge_point_id: &str,
        connector_id: u32,
    ) -> DomainResult<Vec<Transaction>> {
        let models = transaction::Entity::find()
            .filter(transaction::Column::ChargePointId.eq(charge_point_id))
            .filter(transaction::Column::ConnectorId.eq(connector_column(connector_id)?))
            .filter(transaction::Column::Status.eq(TransactionStatus::Active.as_str()))
            .order_by_asc(transaction::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn close(&self, id: i32, closure: TransactionClosure) -> DomainResult<Option<Transaction>> {
        let Some(mut tx) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        if !tx.close(closure) {
            return Ok(None);
        }

        // Conditional on Active so a concurrent close cannot win twice.
        let result = transaction::Entity::update_many()
            .col_expr(transaction::Column::MeterStop, Expr::value(tx.meter_stop))
            .col_expr(
                transaction::Column::EnergyDeliveredWh,
                Expr::value(tx.energy_delivered_wh),
            )
            .col_expr(transaction::Column::StoppedAt, Expr::value(tx.stopped_at))
            .col_expr(transaction::Column::StopReason, Expr::value(tx.stop_reason.clone()))
            .col_expr(transaction::Column::Status, Expr::value(tx.status.as_str()))
            .filter(transaction::Column::Id.eq(id))
            .filter(transaction::Column::Status.eq(TransactionStatus::Active.as_str()))
            .exec(&self.db)
            .await
            .map_err(db_err)?;

        if result.rows_affected == 0 {
            return Ok(None);
        }
        Ok(Some(tx))
    }
}
