//! StartTransaction handler

use rust_ocpp::v1_6::messages::start_transaction::{
    StartTransactionRequest, StartTransactionResponse,
};
use tracing::{info, warn};

use super::accepted_id_tag;
use crate::application::handlers::OcppHandlerV16;
use crate::application::services::orphan_reconciler::reconcile_connector;
use crate::domain::NewTransaction;
use crate::support::errors::ProtocolError;

pub async fn handle_start_transaction(
    handler: &OcppHandlerV16,
    req: &StartTransactionRequest,
) -> Result<StartTransactionResponse, ProtocolError> {
    let charge_point_id = handler.charge_point_id();
    info!(
        charge_point_id,
        connector_id = req.connector_id,
        id_tag = req.id_tag.as_str(),
        meter_start = req.meter_start,
        "StartTransaction"
    );

    let report =
        reconcile_connector(handler.repos.as_ref(), &handler.session, req.connector_id).await;
    if !report.failures.is_empty() {
        warn!(
            charge_point_id,
            connector_id = req.connector_id,
            failures = report.failures.len(),
            "Starting despite unreconciled transactions"
        );
    }

    handler
        .repos
        .connectors()
        .get_or_create(charge_point_id, req.connector_id)
        .await?;

    let transaction = handler
        .repos
        .transactions()
        .create(NewTransaction {
            charge_point_id: charge_point_id.to_string(),
            connector_id: req.connector_id,
            id_tag: req.id_tag.clone(),
            meter_start: req.meter_start,
            started_at: req.timestamp,
            reservation_id: req.reservation_id.and_then(|id| i32::try_from(id).ok()),
        })
        .await?;

    let repo = handler.repos.charge_points();
    let mut charge_point = repo.find_or_new(charge_point_id).await?;
    charge_point.last_tx_start_at = Some(req.timestamp);
    repo.upsert(charge_point).await?;

    info!(
        charge_point_id,
        connector_id = req.connector_id,
        transaction_id = transaction.id,
        "Transaction started"
    );

    Ok(StartTransactionResponse {
        transaction_id: transaction.id,
        id_tag_info: accepted_id_tag(),
    })
}
