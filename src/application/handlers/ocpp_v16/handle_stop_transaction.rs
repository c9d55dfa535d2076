//! StopTransaction handler

use rust_ocpp::v1_6::messages::stop_transaction::{
    StopTransactionRequest, StopTransactionResponse,
};
use tracing::{info, warn};

use super::accepted_id_tag;
use super::handle_meter_values::collect_samples;
use crate::application::handlers::OcppHandlerV16;
use crate::domain::{TransactionClosure, TransactionStatus};
use crate::support::errors::ProtocolError;
use crate::support::serializations::wire_name;

/// OCPP 1.6: an omitted reason means a normal local stop.
const DEFAULT_STOP_REASON: &str = "Local";

pub async fn handle_stop_transaction(
    handler: &OcppHandlerV16,
    req: &StopTransactionRequest,
) -> Result<StopTransactionResponse, ProtocolError> {
    let charge_point_id = handler.charge_point_id();
    let reason = req
        .reason
        .as_ref()
        .map(wire_name)
        .unwrap_or_else(|| DEFAULT_STOP_REASON.to_string());

    info!(
        charge_point_id,
        transaction_id = req.transaction_id,
        meter_stop = req.meter_stop,
        reason = reason.as_str(),
        "StopTransaction"
    );

    let transactions = handler.repos.transactions();
    // Only transactions this charge point started may be closed by it.
    let owned = match transactions.find_by_id(req.transaction_id).await? {
        Some(tx) if tx.charge_point_id == charge_point_id => true,
        Some(tx) => {
            warn!(
                charge_point_id,
                transaction_id = req.transaction_id,
                owner = tx.charge_point_id.as_str(),
                "StopTransaction for another charge point's transaction"
            );
            false
        }
        None => false,
    };

    let closed = if owned {
        transactions
            .close(
                req.transaction_id,
                TransactionClosure {
                    meter_stop: req.meter_stop,
                    stopped_at: req.timestamp,
                    reason,
                    status: TransactionStatus::Completed,
                },
            )
            .await?
    } else {
        None
    };

    let connector_id = match &closed {
        Some(tx) => {
            info!(
                charge_point_id,
                transaction_id = tx.id,
                energy_wh = ?tx.energy_delivered_wh,
                "Transaction stopped"
            );
            Some(tx.connector_id)
        }
        None => {
            // Unknown or already closed: answer normally, change nothing.
            warn!(
                charge_point_id,
                transaction_id = req.transaction_id,
                "StopTransaction for unknown or closed transaction"
            );
            None
        }
    };

    if let (Some(connector_id), Some(data)) = (connector_id, &req.transaction_data) {
        let samples = collect_samples(charge_point_id, connector_id, Some(req.transaction_id), data);
        handler.repos.meter_values().append(samples).await?;
    }

    if closed.is_some() {
        let repo = handler.repos.charge_points();
        let mut charge_point = repo.find_or_new(charge_point_id).await?;
        charge_point.last_tx_stop_at = Some(req.timestamp);
        repo.upsert(charge_point).await?;
    }

    Ok(StopTransactionResponse {
        id_tag_info: Some(accepted_id_tag()),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use chrono::{TimeZone, Utc};

    use crate::application::testing::Harness;
    use crate::domain::{
        ChargePointRepository, NewTransaction, TransactionRepository, TransactionStatus,
    };
    use crate::support::ocpp_frame::OcppFrame;

    fn stop(transaction_id: i32, meter_stop: i32) -> serde_json::Value {
        json!({
            "transactionId": transaction_id,
            "meterStop": meter_stop,
            "timestamp": "2024-05-01T11:00:00Z",
            "reason": "EVDisconnected",
            "transactionData": [{
                "timestamp": "2024-05-01T10:59:00Z",
                "sampledValue": [{"value": "5.9", "unit": "kWh"}]
            }]
        })
    }

    #[tokio::test]
    async fn stop_completes_the_transaction() {
        let mut harness = Harness::new();
        let id = harness.start_transaction(1, 1000).await;

        let reply = harness.call("StopTransaction", stop(id, 6000)).await;
        let OcppFrame::CallResult { payload, .. } = reply else {
            panic!("expected CallResult, got {:?}", reply);
        };
        assert_eq!(payload["idTagInfo"]["status"], "Accepted");

        let tx = TransactionRepository::find_by_id(harness.storage.as_ref(), id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.meter_stop, Some(6000));
        assert_eq!(tx.energy_delivered_wh, Some(5000));
        assert_eq!(tx.stop_reason.as_deref(), Some("EVDisconnected"));

        let samples = harness.storage.all_meter_values();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].transaction_id, Some(id));
    }

    #[tokio::test]
    async fn repeated_stop_changes_nothing() {
        let mut harness = Harness::new();
        let id = harness.start_transaction(1, 0).await;
        harness.call("StopTransaction", stop(id, 300)).await;

        let reply = harness.call("StopTransaction", stop(id, 900)).await;
        assert!(matches!(reply, OcppFrame::CallResult { .. }));

        let tx = TransactionRepository::find_by_id(harness.storage.as_ref(), id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tx.meter_stop, Some(300));
        assert_eq!(harness.storage.all_meter_values().len(), 1);
    }

    #[tokio::test]
    async fn unknown_transaction_is_still_answered() {
        let mut harness = Harness::new();
        let reply = harness.call("StopTransaction", stop(424242, 10)).await;
        assert!(matches!(reply, OcppFrame::CallResult { .. }));
        assert!(harness.storage.all_transactions().is_empty());
        assert!(harness.storage.all_meter_values().is_empty());
    }

    #[tokio::test]
    async fn stop_time_comes_from_the_message() {
        let mut harness = Harness::new();
        let id = harness.start_transaction(1, 0).await;
        harness.call("StopTransaction", stop(id, 100)).await;

        let charge_point = ChargePointRepository::find_by_id(harness.storage.as_ref(), "CP001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            charge_point.last_tx_stop_at,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn foreign_transaction_is_left_active() {
        let mut harness = Harness::new();
        let foreign = TransactionRepository::create(
            harness.storage.as_ref(),
            NewTransaction {
                charge_point_id: "CP002".to_string(),
                connector_id: 1,
                id_tag: "TAG2".to_string(),
                meter_start: 0,
                started_at: Utc::now(),
                reservation_id: None,
            },
        )
        .await
        .unwrap();

        let reply = harness.call("StopTransaction", stop(foreign.id, 700)).await;
        assert!(matches!(reply, OcppFrame::CallResult { .. }));

        let tx = TransactionRepository::find_by_id(harness.storage.as_ref(), foreign.id)
            .await
            .unwrap()
            .unwrap();
        assert!(tx.is_active());
        assert_eq!(tx.meter_stop, None);
        assert!(harness.storage.all_meter_values().is_empty());
    }
}
