//! Closes transactions left Active on a connector before a new one starts.

use chrono::Utc;
use tracing::{error, info, warn};

use crate::application::session::ChargePointSession;
use crate::domain::{RepositoryProvider, Transaction, TransactionClosure, TransactionStatus};
use crate::support::errors::{DomainError, ReconciliationError};

pub const ORPHAN_STOP_REASON: &str = "Other";

#[derive(Debug, Default)]
pub struct ReconciliationReport {
    pub closed: Vec<Transaction>,
    pub failures: Vec<ReconciliationError>,
}

impl ReconciliationReport {
    pub fn is_clean(&self) -> bool {
        self.closed.is_empty() && self.failures.is_empty()
    }
}

/// Force-close every Active transaction on the connector.
///
/// `meter_stop` is the latest energy reading known for the orphan: first
/// this session's in-memory reading, then the stored meter values, then
/// the orphan's own `meter_start`. Failures are reported, never raised,
/// so a new transaction is never blocked by cleanup.
pub async fn reconcile_connector(
    repos: &dyn RepositoryProvider,
    session: &ChargePointSession,
    connector_id: u32,
) -> ReconciliationReport {
    let charge_point_id = session.charge_point_id();
    let mut report = ReconciliationReport::default();

    let orphans = match repos
        .transactions()
        .find_active_for_connector(charge_point_id, connector_id)
        .await
    {
        Ok(orphans) => orphans,
        Err(source) => {
            error!(charge_point_id, connector_id, error = %source, "Failed to look up orphaned transactions");
            report.failures.push(ReconciliationError {
                transaction_id: None,
                source,
            });
            return report;
        }
    };

    for orphan in orphans {
        match close_orphan(repos, session, &orphan).await {
            Ok(Some(closed)) => {
                info!(
                    charge_point_id,
                    connector_id,
                    transaction_id = closed.id,
                    meter_stop = ?closed.meter_stop,
                    "Closed orphaned transaction"
                );
                report.closed.push(closed);
            }
            // Closed concurrently by someone else.
            Ok(None) => {}
            Err(err) => {
                error!(charge_point_id, connector_id, error = %err, "Orphan reconciliation failed");
                report.failures.push(err);
            }
        }
    }

    report
}

async fn close_orphan(
    repos: &dyn RepositoryProvider,
    session: &ChargePointSession,
    orphan: &Transaction,
) -> Result<Option<Transaction>, ReconciliationError> {
    let fail = |source: DomainError| ReconciliationError {
        transaction_id: Some(orphan.id),
        source,
    };

    let meter_stop = match last_energy_reading(repos, session, orphan).await.map_err(fail)? {
        Some(wh) => wh,
        None => {
            warn!(
                charge_point_id = orphan.charge_point_id.as_str(),
                transaction_id = orphan.id,
                meter_start = orphan.meter_start,
                "No meter values for orphaned transaction, closing at meter_start"
            );
            orphan.meter_start
        }
    };

    repos
        .transactions()
        .close(
            orphan.id,
            TransactionClosure {
                meter_stop,
                stopped_at: Utc::now(),
                reason: ORPHAN_STOP_REASON.to_string(),
                status: TransactionStatus::Aborted,
            },
        )
        .await
        .map_err(fail)
}

async fn last_energy_reading(
    repos: &dyn RepositoryProvider,
    session: &ChargePointSession,
    orphan: &Transaction,
) -> Result<Option<i32>, DomainError> {
    if let Some(reading) = session.last_meter_reading(orphan.connector_id) {
        if reading.transaction_id == Some(orphan.id) {
            if let Some(wh) = meter_wh(orphan, reading.energy_wh) {
                return Ok(Some(wh));
            }
        }
    }

    let stored = repos
        .meter_values()
        .find_last_for_transaction(orphan.id)
        .await?;
    Ok(stored
        .and_then(|mv| mv.energy_wh())
        .and_then(|wh| meter_wh(orphan, wh)))
}

/// Whole Wh as stored in `meter_stop`; readings outside that range are skipped.
fn meter_wh(orphan: &Transaction, energy_wh: f64) -> Option<i32> {
    let rounded = energy_wh.round();
    if rounded.is_finite() && rounded >= f64::from(i32::MIN) && rounded <= f64::from(i32::MAX) {
        Some(rounded as i32)
    } else {
        warn!(
            charge_point_id = orphan.charge_point_id.as_str(),
            transaction_id = orphan.id,
            energy_wh,
            "Energy reading out of meter range, ignoring it"
        );
        None
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::application::session::MeterReading;
    use crate::domain::{NewMeterValue, NewTransaction, ENERGY_ACTIVE_IMPORT_REGISTER};
    use crate::infrastructure::storage::InMemoryStorage;
    use tokio::sync::mpsc;

    fn session() -> ChargePointSession {
        let (tx, _rx) = mpsc::unbounded_channel();
        ChargePointSession::new("CP001", None, tx, Duration::from_secs(30))
    }

    async fn open_tx(repos: &InMemoryStorage, connector_id: u32, meter_start: i32) -> Transaction {
        repos
            .transactions()
            .create(NewTransaction {
                charge_point_id: "CP001".into(),
                connector_id,
                id_tag: "TAG".into(),
                meter_start,
                started_at: Utc::now(),
                reservation_id: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn orphan_without_meter_values_closes_at_meter_start() {
        let repos = Arc::new(InMemoryStorage::new());
        let orphan = open_tx(&repos, 1, 1000).await;

        let report = reconcile_connector(repos.as_ref(), &session(), 1).await;
        assert_eq!(report.closed.len(), 1);
        assert!(report.failures.is_empty());

        let closed = repos.transactions().find_by_id(orphan.id).await.unwrap().unwrap();
        assert_eq!(closed.meter_stop, Some(1000));
        assert_eq!(closed.stop_reason.as_deref(), Some("Other"));
        assert_eq!(closed.status, TransactionStatus::Aborted);
        assert_eq!(closed.energy_delivered_wh, Some(0));
    }

    #[tokio::test]
    async fn orphan_uses_last_stored_reading() {
        let repos = InMemoryStorage::new();
        let orphan = open_tx(&repos, 1, 1000).await;
        repos
            .meter_values()
            .append(vec![NewMeterValue {
                charge_point_id: "CP001".into(),
                connector_id: 1,
                transaction_id: Some(orphan.id),
                timestamp: Utc::now(),
                measurand: ENERGY_ACTIVE_IMPORT_REGISTER.into(),
                value: 4.2,
                unit: "kWh".into(),
                context: "Sample.Periodic".into(),
                location: "Outlet".into(),
                phase: None,
                format: "Raw".into(),
            }])
            .await
            .unwrap();

        let report = reconcile_connector(&repos, &session(), 1).await;
        assert_eq!(report.closed[0].meter_stop, Some(4200));
        assert_eq!(report.closed[0].energy_delivered_wh, Some(3200));
    }

    #[tokio::test]
    async fn session_reading_takes_precedence() {
        let repos = InMemoryStorage::new();
        let orphan = open_tx(&repos, 2, 0).await;
        let session = session();
        session.record_meter_reading(
            2,
            MeterReading {
                transaction_id: Some(orphan.id),
                energy_wh: 777.0,
            },
        );

        let report = reconcile_connector(&repos, &session, 2).await;
        assert_eq!(report.closed[0].meter_stop, Some(777));
    }

    #[tokio::test]
    async fn completed_transactions_are_not_touched() {
        let repos = InMemoryStorage::new();
        let tx = open_tx(&repos, 1, 10).await;
        repos
            .transactions()
            .close(
                tx.id,
                TransactionClosure {
                    meter_stop: 50,
                    stopped_at: Utc::now(),
                    reason: "Local".into(),
                    status: TransactionStatus::Completed,
                },
            )
            .await
            .unwrap();

        let report = reconcile_connector(&repos, &session(), 1).await;
        assert!(report.is_clean());

        let unchanged = repos.transactions().find_by_id(tx.id).await.unwrap().unwrap();
        assert_eq!(unchanged.meter_stop, Some(50));
        assert_eq!(unchanged.stop_reason.as_deref(), Some("Local"));
    }

    #[tokio::test]
    async fn other_connectors_are_left_alone() {
        let repos = InMemoryStorage::new();
        let other = open_tx(&repos, 2, 0).await;

        let report = reconcile_connector(&repos, &session(), 1).await;
        assert!(report.is_clean());
        assert!(repos
            .transactions()
            .find_by_id(other.id)
            .await
            .unwrap()
            .unwrap()
            .is_active());
    }

    #[tokio::test]
    async fn out_of_range_session_reading_falls_back() {
        let repos = InMemoryStorage::new();
        let orphan = open_tx(&repos, 1, 300).await;
        let session = session();
        session.record_meter_reading(
            1,
            MeterReading {
                transaction_id: Some(orphan.id),
                energy_wh: 1e12,
            },
        );

        let report = reconcile_connector(&repos, &session, 1).await;
        assert!(report.failures.is_empty());
        assert_eq!(report.closed[0].meter_stop, Some(300));
        assert_eq!(report.closed[0].energy_delivered_wh, Some(0));
    }
}
