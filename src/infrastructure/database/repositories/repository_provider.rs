//! SeaORM implementation of RepositoryProvider

use sea_orm::DatabaseConnection;

use crate::domain::{
    ChargePointRepository, ConnectorRepository, ErrorEventRepository, MeterValueRepository,
    RepositoryProvider, TransactionRepository,
};

use super::charge_point_repository::SeaOrmChargePointRepository;
use super::connector_repository::SeaOrmConnectorRepository;
use super::error_event_repository::SeaOrmErrorEventRepository;
use super::meter_value_repository::SeaOrmMeterValueRepository;
use super::transaction_repository::SeaOrmTransactionRepository;

/// Unified repository provider backed by SeaORM.
///
/// Holds one connection pool and exposes per-aggregate repository accessors.
///
/// ```ignore
/// let repos = SeaOrmRepositoryProvider::new(db.clone());
/// let cp = repos.charge_points().find_by_id("CP001").await?;
/// let open = repos.transactions().find_active_for_connector("CP001", 1).await?;
/// ```
pub struct SeaOrmRepositoryProvider {
    charge_points: SeaOrmChargePointRepository,
    connectors: SeaOrmConnectorRepository,
    transactions: SeaOrmTransactionRepository,
    meter_values: SeaOrmMeterValueRepository,
    error_events: SeaOrmErrorEventRepository,
}

impl SeaOrmRepositoryProvider {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            charge_points: SeaOrmChargePointRepository::new(db.clone()),
            connectors: SeaOrmConnectorRepository::new(db.clone()),
            transactions: SeaOrmTransactionRepository::new(db.clone()),
            meter_values: SeaOrmMeterValueRepository::new(db.clone()),
            error_events: SeaOrmErrorEventRepository::new(db),
        }
    }
}

impl RepositoryProvider for SeaOrmRepositoryProvider {
    fn charge_points(&self) -> &dyn ChargePointRepository {
        &self.charge_points
    }

    fn connectors(&self) -> &dyn ConnectorRepository {
        &self.connectors
    }

    fn transactions(&self) -> &dyn TransactionRepository {
        &self.transactions
    }

    fn meter_values(&self) -> &dyn MeterValueRepository {
        &self.meter_values
    }

    fn error_events(&self) -> &dyn ErrorEventRepository {
        &self.error_events
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::domain::{
        ConnectorStatus, ConnectorStatusUpdate, NewErrorEvent, NewMeterValue, NewTransaction,
        TransactionClosure, TransactionStatus, ENERGY_ACTIVE_IMPORT_REGISTER,
    };
    use crate::infrastructure::database::{init_database, DatabaseConfig};

    async fn provider() -> SeaOrmRepositoryProvider {
        let db = init_database(&DatabaseConfig::memory()).await.unwrap();
        let repos = SeaOrmRepositoryProvider::new(db);
        repos
            .charge_points()
            .set_connected("CP001", true, Utc::now())
            .await
            .unwrap();
        repos
    }

    fn new_tx(connector_id: u32, meter_start: i32) -> NewTransaction {
        NewTransaction {
            charge_point_id: "CP001".into(),
            connector_id,
            id_tag: "TAG".into(),
            meter_start,
            started_at: Utc::now(),
            reservation_id: None,
        }
    }

    fn energy(transaction_id: i32, value: f64, unit: &str, offset_secs: i64) -> NewMeterValue {
        NewMeterValue {
            charge_point_id: "CP001".into(),
            connector_id: 1,
            transaction_id: Some(transaction_id),
            timestamp: Utc::now() + Duration::seconds(offset_secs),
            measurand: ENERGY_ACTIVE_IMPORT_REGISTER.into(),
            value,
            unit: unit.into(),
            context: "Sample.Periodic".into(),
            location: "Outlet".into(),
            phase: None,
            format: "Raw".into(),
        }
    }

    #[tokio::test]
    async fn charge_point_round_trip() {
        let repos = provider().await;
        let mut cp = repos.charge_points().find_or_new("CP001").await.unwrap();
        assert!(cp.is_connected);

        cp.vendor = Some("ACME".into());
        repos.charge_points().upsert(cp).await.unwrap();
        repos
            .charge_points()
            .update_status("CP001", ConnectorStatus::Faulted)
            .await
            .unwrap();
        repos
            .charge_points()
            .set_connected("CP001", false, Utc::now())
            .await
            .unwrap();

        let stored = repos.charge_points().find_by_id("CP001").await.unwrap().unwrap();
        assert_eq!(stored.vendor.as_deref(), Some("ACME"));
        assert_eq!(stored.status, Some(ConnectorStatus::Faulted));
        assert!(!stored.is_connected);
    }

    #[tokio::test]
    async fn connector_is_created_on_first_status() {
        let repos = provider().await;
        let connector = repos
            .connectors()
            .update_status(
                "CP001",
                2,
                ConnectorStatusUpdate {
                    status: ConnectorStatus::Charging,
                    error_code: Some("NoError".into()),
                    info: None,
                    vendor_id: None,
                    vendor_error_code: None,
                    at: Utc::now(),
                },
            )
            .await
            .unwrap();
        assert_eq!(connector.status, ConnectorStatus::Charging);

        repos.connectors().get_or_create("CP001", 1).await.unwrap();
        let all = repos.connectors().find_by_charge_point("CP001").await.unwrap();
        let numbers: Vec<u32> = all.iter().map(|c| c.connector_id).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let repos = provider().await;
        let tx = repos.transactions().create(new_tx(1, 100)).await.unwrap();
        let closure = |meter_stop| TransactionClosure {
            meter_stop,
            stopped_at: Utc::now(),
            reason: "Local".into(),
            status: TransactionStatus::Completed,
        };

        let closed = repos.transactions().close(tx.id, closure(400)).await.unwrap().unwrap();
        assert_eq!(closed.energy_delivered_wh, Some(300));
        assert!(repos.transactions().close(tx.id, closure(900)).await.unwrap().is_none());

        let stored = repos.transactions().find_by_id(tx.id).await.unwrap().unwrap();
        assert_eq!(stored.meter_stop, Some(400));
        assert_eq!(stored.status, TransactionStatus::Completed);
        assert!(repos
            .transactions()
            .find_active_for_connector("CP001", 1)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn last_energy_reading_is_the_latest_sample() {
        let repos = provider().await;
        let tx = repos.transactions().create(new_tx(1, 0)).await.unwrap();
        repos
            .meter_values()
            .append(vec![energy(tx.id, 1.5, "kWh", 0), energy(tx.id, 2.0, "kWh", 60)])
            .await
            .unwrap();
        assert_eq!(repos.meter_values().append(Vec::new()).await.unwrap(), 0);

        let last = repos
            .meter_values()
            .find_last_for_transaction(tx.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(last.energy_wh(), Some(2000.0));
    }

    #[tokio::test]
    async fn error_events_resolve_per_scope() {
        let repos = provider().await;
        for connector_id in [None, Some(1)] {
            repos
                .error_events()
                .record(NewErrorEvent {
                    charge_point_id: "CP001".into(),
                    connector_id,
                    error_code: "GroundFailure".into(),
                    description: None,
                    vendor_error_code: None,
                    occurred_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let resolved = repos
            .error_events()
            .resolve_open("CP001", Some(1), Utc::now())
            .await
            .unwrap();
        assert_eq!(resolved, 1);
        assert!(repos.error_events().find_open("CP001", Some(1)).await.unwrap().is_empty());
        assert_eq!(repos.error_events().find_open("CP001", None).await.unwrap().len(), 1);
    }
}
