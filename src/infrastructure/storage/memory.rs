//! In-memory repositories for development and testing

use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::domain::{
    ChargePoint, ChargePointRepository, Connector, ConnectorRepository, ConnectorStatus,
    ConnectorStatusUpdate, DomainResult, ErrorEvent, ErrorEventRepository, MeterValue,
    MeterValueRepository, NewErrorEvent, NewMeterValue, NewTransaction, RepositoryProvider,
    Transaction, TransactionClosure, TransactionRepository,
};

/// All repositories backed by `DashMap`s. Nothing survives a restart.
pub struct InMemoryStorage {
    charge_points: DashMap<String, ChargePoint>,
    connectors: DashMap<(String, u32), Connector>,
    transactions: DashMap<i32, Transaction>,
    meter_values: DashMap<i64, MeterValue>,
    error_events: DashMap<i64, ErrorEvent>,
    transaction_counter: AtomicI32,
    meter_value_counter: AtomicI64,
    error_event_counter: AtomicI64,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            charge_points: DashMap::new(),
            connectors: DashMap::new(),
            transactions: DashMap::new(),
            meter_values: DashMap::new(),
            error_events: DashMap::new(),
            transaction_counter: AtomicI32::new(1),
            meter_value_counter: AtomicI64::new(1),
            error_event_counter: AtomicI64::new(1),
        }
    }

    /// Every stored transaction, ordered by id.
    pub fn all_transactions(&self) -> Vec<Transaction> {
        let mut all: Vec<_> = self.transactions.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|tx| tx.id);
        all
    }

    /// Every stored sample, in insertion order.
    pub fn all_meter_values(&self) -> Vec<MeterValue> {
        let mut all: Vec<_> = self.meter_values.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|mv| mv.id);
        all
    }

    pub fn all_error_events(&self) -> Vec<ErrorEvent> {
        let mut all: Vec<_> = self.error_events.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|ev| ev.id);
        all
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositoryProvider for InMemoryStorage {
    fn charge_points(&self) -> &dyn ChargePointRepository {
        self
    }

    fn connectors(&self) -> &dyn ConnectorRepository {
        self
    }

    fn transactions(&self) -> &dyn TransactionRepository {
        self
    }

    fn meter_values(&self) -> &dyn MeterValueRepository {
        self
    }

    fn error_events(&self) -> &dyn ErrorEventRepository {
        self
    }
}

#[async_trait]
impl ChargePointRepository for InMemoryStorage {
    async fn find_by_id(&self, id: &str) -> DomainResult<Option<ChargePoint>> {
        Ok(self.charge_points.get(id).map(|cp| cp.clone()))
    }

    async fn upsert(&self, charge_point: ChargePoint) -> DomainResult<()> {
        self.charge_points
            .insert(charge_point.id.clone(), charge_point);
        Ok(())
    }

    async fn update_status(&self, id: &str, status: ConnectorStatus) -> DomainResult<()> {
        self.charge_points
            .entry(id.to_string())
            .or_insert_with(|| ChargePoint::new(id))
            .status = Some(status);
        Ok(())
    }

    async fn set_connected(
        &self,
        id: &str,
        connected: bool,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        let mut cp = self
            .charge_points
            .entry(id.to_string())
            .or_insert_with(|| ChargePoint::new(id));
        if connected {
            cp.connect(at);
        } else {
            cp.disconnect();
        }
        Ok(())
    }
}

#[async_trait]
impl ConnectorRepository for InMemoryStorage {
    async fn find(&self, charge_point_id: &str, connector_id: u32) -> DomainResult<Option<Connector>> {
        Ok(self
            .connectors
            .get(&(charge_point_id.to_string(), connector_id))
            .map(|c| c.clone()))
    }

    async fn get_or_create(&self, charge_point_id: &str, connector_id: u32) -> DomainResult<Connector> {
        Ok(self
            .connectors
            .entry((charge_point_id.to_string(), connector_id))
            .or_insert_with(|| Connector::new(charge_point_id, connector_id))
            .clone())
    }

    async fn update_status(
        &self,
        charge_point_id: &str,
        connector_id: u32,
        update: ConnectorStatusUpdate,
    ) -> DomainResult<Connector> {
        let mut connector = self
            .connectors
            .entry((charge_point_id.to_string(), connector_id))
            .or_insert_with(|| Connector::new(charge_point_id, connector_id));
        connector.apply(update);
        Ok(connector.clone())
    }

    async fn find_by_charge_point(&self, charge_point_id: &str) -> DomainResult<Vec<Connector>> {
        let mut connectors: Vec<_> = self
            .connectors
            .iter()
            .filter(|e| e.key().0 == charge_point_id)
            .map(|e| e.value().clone())
            .collect();
        connectors.sort_by_key(|c| c.connector_id);
        Ok(connectors)
    }
}

#[async_trait]
impl TransactionRepository for InMemoryStorage {
    async fn create(&self, transaction: NewTransaction) -> DomainResult<Transaction> {
        let id = self.transaction_counter.fetch_add(1, Ordering::SeqCst);
        let transaction = transaction.into_transaction(id);
        self.transactions.insert(id, transaction.clone());
        Ok(transaction)
    }

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Transaction>> {
        Ok(self.transactions.get(&id).map(|tx| tx.clone()))
    }

    async fn find_active_for_connector(
        &self,
        charge_point_id: &str,
        connector_id: u32,
    ) -> DomainResult<Vec<Transaction>> {
        let mut active: Vec<_> = self
            .transactions
            .iter()
            .filter(|e| {
                let tx = e.value();
                tx.is_active()
                    && tx.charge_point_id == charge_point_id
                    && tx.connector_id == connector_id
            })
            .map(|e| e.value().clone())
            .collect();
        active.sort_by_key(|tx| tx.id);
        Ok(active)
    }

    async fn close(&self, id: i32, closure: TransactionClosure) -> DomainResult<Option<Transaction>> {
        let Some(mut tx) = self.transactions.get_mut(&id) else {
            return Ok(None);
        };
        if tx.close(closure) {
            Ok(Some(tx.clone()))
        } else {
            Ok(None)
        }
    }
}

#[async_trait]
impl MeterValueRepository for InMemoryStorage {
    async fn append(&self, values: Vec<NewMeterValue>) -> DomainResult<usize> {
        let count = values.len();
        for value in values {
            let id = self.meter_value_counter.fetch_add(1, Ordering::SeqCst);
            self.meter_values.insert(id, value.into_meter_value(id));
        }
        Ok(count)
    }

    async fn find_last_for_transaction(&self, transaction_id: i32) -> DomainResult<Option<MeterValue>> {
        Ok(self
            .meter_values
            .iter()
            .filter(|e| {
                e.value().transaction_id == Some(transaction_id) && e.value().energy_wh().is_some()
            })
            .max_by_key(|e| (e.value().timestamp, e.value().id))
            .map(|e| e.value().clone()))
    }
}

#[async_trait]
impl ErrorEventRepository for InMemoryStorage {
    async fn record(&self, event: NewErrorEvent) -> DomainResult<ErrorEvent> {
        let id = self.error_event_counter.fetch_add(1, Ordering::SeqCst);
        let event = event.into_error_event(id);
        self.error_events.insert(id, event.clone());
        Ok(event)
    }

    async fn find_open(
        &self,
        charge_point_id: &str,
        connector_id: Option<u32>,
    ) -> DomainResult<Vec<ErrorEvent>> {
        let mut open: Vec<_> = self
            .error_events
            .iter()
            .filter(|e| {
                let ev = e.value();
                ev.is_open() && ev.charge_point_id == charge_point_id && ev.connector_id == connector_id
            })
            .map(|e| e.value().clone())
            .collect();
        open.sort_by_key(|ev| ev.id);
        Ok(open)
    }

    async fn resolve_open(
        &self,
        charge_point_id: &str,
        connector_id: Option<u32>,
        at: DateTime<Utc>,
    ) -> DomainResult<u64> {
        let mut resolved = 0;
        for mut entry in self.error_events.iter_mut() {
            let ev = entry.value_mut();
            if ev.is_open() && ev.charge_point_id == charge_point_id && ev.connector_id == connector_id {
                ev.resolved_at = Some(at);
                resolved += 1;
            }
        }
        Ok(resolved)
    }
}
