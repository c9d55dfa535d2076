//! Transaction domain entity

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use tracing::warn;

/// Transaction status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionStatus {
    Active,
    /// Stopped by the charge point
    Completed,
    /// Force-closed by the central system (orphan reconciliation)
    Aborted,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Completed => "Completed",
            Self::Aborted => "Aborted",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(Self::Active),
            "Completed" => Ok(Self::Completed),
            "Aborted" => Ok(Self::Aborted),
            other => Err(format!("unknown transaction status: {}", other)),
        }
    }
}

/// Charging transaction. `id` is the OCPP `transactionId` handed to the
/// charge point.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: i32,
    pub charge_point_id: String,
    pub connector_id: u32,
    pub id_tag: String,
    /// Meter value at start (Wh)
    pub meter_start: i32,
    /// Meter value at stop (Wh)
    pub meter_stop: Option<i32>,
    /// `meter_stop - meter_start`, never negative
    pub energy_delivered_wh: Option<i32>,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub stop_reason: Option<String>,
    pub reservation_id: Option<i32>,
    pub status: TransactionStatus,
}

/// Data needed to open a transaction; the id comes from the repository.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub charge_point_id: String,
    pub connector_id: u32,
    pub id_tag: String,
    pub meter_start: i32,
    pub started_at: DateTime<Utc>,
    pub reservation_id: Option<i32>,
}

impl NewTransaction {
    pub fn into_transaction(self, id: i32) -> Transaction {
        Transaction {
            id,
            charge_point_id: self.charge_point_id,
            connector_id: self.connector_id,
            id_tag: self.id_tag,
            meter_start: self.meter_start,
            meter_stop: None,
            energy_delivered_wh: None,
            started_at: self.started_at,
            stopped_at: None,
            stop_reason: None,
            reservation_id: self.reservation_id,
            status: TransactionStatus::Active,
        }
    }
}

/// How a transaction ended.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionClosure {
    pub meter_stop: i32,
    pub stopped_at: DateTime<Utc>,
    pub reason: String,
    pub status: TransactionStatus,
}

impl Transaction {
    pub fn is_active(&self) -> bool {
        self.status == TransactionStatus::Active
    }

    /// Close an active transaction. Returns `false` (and changes nothing)
    /// if it was already closed.
    pub fn close(&mut self, closure: TransactionClosure) -> bool {
        if !self.is_active() {
            return false;
        }

        self.energy_delivered_wh = Some(energy_delivered(
            self.id,
            self.meter_start,
            closure.meter_stop,
        ));
        self.meter_stop = Some(closure.meter_stop);
        self.stopped_at = Some(closure.stopped_at);
        self.stop_reason = Some(closure.reason);
        self.status = closure.status;
        true
    }
}

/// Energy between two register readings. A stop reading below the start
/// reading is a data-quality problem on the station side and yields 0.
pub fn energy_delivered(transaction_id: i32, meter_start: i32, meter_stop: i32) -> i32 {
    let delta = meter_stop.saturating_sub(meter_start);
    if delta < 0 {
        warn!(
            transaction_id,
            meter_start, meter_stop, "Meter stop below meter start, energy clamped to 0"
        );
        return 0;
    }
    delta
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active(meter_start: i32) -> Transaction {
        NewTransaction {
            charge_point_id: "CP001".into(),
            connector_id: 1,
            id_tag: "TAG".into(),
            meter_start,
            started_at: Utc::now(),
            reservation_id: None,
        }
        .into_transaction(7)
    }

    fn closure(meter_stop: i32) -> TransactionClosure {
        TransactionClosure {
            meter_stop,
            stopped_at: Utc::now(),
            reason: "Local".into(),
            status: TransactionStatus::Completed,
        }
    }

    #[test]
    fn close_computes_energy() {
        let mut tx = active(1000);
        assert!(tx.close(closure(15000)));
        assert_eq!(tx.energy_delivered_wh, Some(14000));
        assert_eq!(tx.status, TransactionStatus::Completed);
    }

    #[test]
    fn negative_energy_is_clamped() {
        let mut tx = active(5000);
        tx.close(closure(4000));
        assert_eq!(tx.energy_delivered_wh, Some(0));
        assert_eq!(tx.meter_stop, Some(4000));
    }

    #[test]
    fn closed_transaction_is_left_alone() {
        let mut tx = active(0);
        tx.close(closure(10));
        assert!(!tx.close(closure(99)));
        assert_eq!(tx.meter_stop, Some(10));
    }
}
