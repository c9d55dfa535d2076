//! Charge Point domain entity

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_ocpp::v1_6::types::ChargePointStatus;

/// Status reported through StatusNotification.
///
/// Used for connectors and, when reported for connector 0, for the charge
/// point as a whole.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectorStatus {
    #[default]
    Available,
    Preparing,
    Charging,
    SuspendedEV,
    SuspendedEVSE,
    Finishing,
    Reserved,
    Unavailable,
    Faulted,
}

impl ConnectorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::Preparing => "Preparing",
            Self::Charging => "Charging",
            Self::SuspendedEV => "SuspendedEV",
            Self::SuspendedEVSE => "SuspendedEVSE",
            Self::Finishing => "Finishing",
            Self::Reserved => "Reserved",
            Self::Unavailable => "Unavailable",
            Self::Faulted => "Faulted",
        }
    }
}

impl fmt::Display for ConnectorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectorStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Available" => Self::Available,
            "Preparing" => Self::Preparing,
            "Charging" => Self::Charging,
            "SuspendedEV" => Self::SuspendedEV,
            "SuspendedEVSE" => Self::SuspendedEVSE,
            "Finishing" => Self::Finishing,
            "Reserved" => Self::Reserved,
            "Unavailable" => Self::Unavailable,
            "Faulted" => Self::Faulted,
            other => return Err(format!("unknown connector status: {}", other)),
        })
    }
}

impl From<ChargePointStatus> for ConnectorStatus {
    fn from(status: ChargePointStatus) -> Self {
        match status {
            ChargePointStatus::Available => Self::Available,
            ChargePointStatus::Preparing => Self::Preparing,
            ChargePointStatus::Charging => Self::Charging,
            ChargePointStatus::SuspendedEV => Self::SuspendedEV,
            ChargePointStatus::SuspendedEVSE => Self::SuspendedEVSE,
            ChargePointStatus::Finishing => Self::Finishing,
            ChargePointStatus::Reserved => Self::Reserved,
            ChargePointStatus::Unavailable => Self::Unavailable,
            ChargePointStatus::Faulted => Self::Faulted,
        }
    }
}

/// Identification reported in BootNotification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootInfo {
    pub vendor: String,
    pub model: String,
    pub serial_number: Option<String>,
    pub firmware_version: Option<String>,
    pub iccid: Option<String>,
    pub imsi: Option<String>,
}

/// Charge Point entity, keyed by the identity in the connection path.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargePoint {
    pub id: String,
    pub vendor: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub firmware_version: Option<String>,
    pub iccid: Option<String>,
    pub imsi: Option<String>,
    pub is_connected: bool,
    /// Last status reported for connector 0, `None` until one arrives
    pub status: Option<ConnectorStatus>,
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    pub last_boot_at: Option<DateTime<Utc>>,
    pub last_connect_at: Option<DateTime<Utc>>,
    pub last_tx_start_at: Option<DateTime<Utc>>,
    pub last_tx_stop_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ChargePoint {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            vendor: None,
            model: None,
            serial_number: None,
            firmware_version: None,
            iccid: None,
            imsi: None,
            is_connected: false,
            status: None,
            last_heartbeat_at: None,
            last_boot_at: None,
            last_connect_at: None,
            last_tx_start_at: None,
            last_tx_stop_at: None,
            created_at: Utc::now(),
        }
    }

    /// Apply a BootNotification. Optional fields the station omitted keep
    /// their previously known value.
    pub fn apply_boot(&mut self, boot: BootInfo, at: DateTime<Utc>) {
        self.vendor = Some(boot.vendor);
        self.model = Some(boot.model);
        self.serial_number = boot.serial_number.or(self.serial_number.take());
        self.firmware_version = boot.firmware_version.or(self.firmware_version.take());
        self.iccid = boot.iccid.or(self.iccid.take());
        self.imsi = boot.imsi.or(self.imsi.take());
        self.last_boot_at = Some(at);
    }

    pub fn connect(&mut self, at: DateTime<Utc>) {
        self.is_connected = true;
        self.last_connect_at = Some(at);
    }

    pub fn disconnect(&mut self) {
        self.is_connected = false;
    }
}
