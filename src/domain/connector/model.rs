use chrono::{DateTime, Utc};

use crate::domain::charge_point::ConnectorStatus;

/// One outlet of a charge point, unique by `(charge_point_id, connector_id)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Connector {
    pub charge_point_id: String,
    pub connector_id: u32,
    pub status: ConnectorStatus,
    pub error_code: Option<String>,
    pub info: Option<String>,
    pub vendor_id: Option<String>,
    pub vendor_error_code: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Connector {
    pub fn new(charge_point_id: impl Into<String>, connector_id: u32) -> Self {
        Self {
            charge_point_id: charge_point_id.into(),
            connector_id,
            status: ConnectorStatus::default(),
            error_code: None,
            info: None,
            vendor_id: None,
            vendor_error_code: None,
            updated_at: Utc::now(),
        }
    }

    pub fn apply(&mut self, update: ConnectorStatusUpdate) {
        self.status = update.status;
        self.error_code = update.error_code;
        self.info = update.info;
        self.vendor_id = update.vendor_id;
        self.vendor_error_code = update.vendor_error_code;
        self.updated_at = update.at;
    }
}

/// Fields carried by a StatusNotification for one connector.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorStatusUpdate {
    pub status: ConnectorStatus,
    pub error_code: Option<String>,
    pub info: Option<String>,
    pub vendor_id: Option<String>,
    pub vendor_error_code: Option<String>,
    pub at: DateTime<Utc>,
}
