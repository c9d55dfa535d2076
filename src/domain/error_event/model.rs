use chrono::{DateTime, Utc};

/// A fault reported by a charge point. `connector_id` is `None` for faults
/// of the charge point itself (connector 0).
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorEvent {
    pub id: i64,
    pub charge_point_id: String,
    pub connector_id: Option<u32>,
    pub error_code: String,
    pub description: Option<String>,
    pub vendor_error_code: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ErrorEvent {
    pub fn is_open(&self) -> bool {
        self.resolved_at.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewErrorEvent {
    pub charge_point_id: String,
    pub connector_id: Option<u32>,
    pub error_code: String,
    pub description: Option<String>,
    pub vendor_error_code: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl NewErrorEvent {
    pub fn into_error_event(self, id: i64) -> ErrorEvent {
        ErrorEvent {
            id,
            charge_point_id: self.charge_point_id,
            connector_id: self.connector_id,
            error_code: self.error_code,
            description: self.description,
            vendor_error_code: self.vendor_error_code,
            occurred_at: self.occurred_at,
            resolved_at: None,
        }
    }
}
