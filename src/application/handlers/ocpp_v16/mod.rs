//! OCPP 1.6 handler registry
//!
//! Maps action names to typed `rust_ocpp::v1_6` requests and routes each
//! request to its handler. Only the charge-point-initiated subset below
//! is handled; anything else is answered with a CallError.

use serde::de::DeserializeOwned;
use serde_json::Value;

use rust_ocpp::v1_6::messages::authorize::{AuthorizeRequest, AuthorizeResponse};
use rust_ocpp::v1_6::messages::boot_notification::{
    BootNotificationRequest, BootNotificationResponse,
};
use rust_ocpp::v1_6::messages::heart_beat::{HeartbeatRequest, HeartbeatResponse};
use rust_ocpp::v1_6::messages::meter_values::{MeterValuesRequest, MeterValuesResponse};
use rust_ocpp::v1_6::messages::start_transaction::{
    StartTransactionRequest, StartTransactionResponse,
};
use rust_ocpp::v1_6::messages::status_notification::{
    StatusNotificationRequest, StatusNotificationResponse,
};
use rust_ocpp::v1_6::messages::stop_transaction::{
    StopTransactionRequest, StopTransactionResponse,
};
use rust_ocpp::v1_6::types::{AuthorizationStatus, IdTagInfo};

use crate::application::handlers::OcppHandlerV16;
use crate::support::errors::ProtocolError;
use crate::support::ocpp_frame::ErrorCode;

mod handle_authorize;
mod handle_boot_notification;
mod handle_heartbeat;
mod handle_meter_values;
mod handle_start_transaction;
mod handle_status_notification;
mod handle_stop_transaction;

pub use handle_authorize::handle_authorize;
pub use handle_boot_notification::handle_boot_notification;
pub use handle_heartbeat::handle_heartbeat;
pub use handle_meter_values::handle_meter_values;
pub use handle_start_transaction::handle_start_transaction;
pub use handle_status_notification::handle_status_notification;
pub use handle_stop_transaction::handle_stop_transaction;

/// Actions a charge point may send that this central system handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OcppAction {
    Authorize,
    BootNotification,
    Heartbeat,
    MeterValues,
    StartTransaction,
    StatusNotification,
    StopTransaction,
}

impl OcppAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authorize => "Authorize",
            Self::BootNotification => "BootNotification",
            Self::Heartbeat => "Heartbeat",
            Self::MeterValues => "MeterValues",
            Self::StartTransaction => "StartTransaction",
            Self::StatusNotification => "StatusNotification",
            Self::StopTransaction => "StopTransaction",
        }
    }

    pub fn from_name(action: &str) -> Option<Self> {
        Some(match action {
            "Authorize" => Self::Authorize,
            "BootNotification" => Self::BootNotification,
            "Heartbeat" => Self::Heartbeat,
            "MeterValues" => Self::MeterValues,
            "StartTransaction" => Self::StartTransaction,
            "StatusNotification" => Self::StatusNotification,
            "StopTransaction" => Self::StopTransaction,
            _ => return None,
        })
    }
}

impl std::fmt::Display for OcppAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated inbound request.
#[derive(Debug, Clone)]
pub enum CallRequest {
    Authorize(AuthorizeRequest),
    BootNotification(BootNotificationRequest),
    Heartbeat(HeartbeatRequest),
    MeterValues(MeterValuesRequest),
    StartTransaction(StartTransactionRequest),
    StatusNotification(StatusNotificationRequest),
    StopTransaction(StopTransactionRequest),
}

impl CallRequest {
    /// Decode the payload of `action`.
    ///
    /// Unknown actions yield `NotImplemented`, actions only a central
    /// system may send yield `NotSupported`, and payloads missing required
    /// fields or carrying wrong types yield `ProtocolError`.
    pub fn parse(action: &str, payload: Value) -> Result<Self, ProtocolError> {
        let Some(known) = OcppAction::from_name(action) else {
            return Err(if is_cs_to_cp_action(action) {
                ProtocolError::new(
                    ErrorCode::NotSupported,
                    format!("{} is sent by the central system, not to it", action),
                )
            } else {
                ProtocolError::new(
                    ErrorCode::NotImplemented,
                    format!("Unknown action: {}", action),
                )
            });
        };

        Ok(match known {
            OcppAction::Authorize => Self::Authorize(decode(action, payload)?),
            OcppAction::BootNotification => Self::BootNotification(decode(action, payload)?),
            OcppAction::Heartbeat => Self::Heartbeat(decode(action, payload)?),
            OcppAction::MeterValues => Self::MeterValues(decode(action, payload)?),
            OcppAction::StartTransaction => Self::StartTransaction(decode(action, payload)?),
            OcppAction::StatusNotification => Self::StatusNotification(decode(action, payload)?),
            OcppAction::StopTransaction => Self::StopTransaction(decode(action, payload)?),
        })
    }

    pub fn action(&self) -> OcppAction {
        match self {
            Self::Authorize(_) => OcppAction::Authorize,
            Self::BootNotification(_) => OcppAction::BootNotification,
            Self::Heartbeat(_) => OcppAction::Heartbeat,
            Self::MeterValues(_) => OcppAction::MeterValues,
            Self::StartTransaction(_) => OcppAction::StartTransaction,
            Self::StatusNotification(_) => OcppAction::StatusNotification,
            Self::StopTransaction(_) => OcppAction::StopTransaction,
        }
    }

    pub fn to_payload(&self) -> Result<Value, serde_json::Error> {
        match self {
            Self::Authorize(req) => serde_json::to_value(req),
            Self::BootNotification(req) => serde_json::to_value(req),
            Self::Heartbeat(req) => serde_json::to_value(req),
            Self::MeterValues(req) => serde_json::to_value(req),
            Self::StartTransaction(req) => serde_json::to_value(req),
            Self::StatusNotification(req) => serde_json::to_value(req),
            Self::StopTransaction(req) => serde_json::to_value(req),
        }
    }
}

fn decode<T: DeserializeOwned>(action: &str, payload: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(payload).map_err(|e| ProtocolError::invalid_payload(action, e))
}

/// A handler's successful answer.
#[derive(Debug, Clone)]
pub enum CallResponse {
    Authorize(AuthorizeResponse),
    BootNotification(BootNotificationResponse),
    Heartbeat(HeartbeatResponse),
    MeterValues(MeterValuesResponse),
    StartTransaction(StartTransactionResponse),
    StatusNotification(StatusNotificationResponse),
    StopTransaction(StopTransactionResponse),
}

impl CallResponse {
    pub fn to_payload(&self) -> Result<Value, serde_json::Error> {
        match self {
            Self::Authorize(res) => serde_json::to_value(res),
            Self::BootNotification(res) => serde_json::to_value(res),
            Self::Heartbeat(res) => serde_json::to_value(res),
            Self::MeterValues(res) => serde_json::to_value(res),
            Self::StartTransaction(res) => serde_json::to_value(res),
            Self::StatusNotification(res) => serde_json::to_value(res),
            Self::StopTransaction(res) => serde_json::to_value(res),
        }
    }
}

/// Routes a decoded request to its handler.
pub async fn v16_action_matcher(
    handler: &OcppHandlerV16,
    request: &CallRequest,
) -> Result<CallResponse, ProtocolError> {
    Ok(match request {
        CallRequest::Authorize(req) => CallResponse::Authorize(handle_authorize(handler, req).await?),
        CallRequest::BootNotification(req) => {
            CallResponse::BootNotification(handle_boot_notification(handler, req).await?)
        }
        CallRequest::Heartbeat(req) => CallResponse::Heartbeat(handle_heartbeat(handler, req).await?),
        CallRequest::MeterValues(req) => {
            CallResponse::MeterValues(handle_meter_values(handler, req).await?)
        }
        CallRequest::StartTransaction(req) => {
            CallResponse::StartTransaction(handle_start_transaction(handler, req).await?)
        }
        CallRequest::StatusNotification(req) => {
            CallResponse::StatusNotification(handle_status_notification(handler, req).await?)
        }
        CallRequest::StopTransaction(req) => {
            CallResponse::StopTransaction(handle_stop_transaction(handler, req).await?)
        }
    })
}

/// Check if the action is a CS→CP action (should never arrive from a CP).
pub fn is_cs_to_cp_action(action: &str) -> bool {
    matches!(
        action,
        "CancelReservation"
            | "ChangeAvailability"
            | "ChangeConfiguration"
            | "ClearCache"
            | "ClearChargingProfile"
            | "GetCompositeSchedule"
            | "GetConfiguration"
            | "GetDiagnostics"
            | "GetLocalListVersion"
            | "RemoteStartTransaction"
            | "RemoteStopTransaction"
            | "ReserveNow"
            | "Reset"
            | "SendLocalList"
            | "SetChargingProfile"
            | "TriggerMessage"
            | "UnlockConnector"
            | "UpdateFirmware"
    )
}

/// Every id tag is accepted; there is no authorization policy.
pub(crate) fn accepted_id_tag() -> IdTagInfo {
    IdTagInfo {
        status: AuthorizationStatus::Accepted,
        expiry_date: None,
        parent_id_tag: None,
    }
}
