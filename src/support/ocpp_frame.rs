//! OCPP-J message framing
//!
//! The JSON-over-WebSocket envelope used by OCPP 1.6J:
//!
//! - **Call**       `[2, "<uniqueId>", "<action>", {<payload>}]`
//! - **CallResult** `[3, "<uniqueId>", {<payload>}]`
//! - **CallError**  `[4, "<uniqueId>", "<errorCode>", "<errorDescription>", {<errorDetails>}]`
//!
//! The codec only validates the outer shape. Action payloads are checked
//! by the handler registry, which reports `ProtocolError` on its own.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};
use thiserror::Error;

// ── Message-type constants ─────────────────────────────────────

pub const MSG_TYPE_CALL: u64 = 2;
pub const MSG_TYPE_CALL_RESULT: u64 = 3;
pub const MSG_TYPE_CALL_ERROR: u64 = 4;

// ── ErrorCode ──────────────────────────────────────────────────

/// OCPP-J CallError codes (OCPP 1.6J section 4.2.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotImplemented,
    NotSupported,
    InternalError,
    ProtocolError,
    SecurityError,
    FormationViolation,
    PropertyConstraintViolation,
    OccurenceConstraintViolation,
    TypeConstraintViolation,
    GenericError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotImplemented => "NotImplemented",
            Self::NotSupported => "NotSupported",
            Self::InternalError => "InternalError",
            Self::ProtocolError => "ProtocolError",
            Self::SecurityError => "SecurityError",
            Self::FormationViolation => "FormationViolation",
            Self::PropertyConstraintViolation => "PropertyConstraintViolation",
            Self::OccurenceConstraintViolation => "OccurenceConstraintViolation",
            Self::TypeConstraintViolation => "TypeConstraintViolation",
            Self::GenericError => "GenericError",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorCode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "NotImplemented" => Self::NotImplemented,
            "NotSupported" => Self::NotSupported,
            "InternalError" => Self::InternalError,
            "ProtocolError" => Self::ProtocolError,
            "SecurityError" => Self::SecurityError,
            "FormationViolation" => Self::FormationViolation,
            "PropertyConstraintViolation" => Self::PropertyConstraintViolation,
            "OccurenceConstraintViolation" => Self::OccurenceConstraintViolation,
            "TypeConstraintViolation" => Self::TypeConstraintViolation,
            "GenericError" => Self::GenericError,
            _ => return Err(()),
        })
    }
}

// ── OcppFrame ──────────────────────────────────────────────────

/// A parsed OCPP-J frame.
#[derive(Debug, Clone, PartialEq)]
pub enum OcppFrame {
    /// `[2, uniqueId, action, payload]`
    Call {
        unique_id: String,
        action: String,
        payload: Value,
    },
    /// `[3, uniqueId, payload]`
    CallResult { unique_id: String, payload: Value },
    /// `[4, uniqueId, errorCode, errorDescription, errorDetails]`
    CallError {
        unique_id: String,
        error_code: String,
        error_description: String,
        error_details: Value,
    },
}

impl OcppFrame {
    // ── Parsing ────────────────────────────────────────────

    /// Parse raw websocket text into an `OcppFrame`.
    ///
    /// On failure the error keeps whatever could be recovered (unique id,
    /// message type) so the caller can still answer with a CallError.
    pub fn parse(text: &str) -> Result<Self, OcppFrameError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| OcppFrameError::new(FrameFault::InvalidJson(e.to_string())))?;

        let arr = match value {
            Value::Array(arr) => arr,
            _ => return Err(OcppFrameError::new(FrameFault::NotAnArray)),
        };

        if arr.is_empty() {
            return Err(OcppFrameError::new(FrameFault::EmptyArray));
        }

        let unique_id = arr.get(1).and_then(Value::as_str).map(str::to_string);
        let msg_type = arr[0].as_u64();

        let fail = |fault| OcppFrameError {
            unique_id: unique_id.clone(),
            message_type: msg_type,
            fault,
        };

        let msg_type = msg_type.ok_or_else(|| fail(FrameFault::InvalidMessageType))?;

        match msg_type {
            MSG_TYPE_CALL => Self::parse_call(arr).map_err(fail),
            MSG_TYPE_CALL_RESULT => Self::parse_call_result(arr).map_err(fail),
            MSG_TYPE_CALL_ERROR => Self::parse_call_error(arr).map_err(fail),
            other => Err(fail(FrameFault::UnknownMessageType(other))),
        }
    }

    fn parse_call(arr: Vec<Value>) -> Result<Self, FrameFault> {
        let [_, unique_id, action, payload] = exact::<4>(arr)?;

        Ok(Self::Call {
            unique_id: string_field(unique_id, "uniqueId must be a string")?,
            action: string_field(action, "action must be a string")?,
            payload: object_field(payload, "payload must be an object")?,
        })
    }

    fn parse_call_result(arr: Vec<Value>) -> Result<Self, FrameFault> {
        let [_, unique_id, payload] = exact::<3>(arr)?;

        Ok(Self::CallResult {
            unique_id: string_field(unique_id, "uniqueId must be a string")?,
            payload: object_field(payload, "payload must be an object")?,
        })
    }

    fn parse_call_error(mut arr: Vec<Value>) -> Result<Self, FrameFault> {
        // errorDetails is frequently omitted by charge point firmware.
        if arr.len() == 4 {
            arr.push(Value::Object(Map::new()));
        }
        let [_, unique_id, error_code, error_description, error_details] = exact::<5>(arr)?;

        Ok(Self::CallError {
            unique_id: string_field(unique_id, "uniqueId must be a string")?,
            error_code: string_field(error_code, "errorCode must be a string")?,
            error_description: string_field(
                error_description,
                "errorDescription must be a string",
            )?,
            error_details: object_field(error_details, "errorDetails must be an object")?,
        })
    }

    // ── Serialization ──────────────────────────────────────

    /// Serialize this frame to its wire text.
    pub fn serialize(&self) -> String {
        let arr = match self {
            Self::Call {
                unique_id,
                action,
                payload,
            } => vec![
                Value::from(MSG_TYPE_CALL),
                Value::from(unique_id.as_str()),
                Value::from(action.as_str()),
                payload.clone(),
            ],
            Self::CallResult { unique_id, payload } => vec![
                Value::from(MSG_TYPE_CALL_RESULT),
                Value::from(unique_id.as_str()),
                payload.clone(),
            ],
            Self::CallError {
                unique_id,
                error_code,
                error_description,
                error_details,
            } => vec![
                Value::from(MSG_TYPE_CALL_ERROR),
                Value::from(unique_id.as_str()),
                Value::from(error_code.as_str()),
                Value::from(error_description.as_str()),
                error_details.clone(),
            ],
        };

        Value::Array(arr).to_string()
    }

    // ── Helpers ────────────────────────────────────────────

    pub fn unique_id(&self) -> &str {
        match self {
            Self::Call { unique_id, .. }
            | Self::CallResult { unique_id, .. }
            | Self::CallError { unique_id, .. } => unique_id,
        }
    }

    /// Build a `CallError` answering the call `unique_id`.
    pub fn error_response(
        unique_id: impl Into<String>,
        error_code: ErrorCode,
        error_description: impl Into<String>,
    ) -> Self {
        Self::CallError {
            unique_id: unique_id.into(),
            error_code: error_code.as_str().to_string(),
            error_description: error_description.into(),
            error_details: Value::Object(Map::new()),
        }
    }

    pub fn is_call(&self) -> bool {
        matches!(self, Self::Call { .. })
    }

    pub fn is_response(&self) -> bool {
        !self.is_call()
    }
}

fn exact<const N: usize>(arr: Vec<Value>) -> Result<[Value; N], FrameFault> {
    let got = arr.len();
    arr.try_into()
        .map_err(|_| FrameFault::WrongLength { expected: N, got })
}

fn string_field(value: Value, what: &'static str) -> Result<String, FrameFault> {
    match value {
        Value::String(s) => Ok(s),
        _ => Err(FrameFault::FieldTypeMismatch(what)),
    }
}

fn object_field(value: Value, what: &'static str) -> Result<Value, FrameFault> {
    if value.is_object() {
        Ok(value)
    } else {
        Err(FrameFault::FieldTypeMismatch(what))
    }
}

// ── Errors ─────────────────────────────────────────────────────

/// An inbound frame that could not be decoded (MalformedEnvelope).
#[derive(Debug, Error)]
#[error("malformed envelope: {fault}")]
pub struct OcppFrameError {
    /// The correlation id, when the second element was a string.
    pub unique_id: Option<String>,
    /// The message-type discriminator, when the first element was a number.
    pub message_type: Option<u64>,
    pub fault: FrameFault,
}

impl OcppFrameError {
    fn new(fault: FrameFault) -> Self {
        Self {
            unique_id: None,
            message_type: None,
            fault,
        }
    }

    /// The CallError to send back, if any.
    ///
    /// Malformed responses (type 3/4) are never answered: the peer does not
    /// expect a reply to a reply.
    pub fn reply(&self) -> Option<OcppFrame> {
        if matches!(
            self.message_type,
            Some(MSG_TYPE_CALL_RESULT) | Some(MSG_TYPE_CALL_ERROR)
        ) {
            return None;
        }
        let unique_id = self.unique_id.as_deref()?;
        Some(OcppFrame::error_response(
            unique_id,
            ErrorCode::FormationViolation,
            self.fault.to_string(),
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameFault {
    InvalidJson(String),
    NotAnArray,
    EmptyArray,
    InvalidMessageType,
    UnknownMessageType(u64),
    WrongLength { expected: usize, got: usize },
    FieldTypeMismatch(&'static str),
}

impl fmt::Display for FrameFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidJson(msg) => write!(f, "Invalid JSON: {}", msg),
            Self::NotAnArray => write!(f, "OCPP message is not an array"),
            Self::EmptyArray => write!(f, "Empty OCPP message array"),
            Self::InvalidMessageType => write!(f, "Message type is not a number"),
            Self::UnknownMessageType(t) => write!(f, "Unknown message type: {}", t),
            Self::WrongLength { expected, got } => {
                write!(f, "Expected {} fields, got {}", expected, got)
            }
            Self::FieldTypeMismatch(msg) => write!(f, "Field type mismatch: {}", msg),
        }
    }
}
