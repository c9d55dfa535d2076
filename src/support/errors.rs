use thiserror::Error;

use crate::support::ocpp_frame::ErrorCode;

/// Repository-level failures.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Validation: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<sea_orm::DbErr> for DomainError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Storage(err.to_string())
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

/// A well-formed call the central system refuses to process.
///
/// Always answered with a CallError carrying `code`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{code}: {description}")]
pub struct ProtocolError {
    pub code: ErrorCode,
    pub description: String,
}

impl ProtocolError {
    pub fn new(code: ErrorCode, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }

    /// Missing or ill-typed parameters for the action.
    pub fn invalid_payload(action: &str, err: impl std::fmt::Display) -> Self {
        Self::new(
            ErrorCode::ProtocolError,
            format!("Invalid {} payload: {}", action, err),
        )
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }
}

impl From<DomainError> for ProtocolError {
    fn from(err: DomainError) -> Self {
        Self::internal(err)
    }
}

/// Failures of a call initiated by the central system.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("No response to {action} within {timeout_secs}s")]
    Timeout { action: String, timeout_secs: u64 },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Charge point rejected the call: {code} - {description}")]
    CallError { code: String, description: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// A plugin hook or lifecycle method failed.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("{0}")]
    Failed(String),

    #[error("panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Command(#[from] CommandError),
}

impl PluginError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

/// An orphaned transaction could not be found or closed.
/// `transaction_id` is `None` when the lookup itself failed.
#[derive(Debug, Error)]
#[error("Failed to reconcile transaction {transaction_id:?}: {source}")]
pub struct ReconciliationError {
    pub transaction_id: Option<i32>,
    #[source]
    pub source: DomainError,
}

#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("Charge point {0} already connected")]
    AlreadyConnected(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
