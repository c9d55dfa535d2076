//! Charge point sessions: per-connection state and the manager that owns them

mod connection;
mod manager;
mod pending;

pub use connection::{ChargePointSession, InboundCall, MeterReading, SessionState};
pub use manager::{
    SessionManager, SharedSessionManager, DUPLICATE_CONNECTION_REASON, SHUTDOWN_REASON,
};
pub use pending::{CallOutcome, PendingCalls};
