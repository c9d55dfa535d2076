//! Application services

pub mod auto_start;
pub mod heartbeat_watchdog;
pub mod orphan_reconciler;

pub use auto_start::{AutoStartScheduler, AutoStartSettings};
pub use heartbeat_watchdog::watch as watch_heartbeats;
pub use orphan_reconciler::{reconcile_connector, ReconciliationReport};
