//! Charge Point aggregate

pub mod model;
pub mod repository;

pub use model::{BootInfo, ChargePoint, ConnectorStatus};
pub use repository::ChargePointRepository;
