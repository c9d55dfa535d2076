//! Meter value samples (append-only)

pub mod model;
pub mod repository;

pub use model::{MeterValue, NewMeterValue, ENERGY_ACTIVE_IMPORT_REGISTER};
pub use repository::MeterValueRepository;
