//! Domain entities and repository contracts.

pub mod charge_point;
pub mod connector;
pub mod error_event;
pub mod meter_value;
pub mod repositories;
pub mod transaction;

pub use charge_point::{BootInfo, ChargePoint, ChargePointRepository, ConnectorStatus};
pub use connector::{Connector, ConnectorRepository, ConnectorStatusUpdate};
pub use error_event::{ErrorEvent, ErrorEventRepository, NewErrorEvent};
pub use meter_value::{
    MeterValue, MeterValueRepository, NewMeterValue, ENERGY_ACTIVE_IMPORT_REGISTER,
};
pub use repositories::RepositoryProvider;
pub use transaction::{
    NewTransaction, Transaction, TransactionClosure, TransactionRepository, TransactionStatus,
};

pub use crate::support::errors::{DomainError, DomainResult};
