//! Database entities module

pub mod charge_point;
pub mod connector;
pub mod error_event;
pub mod meter_value;
pub mod transaction;

pub use charge_point::Entity as ChargePoint;
pub use connector::Entity as Connector;
pub use error_event::Entity as ErrorEvent;
pub use meter_value::Entity as MeterValue;
pub use transaction::Entity as Transaction;
