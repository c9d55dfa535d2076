//! Connector aggregate

pub mod model;
pub mod repository;

pub use model::{Connector, ConnectorStatusUpdate};
pub use repository::ConnectorRepository;
