//! Fault reports from StatusNotification

pub mod model;
pub mod repository;

pub use model::{ErrorEvent, NewErrorEvent};
pub use repository::ErrorEventRepository;
