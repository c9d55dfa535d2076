//! Non-persistent repository implementation

mod memory;

pub use memory::InMemoryStorage;
