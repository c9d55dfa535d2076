//! Transaction aggregate

pub mod model;
pub mod repository;

pub use model::{NewTransaction, Transaction, TransactionClosure, TransactionStatus};
pub use repository::TransactionRepository;
