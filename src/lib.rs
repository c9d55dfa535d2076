//! # OCPP Central System
//!
//! OCPP-J 1.6 central system: accepts charge point WebSocket connections,
//! answers their calls and records charge points, connectors, transactions,
//! meter values and error events.
//!
//! ## Architecture
//!
//! - **support**: wire envelope codec, error types, shutdown signal
//! - **domain**: entities and repository contracts
//! - **application**: sessions, handlers, plugins, reconciler and auto-start
//! - **infrastructure**: in-memory and SQLite repositories
//! - **interfaces**: the OCPP WebSocket server
//! - **server**: runtime wiring used by the binary

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod server;
pub mod support;

pub use config::{default_config_path, AppConfig};

pub use application::{ChargePointPlugin, PluginPipeline, SessionManager};
pub use infrastructure::{init_database, DatabaseConfig, InMemoryStorage, SeaOrmRepositoryProvider};
pub use interfaces::ws::OcppServer;
pub use server::ServerHandle;
