//! WebSocket interface for charge points (OCPP-J 1.6).

pub mod ocpp_server;

pub use ocpp_server::OcppServer;
