//! OCPP message handlers

pub mod ocpp_v16;
mod ocpp_v16_handler;

pub use ocpp_v16_handler::{
    OcppHandlerV16, ProtocolSettings, DEFAULT_CALL_TIMEOUT, DEFAULT_HEARTBEAT_INTERVAL,
};
