pub mod errors;
pub mod ocpp_frame;
pub mod serializations;
pub mod shutdown;
