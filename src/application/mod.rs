pub mod handlers;
pub mod plugins;
pub mod services;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types for convenience
pub use handlers::{OcppHandlerV16, ProtocolSettings};
pub use plugins::{ChargePointPlugin, PluginHook, PluginPipeline};
pub use services::{AutoStartSettings, ReconciliationReport};
pub use session::{ChargePointSession, SessionManager, SessionState, SharedSessionManager};
