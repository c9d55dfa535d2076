//! Plugin contract
//!
//! A plugin observes inbound messages through BEFORE/AFTER hooks and
//! the connect/disconnect lifecycle. It declares the hooks it wants in
//! [`ChargePointPlugin::hooks`]; the pipeline only calls those, and
//! routes each hook to the method of its action family. Hooks cannot
//! change what goes on the wire.

pub mod audit;
pub mod metrics;
pub mod pipeline;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::application::handlers::ocpp_v16::{CallRequest, CallResponse, OcppAction};
use crate::application::session::ChargePointSession;
use crate::support::errors::{PluginError, ProtocolError};

pub use audit::AuditLogPlugin;
pub use metrics::MetricsPlugin;
pub use pipeline::PluginPipeline;

pub type PluginResult = Result<(), PluginError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    Before,
    After,
}

/// Every hook a plugin can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginHook {
    BeforeBootNotification,
    AfterBootNotification,
    BeforeHeartbeat,
    AfterHeartbeat,
    BeforeStatusNotification,
    AfterStatusNotification,
    BeforeStartTransaction,
    AfterStartTransaction,
    BeforeStopTransaction,
    AfterStopTransaction,
    BeforeMeterValues,
    AfterMeterValues,
    BeforeAuthorize,
    AfterAuthorize,
}

impl PluginHook {
    pub const ALL: [PluginHook; 14] = [
        Self::BeforeBootNotification,
        Self::AfterBootNotification,
        Self::BeforeHeartbeat,
        Self::AfterHeartbeat,
        Self::BeforeStatusNotification,
        Self::AfterStatusNotification,
        Self::BeforeStartTransaction,
        Self::AfterStartTransaction,
        Self::BeforeStopTransaction,
        Self::AfterStopTransaction,
        Self::BeforeMeterValues,
        Self::AfterMeterValues,
        Self::BeforeAuthorize,
        Self::AfterAuthorize,
    ];

    pub fn new(phase: HookPhase, action: OcppAction) -> Self {
        use HookPhase::{After, Before};
        match (phase, action) {
            (Before, OcppAction::BootNotification) => Self::BeforeBootNotification,
            (After, OcppAction::BootNotification) => Self::AfterBootNotification,
            (Before, OcppAction::Heartbeat) => Self::BeforeHeartbeat,
            (After, OcppAction::Heartbeat) => Self::AfterHeartbeat,
            (Before, OcppAction::StatusNotification) => Self::BeforeStatusNotification,
            (After, OcppAction::StatusNotification) => Self::AfterStatusNotification,
            (Before, OcppAction::StartTransaction) => Self::BeforeStartTransaction,
            (After, OcppAction::StartTransaction) => Self::AfterStartTransaction,
            (Before, OcppAction::StopTransaction) => Self::BeforeStopTransaction,
            (After, OcppAction::StopTransaction) => Self::AfterStopTransaction,
            (Before, OcppAction::MeterValues) => Self::BeforeMeterValues,
            (After, OcppAction::MeterValues) => Self::AfterMeterValues,
            (Before, OcppAction::Authorize) => Self::BeforeAuthorize,
            (After, OcppAction::Authorize) => Self::AfterAuthorize,
        }
    }

    pub fn phase(&self) -> HookPhase {
        match self {
            Self::BeforeBootNotification
            | Self::BeforeHeartbeat
            | Self::BeforeStatusNotification
            | Self::BeforeStartTransaction
            | Self::BeforeStopTransaction
            | Self::BeforeMeterValues
            | Self::BeforeAuthorize => HookPhase::Before,
            _ => HookPhase::After,
        }
    }

    pub fn action(&self) -> OcppAction {
        match self {
            Self::BeforeBootNotification | Self::AfterBootNotification => {
                OcppAction::BootNotification
            }
            Self::BeforeHeartbeat | Self::AfterHeartbeat => OcppAction::Heartbeat,
            Self::BeforeStatusNotification | Self::AfterStatusNotification => {
                OcppAction::StatusNotification
            }
            Self::BeforeStartTransaction | Self::AfterStartTransaction => {
                OcppAction::StartTransaction
            }
            Self::BeforeStopTransaction | Self::AfterStopTransaction => {
                OcppAction::StopTransaction
            }
            Self::BeforeMeterValues | Self::AfterMeterValues => OcppAction::MeterValues,
            Self::BeforeAuthorize | Self::AfterAuthorize => OcppAction::Authorize,
        }
    }
}

impl fmt::Display for PluginHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self.phase() {
            HookPhase::Before => "before",
            HookPhase::After => "after",
        };
        write!(f, "{}_{}", phase, self.action())
    }
}

/// What a hook gets to see.
pub struct PluginContext<'a> {
    pub session: &'a Arc<ChargePointSession>,
    pub request: &'a CallRequest,
    /// `None` in BEFORE hooks; the handler outcome in AFTER hooks.
    pub result: Option<&'a Result<CallResponse, ProtocolError>>,
}

impl PluginContext<'_> {
    pub fn charge_point_id(&self) -> &str {
        self.session.charge_point_id()
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.result, Some(Ok(_)))
    }
}

/// Extension point around the handler path. Every method has a no-op
/// default; implement the families you declared in `hooks()`.
#[async_trait]
pub trait ChargePointPlugin: Send + Sync {
    fn name(&self) -> &str;

    fn hooks(&self) -> &[PluginHook];

    async fn initialize(&self, _session: &Arc<ChargePointSession>) -> PluginResult {
        Ok(())
    }

    async fn cleanup(&self, _session: &Arc<ChargePointSession>) -> PluginResult {
        Ok(())
    }

    async fn on_boot_notification(&self, _phase: HookPhase, _ctx: &PluginContext<'_>) -> PluginResult {
        Ok(())
    }

    async fn on_heartbeat(&self, _phase: HookPhase, _ctx: &PluginContext<'_>) -> PluginResult {
        Ok(())
    }

    async fn on_status_notification(&self, _phase: HookPhase, _ctx: &PluginContext<'_>) -> PluginResult {
        Ok(())
    }

    async fn on_start_transaction(&self, _phase: HookPhase, _ctx: &PluginContext<'_>) -> PluginResult {
        Ok(())
    }

    async fn on_stop_transaction(&self, _phase: HookPhase, _ctx: &PluginContext<'_>) -> PluginResult {
        Ok(())
    }

    async fn on_meter_values(&self, _phase: HookPhase, _ctx: &PluginContext<'_>) -> PluginResult {
        Ok(())
    }

    async fn on_authorize(&self, _phase: HookPhase, _ctx: &PluginContext<'_>) -> PluginResult {
        Ok(())
    }
}
