//! Audit trail as structured `tracing` events on target `audit`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{ChargePointPlugin, HookPhase, PluginContext, PluginHook, PluginResult};
use crate::application::session::ChargePointSession;
use crate::support::errors::PluginError;

const AFTER_HOOKS: [PluginHook; 7] = [
    PluginHook::AfterBootNotification,
    PluginHook::AfterHeartbeat,
    PluginHook::AfterStatusNotification,
    PluginHook::AfterStartTransaction,
    PluginHook::AfterStopTransaction,
    PluginHook::AfterMeterValues,
    PluginHook::AfterAuthorize,
];

/// One audit record per handled message and per connect/disconnect.
#[derive(Debug, Default)]
pub struct AuditLogPlugin;

impl AuditLogPlugin {
    pub fn new() -> Self {
        Self
    }

    fn record(&self, phase: HookPhase, ctx: &PluginContext<'_>) -> PluginResult {
        if phase != HookPhase::After {
            return Ok(());
        }

        let request = ctx
            .request
            .to_payload()
            .map_err(|e| PluginError::failed(format!("request not serializable: {}", e)))?;
        let (outcome, response) = match ctx.result {
            Some(Ok(response)) => (
                "ok",
                response
                    .to_payload()
                    .map_err(|e| PluginError::failed(format!("response not serializable: {}", e)))?
                    .to_string(),
            ),
            Some(Err(fault)) => ("error", fault.to_string()),
            None => ("unknown", String::new()),
        };

        info!(
            target: "audit",
            event = "message",
            charge_point_id = ctx.charge_point_id(),
            remote_addr = ?ctx.session.remote_addr(),
            action = ctx.request.action().as_str(),
            outcome,
            request = %request,
            response = response.as_str(),
        );
        Ok(())
    }
}

#[async_trait]
impl ChargePointPlugin for AuditLogPlugin {
    fn name(&self) -> &str {
        "audit"
    }

    fn hooks(&self) -> &[PluginHook] {
        &AFTER_HOOKS
    }

    async fn initialize(&self, session: &Arc<ChargePointSession>) -> PluginResult {
        info!(
            target: "audit",
            event = "connected",
            charge_point_id = session.charge_point_id(),
            connection_id = %session.connection_id(),
            remote_addr = ?session.remote_addr(),
        );
        Ok(())
    }

    async fn cleanup(&self, session: &Arc<ChargePointSession>) -> PluginResult {
        info!(
            target: "audit",
            event = "disconnected",
            charge_point_id = session.charge_point_id(),
            connection_id = %session.connection_id(),
            reason = session.close_reason().unwrap_or(""),
        );
        Ok(())
    }

    async fn on_boot_notification(&self, phase: HookPhase, ctx: &PluginContext<'_>) -> PluginResult {
        self.record(phase, ctx)
    }

    async fn on_heartbeat(&self, phase: HookPhase, ctx: &PluginContext<'_>) -> PluginResult {
        self.record(phase, ctx)
    }

    async fn on_status_notification(&self, phase: HookPhase, ctx: &PluginContext<'_>) -> PluginResult {
        self.record(phase, ctx)
    }

    async fn on_start_transaction(&self, phase: HookPhase, ctx: &PluginContext<'_>) -> PluginResult {
        self.record(phase, ctx)
    }

    async fn on_stop_transaction(&self, phase: HookPhase, ctx: &PluginContext<'_>) -> PluginResult {
        self.record(phase, ctx)
    }

    async fn on_meter_values(&self, phase: HookPhase, ctx: &PluginContext<'_>) -> PluginResult {
        self.record(phase, ctx)
    }

    async fn on_authorize(&self, phase: HookPhase, ctx: &PluginContext<'_>) -> PluginResult {
        self.record(phase, ctx)
    }
}
