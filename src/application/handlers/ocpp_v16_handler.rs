//! OCPP 1.6 message handler
//!
//! Runs one session's inbound Calls strictly in arrival order: decode,
//! before-hooks, handler, response, after-hooks. The next Call is not
//! looked at until the previous response has been queued.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::application::handlers::ocpp_v16::{v16_action_matcher, CallRequest};
use crate::application::plugins::{HookPhase, PluginContext, PluginHook, PluginPipeline};
use crate::application::services::auto_start::AutoStartSettings;
use crate::application::session::{ChargePointSession, InboundCall};
use crate::domain::RepositoryProvider;
use crate::support::ocpp_frame::{ErrorCode, OcppFrame};

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Protocol knobs shared by every session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolSettings {
    /// Returned in BootNotification and used by the heartbeat watchdog.
    pub heartbeat_interval: Duration,
    pub call_timeout: Duration,
    pub auto_start: AutoStartSettings,
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            auto_start: AutoStartSettings::default(),
        }
    }
}

/// Handler for OCPP 1.6 messages of one charge point
pub struct OcppHandlerV16 {
    pub session: Arc<ChargePointSession>,
    pub repos: Arc<dyn RepositoryProvider>,
    pub plugins: Arc<PluginPipeline>,
    pub settings: Arc<ProtocolSettings>,
}

impl OcppHandlerV16 {
    pub fn new(
        session: Arc<ChargePointSession>,
        repos: Arc<dyn RepositoryProvider>,
        plugins: Arc<PluginPipeline>,
        settings: Arc<ProtocolSettings>,
    ) -> Self {
        Self {
            session,
            repos,
            plugins,
            settings,
        }
    }

    pub fn charge_point_id(&self) -> &str {
        self.session.charge_point_id()
    }

    /// Dispatch loop: consumes Calls until the reader drops its sender or
    /// the session stops being active.
    pub async fn run(self, mut calls: mpsc::UnboundedReceiver<InboundCall>) {
        while let Some(call) = calls.recv().await {
            if !self.session.is_active() {
                debug!(
                    charge_point_id = self.charge_point_id(),
                    action = call.action.as_str(),
                    "Session no longer active, dropping queued call"
                );
                break;
            }
            self.process_call(call).await;
        }
        debug!(charge_point_id = self.charge_point_id(), "Dispatch loop finished");
    }

    /// Handle one Call end to end. A CallResult or CallError is always
    /// queued for a Call that decoded.
    pub async fn process_call(&self, call: InboundCall) {
        let InboundCall {
            unique_id,
            action,
            payload,
        } = call;

        info!(
            charge_point_id = self.charge_point_id(),
            action = action.as_str(),
            unique_id = unique_id.as_str(),
            "Received Call"
        );

        let request = match CallRequest::parse(&action, payload) {
            Ok(request) => request,
            Err(fault) => {
                warn!(
                    charge_point_id = self.charge_point_id(),
                    action = action.as_str(),
                    code = fault.code.as_str(),
                    description = fault.description.as_str(),
                    "Rejecting Call"
                );
                self.reply(OcppFrame::error_response(
                    unique_id,
                    fault.code,
                    fault.description,
                ));
                return;
            }
        };

        let known = request.action();
        let ctx = PluginContext {
            session: &self.session,
            request: &request,
            result: None,
        };
        self.plugins
            .run(PluginHook::new(HookPhase::Before, known), &ctx)
            .await;

        let result = v16_action_matcher(self, &request).await;

        let frame = match &result {
            Ok(response) => match response.to_payload() {
                Ok(payload) => OcppFrame::CallResult {
                    unique_id,
                    payload,
                },
                Err(e) => {
                    error!(
                        charge_point_id = self.charge_point_id(),
                        action = known.as_str(),
                        error = %e,
                        "Failed to serialize response"
                    );
                    OcppFrame::error_response(unique_id, ErrorCode::InternalError, e.to_string())
                }
            },
            Err(fault) => {
                error!(
                    charge_point_id = self.charge_point_id(),
                    action = known.as_str(),
                    code = fault.code.as_str(),
                    description = fault.description.as_str(),
                    "Handler failed"
                );
                OcppFrame::error_response(unique_id, fault.code, fault.description.clone())
            }
        };
        self.reply(frame);

        let ctx = PluginContext {
            result: Some(&result),
            ..ctx
        };
        self.plugins
            .run(PluginHook::new(HookPhase::After, known), &ctx)
            .await;
    }

    fn reply(&self, frame: OcppFrame) {
        if self.session.send_frame(frame).is_err() {
            debug!(
                charge_point_id = self.charge_point_id(),
                "Connection gone, response dropped"
            );
        }
    }
}
