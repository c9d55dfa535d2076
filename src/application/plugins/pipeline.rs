//! Ordered plugin execution with fault isolation.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::{debug, error};

use super::{ChargePointPlugin, HookPhase, PluginContext, PluginHook, PluginResult};
use crate::application::handlers::ocpp_v16::OcppAction;
use crate::application::session::ChargePointSession;
use crate::support::errors::PluginError;

/// Registered plugins, run in registration order.
///
/// A failing or panicking plugin is logged and skipped; it never stops
/// the other plugins, the handler, or the session lifecycle.
#[derive(Default, Clone)]
pub struct PluginPipeline {
    plugins: Vec<Arc<dyn ChargePointPlugin>>,
}

impl PluginPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Arc<dyn ChargePointPlugin>) {
        debug!(plugin = plugin.name(), hooks = plugin.hooks().len(), "Registering plugin");
        self.plugins.push(plugin);
    }

    pub fn with(mut self, plugin: Arc<dyn ChargePointPlugin>) -> Self {
        self.register(plugin);
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub async fn initialize(&self, session: &Arc<ChargePointSession>) {
        for plugin in &self.plugins {
            let outcome = guarded(plugin.initialize(session)).await;
            report(plugin.as_ref(), "initialize", session.charge_point_id(), outcome);
        }
    }

    pub async fn cleanup(&self, session: &Arc<ChargePointSession>) {
        for plugin in &self.plugins {
            let outcome = guarded(plugin.cleanup(session)).await;
            report(plugin.as_ref(), "cleanup", session.charge_point_id(), outcome);
        }
    }

    /// Run `hook` on every plugin that declared it.
    pub async fn run(&self, hook: PluginHook, ctx: &PluginContext<'_>) {
        for plugin in &self.plugins {
            if !plugin.hooks().contains(&hook) {
                continue;
            }
            let outcome = guarded(dispatch(plugin.as_ref(), hook, ctx)).await;
            report(plugin.as_ref(), &hook.to_string(), ctx.charge_point_id(), outcome);
        }
    }
}

async fn dispatch(
    plugin: &dyn ChargePointPlugin,
    hook: PluginHook,
    ctx: &PluginContext<'_>,
) -> PluginResult {
    let phase: HookPhase = hook.phase();
    match hook.action() {
        OcppAction::BootNotification => plugin.on_boot_notification(phase, ctx).await,
        OcppAction::Heartbeat => plugin.on_heartbeat(phase, ctx).await,
        OcppAction::StatusNotification => plugin.on_status_notification(phase, ctx).await,
        OcppAction::StartTransaction => plugin.on_start_transaction(phase, ctx).await,
        OcppAction::StopTransaction => plugin.on_stop_transaction(phase, ctx).await,
        OcppAction::MeterValues => plugin.on_meter_values(phase, ctx).await,
        OcppAction::Authorize => plugin.on_authorize(phase, ctx).await,
    }
}

async fn guarded<F>(fut: F) -> PluginResult
where
    F: Future<Output = PluginResult>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => Err(PluginError::Panicked(panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn report(plugin: &dyn ChargePointPlugin, hook: &str, charge_point_id: &str, outcome: PluginResult) {
    if let Err(e) = outcome {
        error!(
            charge_point_id,
            plugin = plugin.name(),
            hook,
            error = %e,
            "Plugin fault"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use rust_ocpp::v1_6::messages::heart_beat::{HeartbeatRequest, HeartbeatResponse};
    use tokio::sync::mpsc;

    use super::*;
    use crate::application::handlers::ocpp_v16::{CallRequest, CallResponse};

    /// Records hook calls into a shared journal; optionally fails or panics.
    struct ScriptedPlugin {
        name: &'static str,
        hooks: Vec<PluginHook>,
        journal: Arc<Mutex<Vec<String>>>,
        fail: bool,
        panic: bool,
    }

    impl ScriptedPlugin {
        fn new(name: &'static str, journal: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name,
                hooks: vec![PluginHook::BeforeHeartbeat, PluginHook::AfterHeartbeat],
                journal: journal.clone(),
                fail: false,
                panic: false,
            }
        }
    }

    #[async_trait]
    impl ChargePointPlugin for ScriptedPlugin {
        fn name(&self) -> &str {
            self.name
        }

        fn hooks(&self) -> &[PluginHook] {
            &self.hooks
        }

        async fn initialize(&self, _session: &Arc<ChargePointSession>) -> PluginResult {
            if self.panic {
                panic!("init exploded");
            }
            self.journal.lock().unwrap().push(format!("{}:init", self.name));
            Ok(())
        }

        async fn on_heartbeat(&self, phase: HookPhase, ctx: &PluginContext<'_>) -> PluginResult {
            self.journal
                .lock()
                .unwrap()
                .push(format!("{}:{:?}:{}", self.name, phase, ctx.result.is_some()));
            if self.panic {
                panic!("hook exploded");
            }
            if self.fail {
                return Err(PluginError::failed("boom"));
            }
            Ok(())
        }
    }

    fn session() -> Arc<ChargePointSession> {
        let (tx, _rx) = mpsc::unbounded_channel();
        Arc::new(ChargePointSession::new("CP001", None, tx, Duration::from_secs(5)))
    }

    #[tokio::test]
    async fn hooks_run_in_registration_order_despite_faults() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let failing = ScriptedPlugin {
            fail: true,
            ..ScriptedPlugin::new("a", &journal)
        };
        let panicking = ScriptedPlugin {
            panic: true,
            ..ScriptedPlugin::new("b", &journal)
        };
        let pipeline = PluginPipeline::new()
            .with(Arc::new(failing))
            .with(Arc::new(panicking))
            .with(Arc::new(ScriptedPlugin::new("c", &journal)));

        let session = session();
        let request = CallRequest::Heartbeat(HeartbeatRequest {});
        let result: Result<CallResponse, _> = Ok(CallResponse::Heartbeat(HeartbeatResponse {
            current_time: chrono::Utc::now(),
        }));

        let before = PluginContext {
            session: &session,
            request: &request,
            result: None,
        };
        pipeline.run(PluginHook::BeforeHeartbeat, &before).await;

        let after = PluginContext {
            session: &session,
            request: &request,
            result: Some(&result),
        };
        pipeline.run(PluginHook::AfterHeartbeat, &after).await;

        assert_eq!(
            *journal.lock().unwrap(),
            vec![
                "a:Before:false",
                "b:Before:false",
                "c:Before:false",
                "a:After:true",
                "b:After:true",
                "c:After:true",
            ]
        );
    }

    #[tokio::test]
    async fn undeclared_hooks_are_skipped() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let only_after = ScriptedPlugin {
            hooks: vec![PluginHook::AfterHeartbeat],
            ..ScriptedPlugin::new("a", &journal)
        };
        let pipeline = PluginPipeline::new().with(Arc::new(only_after));

        let session = session();
        let request = CallRequest::Heartbeat(HeartbeatRequest {});
        let ctx = PluginContext {
            session: &session,
            request: &request,
            result: None,
        };
        pipeline.run(PluginHook::BeforeHeartbeat, &ctx).await;
        assert!(journal.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn lifecycle_faults_do_not_stop_other_plugins() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let pipeline = PluginPipeline::new()
            .with(Arc::new(ScriptedPlugin {
                panic: true,
                ..ScriptedPlugin::new("a", &journal)
            }))
            .with(Arc::new(ScriptedPlugin::new("b", &journal)));

        pipeline.initialize(&session()).await;
        assert_eq!(*journal.lock().unwrap(), vec!["b:init"]);
        assert_eq!(pipeline.names(), vec!["a", "b"]);
    }
}
