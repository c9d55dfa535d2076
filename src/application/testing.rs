//! Test fixtures: an in-memory repository provider, a session wired to an
//! in-memory outbound channel and a recording plugin.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::application::handlers::{OcppHandlerV16, ProtocolSettings};
use crate::application::plugins::{
    ChargePointPlugin, HookPhase, PluginContext, PluginHook, PluginPipeline, PluginResult,
};
use crate::application::session::{ChargePointSession, InboundCall};
use crate::domain::{
    ChargePointRepository, Connector, ConnectorRepository, ConnectorStatusUpdate, DomainError,
    DomainResult, ErrorEvent, ErrorEventRepository, MeterValueRepository, NewErrorEvent,
    RepositoryProvider, TransactionRepository,
};
use crate::infrastructure::storage::InMemoryStorage;
use crate::support::errors::PluginError;
use crate::support::ocpp_frame::OcppFrame;

pub(crate) const TEST_CHARGE_POINT: &str = "CP001";

/// One active session for `CP001` with its handler, no sockets involved.
pub(crate) struct Harness {
    pub storage: Arc<InMemoryStorage>,
    pub session: Arc<ChargePointSession>,
    pub outbox: mpsc::UnboundedReceiver<String>,
    pub handler: OcppHandlerV16,
    next_id: u64,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(ProtocolSettings::default(), PluginPipeline::default())
    }

    pub fn with_settings(settings: ProtocolSettings) -> Self {
        Self::build(settings, PluginPipeline::default())
    }

    pub fn with_plugins(plugins: PluginPipeline) -> Self {
        Self::build(ProtocolSettings::default(), plugins)
    }

    /// Handler backed by [`FlakyStorage`]; flip its switches to make
    /// repositories fail mid-test.
    pub fn flaky(settings: ProtocolSettings) -> (Self, Arc<FlakyStorage>) {
        let storage = Arc::new(InMemoryStorage::new());
        let flaky = Arc::new(FlakyStorage::new(storage.clone()));
        let harness = Self::assemble(storage, flaky.clone(), settings, PluginPipeline::default());
        (harness, flaky)
    }

    fn build(settings: ProtocolSettings, plugins: PluginPipeline) -> Self {
        let storage = Arc::new(InMemoryStorage::new());
        Self::assemble(storage.clone(), storage, settings, plugins)
    }

    fn assemble(
        storage: Arc<InMemoryStorage>,
        repos: Arc<dyn RepositoryProvider>,
        settings: ProtocolSettings,
        plugins: PluginPipeline,
    ) -> Self {
        let (sender, outbox) = mpsc::unbounded_channel();
        let session = Arc::new(ChargePointSession::new(
            TEST_CHARGE_POINT,
            None,
            sender,
            settings.call_timeout,
        ));
        session.activate();

        let handler = OcppHandlerV16::new(
            session.clone(),
            repos,
            Arc::new(plugins),
            Arc::new(settings),
        );

        Self {
            storage,
            session,
            outbox,
            handler,
            next_id: 0,
        }
    }

    /// Run one Call through the handler and return the queued reply.
    pub async fn call(&mut self, action: &str, payload: Value) -> OcppFrame {
        self.next_id += 1;
        self.handler
            .process_call(InboundCall {
                unique_id: format!("call-{}", self.next_id),
                action: action.to_string(),
                payload,
            })
            .await;

        let text = self.outbox.try_recv().expect("handler queued no reply");
        OcppFrame::parse(&text).expect("reply is a valid frame")
    }

    /// StartTransaction on `connector_id`; returns the assigned id.
    pub async fn start_transaction(&mut self, connector_id: u32, meter_start: i32) -> i32 {
        let reply = self
            .call(
                "StartTransaction",
                json!({
                    "connectorId": connector_id,
                    "idTag": "TAG1",
                    "meterStart": meter_start,
                    "timestamp": "2024-05-01T10:00:00Z"
                }),
            )
            .await;
        match reply {
            OcppFrame::CallResult { payload, .. } => payload["transactionId"]
                .as_i64()
                .expect("transactionId in response") as i32,
            other => panic!("StartTransaction failed: {:?}", other),
        }
    }
}

/// Delegates to an [`InMemoryStorage`] until told to fail connector or
/// error-event access.
pub(crate) struct FlakyStorage {
    inner: Arc<InMemoryStorage>,
    connectors_down: AtomicBool,
    error_events_down: AtomicBool,
}

impl FlakyStorage {
    pub fn new(inner: Arc<InMemoryStorage>) -> Self {
        Self {
            inner,
            connectors_down: AtomicBool::new(false),
            error_events_down: AtomicBool::new(false),
        }
    }

    pub fn fail_connectors(&self, down: bool) {
        self.connectors_down.store(down, Ordering::SeqCst);
    }

    pub fn fail_error_events(&self, down: bool) {
        self.error_events_down.store(down, Ordering::SeqCst);
    }
}

fn offline() -> DomainError {
    DomainError::Storage("storage offline".to_string())
}

/// Every operation fails.
struct Offline;

#[async_trait]
impl ConnectorRepository for Offline {
    async fn find(&self, _: &str, _: u32) -> DomainResult<Option<Connector>> {
        Err(offline())
    }

    async fn get_or_create(&self, _: &str, _: u32) -> DomainResult<Connector> {
        Err(offline())
    }

    async fn update_status(&self, _: &str, _: u32, _: ConnectorStatusUpdate) -> DomainResult<Connector> {
        Err(offline())
    }

    async fn find_by_charge_point(&self, _: &str) -> DomainResult<Vec<Connector>> {
        Err(offline())
    }
}

#[async_trait]
impl ErrorEventRepository for Offline {
    async fn record(&self, _: NewErrorEvent) -> DomainResult<ErrorEvent> {
        Err(offline())
    }

    async fn find_open(&self, _: &str, _: Option<u32>) -> DomainResult<Vec<ErrorEvent>> {
        Err(offline())
    }

    async fn resolve_open(&self, _: &str, _: Option<u32>, _: DateTime<Utc>) -> DomainResult<u64> {
        Err(offline())
    }
}

impl RepositoryProvider for FlakyStorage {
    fn charge_points(&self) -> &dyn ChargePointRepository {
        self.inner.charge_points()
    }

    fn connectors(&self) -> &dyn ConnectorRepository {
        if self.connectors_down.load(Ordering::SeqCst) {
            &Offline
        } else {
            self.inner.connectors()
        }
    }

    fn transactions(&self) -> &dyn TransactionRepository {
        self.inner.transactions()
    }

    fn meter_values(&self) -> &dyn MeterValueRepository {
        self.inner.meter_values()
    }

    fn error_events(&self) -> &dyn ErrorEventRepository {
        if self.error_events_down.load(Ordering::SeqCst) {
            &Offline
        } else {
            self.inner.error_events()
        }
    }
}

/// Journals every hook and lifecycle call it receives.
pub(crate) struct RecordingPlugin {
    hooks: Vec<PluginHook>,
    fail: bool,
    events: Mutex<Vec<String>>,
    lifecycle: Mutex<Vec<String>>,
}

impl RecordingPlugin {
    pub fn new(hooks: Vec<PluginHook>) -> Self {
        Self {
            hooks,
            fail: false,
            events: Mutex::new(Vec::new()),
            lifecycle: Mutex::new(Vec::new()),
        }
    }

    /// Every hook and lifecycle call returns an error after recording.
    pub fn failing(hooks: Vec<PluginHook>) -> Self {
        Self {
            fail: true,
            ..Self::new(hooks)
        }
    }

    /// `"<hook>:<pending|ok|error>"` in call order.
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// `"initialize:<id>"` / `"cleanup:<id>"` in call order.
    pub fn lifecycle(&self) -> Vec<String> {
        self.lifecycle.lock().unwrap().clone()
    }

    fn note(&self, phase: HookPhase, ctx: &PluginContext<'_>) -> PluginResult {
        let outcome = match ctx.result {
            None => "pending",
            Some(Ok(_)) => "ok",
            Some(Err(_)) => "error",
        };
        let hook = PluginHook::new(phase, ctx.request.action());
        self.events
            .lock()
            .unwrap()
            .push(format!("{}:{}", hook, outcome));
        self.outcome()
    }

    fn outcome(&self) -> PluginResult {
        if self.fail {
            Err(PluginError::failed("recording plugin told to fail"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ChargePointPlugin for RecordingPlugin {
    fn name(&self) -> &str {
        "recording"
    }

    fn hooks(&self) -> &[PluginHook] {
        &self.hooks
    }

    async fn initialize(&self, session: &Arc<ChargePointSession>) -> PluginResult {
        self.lifecycle
            .lock()
            .unwrap()
            .push(format!("initialize:{}", session.charge_point_id()));
        self.outcome()
    }

    async fn cleanup(&self, session: &Arc<ChargePointSession>) -> PluginResult {
        self.lifecycle
            .lock()
            .unwrap()
            .push(format!("cleanup:{}", session.charge_point_id()));
        self.outcome()
    }

    async fn on_boot_notification(&self, phase: HookPhase, ctx: &PluginContext<'_>) -> PluginResult {
        self.note(phase, ctx)
    }

    async fn on_heartbeat(&self, phase: HookPhase, ctx: &PluginContext<'_>) -> PluginResult {
        self.note(phase, ctx)
    }

    async fn on_status_notification(&self, phase: HookPhase, ctx: &PluginContext<'_>) -> PluginResult {
        self.note(phase, ctx)
    }

    async fn on_start_transaction(&self, phase: HookPhase, ctx: &PluginContext<'_>) -> PluginResult {
        self.note(phase, ctx)
    }

    async fn on_stop_transaction(&self, phase: HookPhase, ctx: &PluginContext<'_>) -> PluginResult {
        self.note(phase, ctx)
    }

    async fn on_meter_values(&self, phase: HookPhase, ctx: &PluginContext<'_>) -> PluginResult {
        self.note(phase, ctx)
    }

    async fn on_authorize(&self, phase: HookPhase, ctx: &PluginContext<'_>) -> PluginResult {
        self.note(phase, ctx)
    }
}
