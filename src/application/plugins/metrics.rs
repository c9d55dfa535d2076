//! Prometheus metrics recorded from plugin hooks.
//!
//! Uses the global `metrics` recorder; without one installed every call
//! is a no-op.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use super::{ChargePointPlugin, HookPhase, PluginContext, PluginHook, PluginResult};
use crate::application::handlers::ocpp_v16::{CallRequest, CallResponse};
use crate::application::session::ChargePointSession;
use crate::domain::ConnectorStatus;

/// Numeric value exported for a connector status.
fn status_code(status: ConnectorStatus) -> f64 {
    match status {
        ConnectorStatus::Available => 0.0,
        ConnectorStatus::Preparing => 1.0,
        ConnectorStatus::Charging => 2.0,
        ConnectorStatus::SuspendedEV => 3.0,
        ConnectorStatus::SuspendedEVSE => 4.0,
        ConnectorStatus::Finishing => 5.0,
        ConnectorStatus::Reserved => 6.0,
        ConnectorStatus::Unavailable => 7.0,
        ConnectorStatus::Faulted => 8.0,
    }
}

fn set_connector_active(charge_point_id: &str, connector_id: u32, active: bool) {
    metrics::gauge!(
        "ocpp_tx_active",
        "charge_point_id" => charge_point_id.to_string(),
        "connector_id" => connector_id.to_string()
    )
    .set(if active { 1.0 } else { 0.0 });
}

#[derive(Default)]
pub struct MetricsPlugin {
    /// Handling start per charge point; inbound calls are sequential per
    /// session so one slot is enough.
    started: DashMap<String, Instant>,
    /// Transactions this process saw start and not yet stop, keyed by id.
    active: DashMap<i32, (String, u32)>,
}

impl MetricsPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    fn publish_active(&self) {
        metrics::gauge!("ocpp_transactions_active").set(self.active.len() as f64);
    }

    fn observe(&self, phase: HookPhase, ctx: &PluginContext<'_>) {
        let charge_point_id = ctx.charge_point_id();
        match phase {
            HookPhase::Before => {
                self.started.insert(charge_point_id.to_string(), Instant::now());
            }
            HookPhase::After => {
                let action = ctx.request.action().as_str();
                if let Some((_, started)) = self.started.remove(charge_point_id) {
                    metrics::histogram!("ocpp_message_handling_seconds", "action" => action)
                        .record(started.elapsed().as_secs_f64());
                }
                let outcome = if ctx.succeeded() { "ok" } else { "error" };
                metrics::counter!("ocpp_messages_total", "action" => action, "outcome" => outcome)
                    .increment(1);
            }
        }
    }
}

#[async_trait]
impl ChargePointPlugin for MetricsPlugin {
    fn name(&self) -> &str {
        "metrics"
    }

    fn hooks(&self) -> &[PluginHook] {
        &PluginHook::ALL
    }

    async fn initialize(&self, session: &Arc<ChargePointSession>) -> PluginResult {
        metrics::gauge!("ocpp_charge_points_connected").increment(1.0);
        metrics::gauge!("ocpp_charge_point_up", "charge_point_id" => session.charge_point_id().to_string())
            .set(1.0);
        Ok(())
    }

    async fn cleanup(&self, session: &Arc<ChargePointSession>) -> PluginResult {
        let charge_point_id = session.charge_point_id().to_string();
        self.started.remove(&charge_point_id);
        metrics::gauge!("ocpp_charge_points_connected").decrement(1.0);
        metrics::gauge!("ocpp_charge_point_up", "charge_point_id" => charge_point_id.clone()).set(0.0);
        metrics::counter!("ocpp_disconnects_total", "charge_point_id" => charge_point_id).increment(1);
        Ok(())
    }

    async fn on_boot_notification(&self, phase: HookPhase, ctx: &PluginContext<'_>) -> PluginResult {
        self.observe(phase, ctx);
        if phase == HookPhase::After && ctx.succeeded() {
            metrics::counter!("ocpp_boots_total", "charge_point_id" => ctx.charge_point_id().to_string())
                .increment(1);
        }
        Ok(())
    }

    async fn on_heartbeat(&self, phase: HookPhase, ctx: &PluginContext<'_>) -> PluginResult {
        self.observe(phase, ctx);
        if phase == HookPhase::After && ctx.succeeded() {
            metrics::gauge!(
                "ocpp_last_heartbeat_timestamp_seconds",
                "charge_point_id" => ctx.charge_point_id().to_string()
            )
            .set(Utc::now().timestamp() as f64);
        }
        Ok(())
    }

    async fn on_status_notification(&self, phase: HookPhase, ctx: &PluginContext<'_>) -> PluginResult {
        self.observe(phase, ctx);
        if let (HookPhase::After, CallRequest::StatusNotification(req)) = (phase, ctx.request) {
            if ctx.succeeded() {
                metrics::gauge!(
                    "ocpp_connector_status",
                    "charge_point_id" => ctx.charge_point_id().to_string(),
                    "connector_id" => req.connector_id.to_string()
                )
                .set(status_code(ConnectorStatus::from(req.status.clone())));
            }
        }
        Ok(())
    }

    async fn on_start_transaction(&self, phase: HookPhase, ctx: &PluginContext<'_>) -> PluginResult {
        self.observe(phase, ctx);
        if let (
            HookPhase::After,
            CallRequest::StartTransaction(req),
            Some(Ok(CallResponse::StartTransaction(res))),
        ) = (phase, ctx.request, ctx.result)
        {
            let charge_point_id = ctx.charge_point_id();
            // Any earlier transaction on this connector was closed as an orphan.
            self.active
                .retain(|_, entry| !(entry.0 == charge_point_id && entry.1 == req.connector_id));
            self.active
                .insert(res.transaction_id, (charge_point_id.to_string(), req.connector_id));
            set_connector_active(charge_point_id, req.connector_id, true);
            self.publish_active();
            metrics::counter!("ocpp_transactions_total", "charge_point_id" => charge_point_id.to_string())
                .increment(1);
        }
        Ok(())
    }

    async fn on_stop_transaction(&self, phase: HookPhase, ctx: &PluginContext<'_>) -> PluginResult {
        self.observe(phase, ctx);
        if let (HookPhase::After, CallRequest::StopTransaction(req)) = (phase, ctx.request) {
            if !ctx.succeeded() {
                return Ok(());
            }
            let charge_point_id = ctx.charge_point_id();
            // Unknown or already stopped ids leave the gauges alone.
            if let Some((_, (_, connector_id))) = self
                .active
                .remove_if(&req.transaction_id, |_, entry| entry.0 == charge_point_id)
            {
                set_connector_active(charge_point_id, connector_id, false);
                self.publish_active();
            }
        }
        Ok(())
    }

    async fn on_meter_values(&self, phase: HookPhase, ctx: &PluginContext<'_>) -> PluginResult {
        self.observe(phase, ctx);
        Ok(())
    }

    async fn on_authorize(&self, phase: HookPhase, ctx: &PluginContext<'_>) -> PluginResult {
        self.observe(phase, ctx);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use metrics_exporter_prometheus::PrometheusBuilder;
    use rust_ocpp::v1_6::messages::heart_beat::{HeartbeatRequest, HeartbeatResponse};
    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;
    use crate::application::plugins::PluginPipeline;
    use crate::application::testing::Harness;
    use crate::support::ocpp_frame::OcppFrame;

    /// Value of the first sample of `name` carrying every label in `labels`.
    fn sample(rendered: &str, name: &str, labels: &[&str]) -> Option<f64> {
        rendered
            .lines()
            .filter(|line| !line.starts_with('#'))
            .filter(|line| line.split(['{', ' ']).next() == Some(name))
            .find(|line| labels.iter().all(|label| line.contains(label)))
            .and_then(|line| line.rsplit(' ').next())
            .and_then(|value| value.parse().ok())
    }

    fn harness_with_metrics() -> Harness {
        let mut plugins = PluginPipeline::new();
        plugins.register(Arc::new(MetricsPlugin::new()));
        Harness::with_plugins(plugins)
    }

    fn stop(transaction_id: i32) -> serde_json::Value {
        json!({
            "transactionId": transaction_id,
            "meterStop": 100,
            "timestamp": "2024-05-01T11:00:00Z"
        })
    }

    #[tokio::test]
    async fn unknown_and_repeated_stops_keep_gauges_in_range() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let _guard = metrics::set_default_local_recorder(&recorder);
        let mut harness = harness_with_metrics();

        let id = harness.start_transaction(1, 0).await;
        let reply = harness.call("StopTransaction", stop(424242)).await;
        assert!(matches!(reply, OcppFrame::CallResult { .. }));

        let rendered = handle.render();
        assert_eq!(sample(&rendered, "ocpp_transactions_active", &[]), Some(1.0));
        assert_eq!(
            sample(&rendered, "ocpp_tx_active", &["charge_point_id=\"CP001\"", "connector_id=\"1\""]),
            Some(1.0)
        );

        harness.call("StopTransaction", stop(id)).await;
        harness.call("StopTransaction", stop(id)).await;

        let rendered = handle.render();
        assert_eq!(sample(&rendered, "ocpp_transactions_active", &[]), Some(0.0));
        assert_eq!(
            sample(&rendered, "ocpp_tx_active", &["connector_id=\"1\""]),
            Some(0.0)
        );
    }

    #[tokio::test]
    async fn orphan_close_is_not_counted_as_active() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let _guard = metrics::set_default_local_recorder(&recorder);
        let mut harness = harness_with_metrics();

        let orphan = harness.start_transaction(1, 0).await;
        let fresh = harness.start_transaction(1, 0).await;
        harness.start_transaction(2, 0).await;

        let rendered = handle.render();
        assert_eq!(sample(&rendered, "ocpp_transactions_active", &[]), Some(2.0));

        // The orphan was already closed by the second start.
        harness.call("StopTransaction", stop(orphan)).await;
        let rendered = handle.render();
        assert_eq!(sample(&rendered, "ocpp_transactions_active", &[]), Some(2.0));
        assert_eq!(
            sample(&rendered, "ocpp_tx_active", &["connector_id=\"1\""]),
            Some(1.0)
        );

        harness.call("StopTransaction", stop(fresh)).await;
        let rendered = handle.render();
        assert_eq!(sample(&rendered, "ocpp_transactions_active", &[]), Some(1.0));
        assert_eq!(
            sample(&rendered, "ocpp_tx_active", &["connector_id=\"1\""]),
            Some(0.0)
        );
        assert_eq!(
            sample(&rendered, "ocpp_tx_active", &["connector_id=\"2\""]),
            Some(1.0)
        );
    }

    #[tokio::test]
    async fn start_time_is_dropped_after_the_call() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let session = Arc::new(ChargePointSession::new("CP001", None, tx, Duration::from_secs(5)));
        let plugin = MetricsPlugin::new();
        let request = CallRequest::Heartbeat(HeartbeatRequest {});
        let result = Ok(CallResponse::Heartbeat(HeartbeatResponse {
            current_time: Utc::now(),
        }));

        let before = PluginContext {
            session: &session,
            request: &request,
            result: None,
        };
        plugin.on_heartbeat(HookPhase::Before, &before).await.unwrap();
        assert!(plugin.started.contains_key("CP001"));

        let after = PluginContext {
            session: &session,
            request: &request,
            result: Some(&result),
        };
        plugin.on_heartbeat(HookPhase::After, &after).await.unwrap();
        assert!(plugin.started.is_empty());
    }
}
