//! One charge point's connection: outbound call discipline, inbound
//! frame routing and lifecycle state.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::pending::PendingCalls;
use crate::application::services::auto_start::AutoStartScheduler;
use crate::support::errors::CommandError;
use crate::support::ocpp_frame::OcppFrame;

/// Lifecycle of a session. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Connecting = 0,
    Active = 1,
    Closing = 2,
    Closed = 3,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Active,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// A Call received from the charge point, queued for sequential dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundCall {
    pub unique_id: String,
    pub action: String,
    pub payload: Value,
}

/// Latest energy register reading seen on a connector during this session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeterReading {
    pub transaction_id: Option<i32>,
    pub energy_wh: f64,
}

pub struct ChargePointSession {
    charge_point_id: String,
    connection_id: Uuid,
    remote_addr: Option<SocketAddr>,
    connected_at: DateTime<Utc>,
    sender: mpsc::UnboundedSender<String>,
    state: AtomicU8,
    /// Set once Connecting → Active succeeded.
    activated: AtomicBool,
    torn_down: AtomicBool,
    call_timeout: Duration,
    /// Held for the whole lifetime of an outbound call.
    call_lock: Mutex<()>,
    pending: PendingCalls,
    closed: CancellationToken,
    close_reason: OnceLock<String>,
    started: Instant,
    /// Milliseconds since `started` at the last Heartbeat.
    last_heartbeat_ms: AtomicU64,
    meter_readings: DashMap<u32, MeterReading>,
    auto_start: AutoStartScheduler,
}

impl ChargePointSession {
    pub fn new(
        charge_point_id: impl Into<String>,
        remote_addr: Option<SocketAddr>,
        sender: mpsc::UnboundedSender<String>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            charge_point_id: charge_point_id.into(),
            connection_id: Uuid::new_v4(),
            remote_addr,
            connected_at: Utc::now(),
            sender,
            state: AtomicU8::new(SessionState::Connecting as u8),
            activated: AtomicBool::new(false),
            torn_down: AtomicBool::new(false),
            call_timeout,
            call_lock: Mutex::new(()),
            pending: PendingCalls::new(),
            closed: CancellationToken::new(),
            close_reason: OnceLock::new(),
            started: Instant::now(),
            last_heartbeat_ms: AtomicU64::new(0),
            meter_readings: DashMap::new(),
            auto_start: AutoStartScheduler::new(),
        }
    }

    // ── Identity ───────────────────────────────────────────

    pub fn charge_point_id(&self) -> &str {
        &self.charge_point_id
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    // ── Lifecycle ──────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// Connecting or Active: the identity is taken.
    pub fn is_live(&self) -> bool {
        matches!(self.state(), SessionState::Connecting | SessionState::Active)
    }

    /// Connecting → Active.
    pub fn activate(&self) -> bool {
        let moved = self.transition(SessionState::Connecting, SessionState::Active);
        if moved {
            self.activated.store(true, Ordering::SeqCst);
        }
        moved
    }

    /// Whether the session ever reached Active (plugins were initialized).
    pub fn was_activated(&self) -> bool {
        self.activated.load(Ordering::SeqCst)
    }

    /// `true` for exactly one caller; disconnect cleanup runs once.
    pub(crate) fn begin_teardown(&self) -> bool {
        !self.torn_down.swap(true, Ordering::SeqCst)
    }

    /// Begin teardown. Pending outbound calls resolve with
    /// `ConnectionClosed` and armed auto-start timers are cancelled.
    /// Returns `false` if the session was already closing.
    pub fn close(&self, reason: impl Into<String>) -> bool {
        let moved = self.transition(SessionState::Connecting, SessionState::Closing)
            || self.transition(SessionState::Active, SessionState::Closing);
        if !moved {
            return false;
        }

        let reason = reason.into();
        info!(
            charge_point_id = self.charge_point_id.as_str(),
            reason = reason.as_str(),
            "Closing session"
        );
        let _ = self.close_reason.set(reason);

        self.closed.cancel();
        self.auto_start.cancel_all();
        let failed = self.pending.fail_all(CommandError::ConnectionClosed);
        if failed > 0 {
            warn!(
                charge_point_id = self.charge_point_id.as_str(),
                failed, "Outbound calls aborted by session close"
            );
        }
        true
    }

    /// Closing → Closed, once cleanup has run.
    pub fn mark_closed(&self) {
        self.transition(SessionState::Closing, SessionState::Closed);
    }

    pub fn close_reason(&self) -> Option<&str> {
        self.close_reason.get().map(String::as_str)
    }

    /// Resolves when [`close`](Self::close) has been called.
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }

    /// Token cancelled on close; timers derive child tokens from it.
    pub(crate) fn close_token(&self) -> &CancellationToken {
        &self.closed
    }

    fn transition(&self, from: SessionState, to: SessionState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    // ── Transport ──────────────────────────────────────────

    /// Queue a frame for the writer task.
    pub fn send_frame(&self, frame: OcppFrame) -> Result<(), CommandError> {
        let text = frame.serialize();
        debug!(
            charge_point_id = self.charge_point_id.as_str(),
            frame = text.as_str(),
            "→ outgoing"
        );
        self.sender
            .send(text)
            .map_err(|_| CommandError::ConnectionClosed)
    }

    /// Decode one inbound text frame.
    ///
    /// Responses are delivered to their waiting caller right here, so an
    /// `invoke` made from inside a handler can complete while that handler
    /// is still running. Calls are returned for sequential dispatch.
    pub fn route_inbound(&self, text: &str) -> Option<InboundCall> {
        debug!(
            charge_point_id = self.charge_point_id.as_str(),
            frame = text,
            "← incoming"
        );

        match OcppFrame::parse(text) {
            Ok(OcppFrame::Call {
                unique_id,
                action,
                payload,
            }) => Some(InboundCall {
                unique_id,
                action,
                payload,
            }),
            Ok(OcppFrame::CallResult { unique_id, payload }) => {
                self.pending.resolve(&unique_id, payload);
                None
            }
            Ok(OcppFrame::CallError {
                unique_id,
                error_code,
                error_description,
                ..
            }) => {
                self.pending
                    .reject(&unique_id, &error_code, &error_description);
                None
            }
            Err(err) => {
                warn!(
                    charge_point_id = self.charge_point_id.as_str(),
                    error = %err,
                    "Malformed OCPP frame"
                );
                if let Some(reply) = err.reply() {
                    let _ = self.send_frame(reply);
                }
                None
            }
        }
    }

    // ── Outbound calls ─────────────────────────────────────

    /// Send a Call to the charge point and wait for its answer.
    ///
    /// At most one call is in flight per session; concurrent callers wait
    /// their turn here.
    pub async fn invoke(&self, action: &str, payload: Value) -> Result<Value, CommandError> {
        let _turn = tokio::select! {
            guard = self.call_lock.lock() => guard,
            _ = self.closed.cancelled() => return Err(CommandError::ConnectionClosed),
        };
        if !self.is_active() {
            return Err(CommandError::ConnectionClosed);
        }

        let unique_id = Uuid::new_v4().to_string();
        let rx = self.pending.register(&unique_id, action);

        info!(
            charge_point_id = self.charge_point_id.as_str(),
            action,
            message_id = unique_id.as_str(),
            "Sending call"
        );

        let frame = OcppFrame::Call {
            unique_id: unique_id.clone(),
            action: action.to_string(),
            payload,
        };
        if let Err(e) = self.send_frame(frame) {
            self.pending.remove(&unique_id);
            return Err(e);
        }

        // A close racing with `register` can miss this waiter in
        // `fail_all`, so watch the close token as well.
        let answer = tokio::select! {
            biased;
            answer = timeout(self.call_timeout, rx) => answer,
            _ = self.closed.cancelled() => {
                self.pending.remove(&unique_id);
                return Err(CommandError::ConnectionClosed);
            }
        };

        match answer {
            Ok(Ok(outcome)) => outcome,
            // Responder dropped without an answer: only happens on teardown.
            Ok(Err(_)) => Err(CommandError::ConnectionClosed),
            Err(_) => {
                self.pending.remove(&unique_id);
                warn!(
                    charge_point_id = self.charge_point_id.as_str(),
                    action,
                    message_id = unique_id.as_str(),
                    "Call timed out"
                );
                Err(CommandError::Timeout {
                    action: action.to_string(),
                    timeout_secs: self.call_timeout.as_secs(),
                })
            }
        }
    }

    /// Typed wrapper around [`invoke`](Self::invoke).
    pub async fn call<Req, Res>(&self, action: &str, request: &Req) -> Result<Res, CommandError>
    where
        Req: Serialize + Sync,
        Res: DeserializeOwned,
    {
        let payload = serde_json::to_value(request)
            .map_err(|e| CommandError::Serialization(e.to_string()))?;
        let response = self.invoke(action, payload).await?;
        serde_json::from_value(response).map_err(|e| CommandError::InvalidResponse(e.to_string()))
    }

    pub fn pending_calls(&self) -> usize {
        self.pending.len()
    }

    // ── Per-connection state ───────────────────────────────

    pub fn record_heartbeat(&self) {
        let elapsed = self.started.elapsed().as_millis() as u64;
        self.last_heartbeat_ms.store(elapsed, Ordering::SeqCst);
    }

    /// Time since the last Heartbeat (or since connect if none arrived).
    pub fn since_last_heartbeat(&self) -> Duration {
        let last = Duration::from_millis(self.last_heartbeat_ms.load(Ordering::SeqCst));
        self.started.elapsed().saturating_sub(last)
    }

    pub fn record_meter_reading(&self, connector_id: u32, reading: MeterReading) {
        self.meter_readings.insert(connector_id, reading);
    }

    pub fn last_meter_reading(&self, connector_id: u32) -> Option<MeterReading> {
        self.meter_readings.get(&connector_id).map(|r| *r)
    }

    pub fn auto_start(&self) -> &AutoStartScheduler {
        &self.auto_start
    }
}

impl std::fmt::Debug for ChargePointSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChargePointSession")
            .field("charge_point_id", &self.charge_point_id)
            .field("connection_id", &self.connection_id)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use serde_json::json;

    fn active_session(
        call_timeout: Duration,
    ) -> (Arc<ChargePointSession>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Arc::new(ChargePointSession::new("CP001", None, tx, call_timeout));
        session.activate();
        (session, rx)
    }

    fn sent_call(text: &str) -> (String, String) {
        match OcppFrame::parse(text).unwrap() {
            OcppFrame::Call {
                unique_id, action, ..
            } => (unique_id, action),
            other => panic!("expected a Call, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn invoke_resolves_with_matching_result() {
        let (session, mut rx) = active_session(Duration::from_secs(5));

        let caller = {
            let session = session.clone();
            tokio::spawn(async move { session.invoke("Reset", json!({"type": "Soft"})).await })
        };

        let (id, action) = sent_call(&rx.recv().await.unwrap());
        assert_eq!(action, "Reset");

        let reply = OcppFrame::CallResult {
            unique_id: id,
            payload: json!({"status": "Accepted"}),
        };
        assert!(session.route_inbound(&reply.serialize()).is_none());
        assert_eq!(caller.await.unwrap().unwrap(), json!({"status": "Accepted"}));
    }

    #[tokio::test(start_paused = true)]
    async fn close_unblocks_a_waiter_fail_all_missed() {
        let (session, mut rx) = active_session(Duration::from_secs(30));
        let started = tokio::time::Instant::now();
        let caller = {
            let session = session.clone();
            tokio::spawn(async move { session.invoke("Reset", json!({})).await })
        };
        sent_call(&rx.recv().await.unwrap());

        // Cancel without failing the pending table, as a close that ran
        // between the state check and `register` would leave it.
        session.close_token().cancel();

        assert_eq!(caller.await.unwrap(), Err(CommandError::ConnectionClosed));
        assert!(started.elapsed() < Duration::from_secs(30));
        assert_eq!(session.pending_calls(), 0);
    }

    #[tokio::test]
    async fn call_error_surfaces_to_caller() {
        let (session, mut rx) = active_session(Duration::from_secs(5));
        let caller = {
            let session = session.clone();
            tokio::spawn(async move { session.invoke("Reset", json!({})).await })
        };

        let (id, _) = sent_call(&rx.recv().await.unwrap());
        session.route_inbound(
            &OcppFrame::error_response(id, crate::support::ocpp_frame::ErrorCode::NotSupported, "no")
                .serialize(),
        );

        assert!(matches!(
            caller.await.unwrap(),
            Err(CommandError::CallError { code, .. }) if code == "NotSupported"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn second_invoke_waits_for_the_first() {
        let (session, mut rx) = active_session(Duration::from_secs(30));

        let first = {
            let session = session.clone();
            tokio::spawn(async move { session.invoke("Reset", json!({})).await })
        };
        let (first_id, _) = sent_call(&rx.recv().await.unwrap());

        let second = {
            let session = session.clone();
            tokio::spawn(async move { session.invoke("ClearCache", json!({})).await })
        };

        // The second call must not hit the wire while the first is open.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(session.pending_calls(), 1);

        session.route_inbound(
            &OcppFrame::CallResult {
                unique_id: first_id,
                payload: json!({"status": "Accepted"}),
            }
            .serialize(),
        );
        first.await.unwrap().unwrap();

        let (second_id, action) = sent_call(&rx.recv().await.unwrap());
        assert_eq!(action, "ClearCache");
        session.route_inbound(
            &OcppFrame::CallResult {
                unique_id: second_id,
                payload: json!({"status": "Accepted"}),
            }
            .serialize(),
        );
        second.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_call_ignores_late_response() {
        let (session, mut rx) = active_session(Duration::from_secs(2));

        let caller = {
            let session = session.clone();
            tokio::spawn(async move { session.invoke("Reset", json!({})).await })
        };
        let (id, _) = sent_call(&rx.recv().await.unwrap());

        let outcome = caller.await.unwrap();
        assert!(matches!(outcome, Err(CommandError::Timeout { .. })));
        assert_eq!(session.pending_calls(), 0);

        // Late answer for the expired id: dropped, nothing resolves twice.
        let late = OcppFrame::CallResult {
            unique_id: id,
            payload: json!({"status": "Accepted"}),
        };
        assert!(session.route_inbound(&late.serialize()).is_none());
        assert_eq!(session.pending_calls(), 0);
    }

    #[tokio::test]
    async fn close_fails_pending_calls() {
        let (session, mut rx) = active_session(Duration::from_secs(30));
        let caller = {
            let session = session.clone();
            tokio::spawn(async move { session.invoke("Reset", json!({})).await })
        };
        rx.recv().await.unwrap();

        assert!(session.close("transport lost"));
        assert!(!session.close("again"));
        assert_eq!(caller.await.unwrap(), Err(CommandError::ConnectionClosed));
        assert_eq!(session.state(), SessionState::Closing);
        assert_eq!(session.close_reason(), Some("transport lost"));

        // Nothing new goes out once closing.
        assert_eq!(
            session.invoke("Reset", json!({})).await,
            Err(CommandError::ConnectionClosed)
        );
    }

    #[tokio::test]
    async fn inbound_calls_are_returned_for_dispatch() {
        let (session, _rx) = active_session(Duration::from_secs(5));
        let call = session
            .route_inbound(r#"[2,"19","Heartbeat",{}]"#)
            .expect("call");
        assert_eq!(call.unique_id, "19");
        assert_eq!(call.action, "Heartbeat");
    }

    #[tokio::test]
    async fn malformed_call_is_answered_with_formation_violation() {
        let (session, mut rx) = active_session(Duration::from_secs(5));
        assert!(session.route_inbound(r#"[2,"5","Heartbeat"]"#).is_none());

        match OcppFrame::parse(&rx.recv().await.unwrap()).unwrap() {
            OcppFrame::CallError {
                unique_id,
                error_code,
                ..
            } => {
                assert_eq!(unique_id, "5");
                assert_eq!(error_code, "FormationViolation");
            }
            other => panic!("expected CallError, got {:?}", other),
        }

        // Unrecoverable garbage is only logged.
        assert!(session.route_inbound("garbage").is_none());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_resets_liveness_clock() {
        let (session, _rx) = active_session(Duration::from_secs(5));
        tokio::time::advance(Duration::from_secs(90)).await;
        assert!(session.since_last_heartbeat() >= Duration::from_secs(90));

        session.record_heartbeat();
        tokio::time::advance(Duration::from_secs(10)).await;
        let since = session.since_last_heartbeat();
        assert!(since >= Duration::from_secs(10) && since < Duration::from_secs(11));
    }
}
