//! Delayed RemoteStartTransaction after a connector reports Preparing.
//!
//! Some firmware reports Preparing for a moment before settling on another
//! status, so the call is only sent if nothing else arrives within the delay.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rust_ocpp::v1_6::messages::remote_start_transaction::{
    RemoteStartTransactionRequest, RemoteStartTransactionResponse,
};
use rust_ocpp::v1_6::types::RemoteStartStopStatus;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::session::ChargePointSession;

pub const DEFAULT_AUTO_START_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_AUTO_START_ID_TAG: &str = "anonymous";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoStartSettings {
    pub enabled: bool,
    pub delay: Duration,
    pub id_tag: String,
}

impl Default for AutoStartSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            delay: DEFAULT_AUTO_START_DELAY,
            id_tag: DEFAULT_AUTO_START_ID_TAG.to_string(),
        }
    }
}

struct ArmedTimer {
    generation: u64,
    token: CancellationToken,
}

/// Armed timers of one session, at most one per connector.
#[derive(Default)]
pub struct AutoStartScheduler {
    timers: DashMap<u32, ArmedTimer>,
    generation: AtomicU64,
}

impl AutoStartScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) the timer for `connector_id`. Any timer already
    /// armed for that connector is cancelled.
    pub fn arm(&self, session: &Arc<ChargePointSession>, connector_id: u32, settings: &AutoStartSettings) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst);
        // Child of the session token: closing the session cancels it too.
        let token = session.close_token().child_token();

        if let Some(previous) = self.timers.insert(
            connector_id,
            ArmedTimer {
                generation,
                token: token.clone(),
            },
        ) {
            previous.token.cancel();
        }

        info!(
            charge_point_id = session.charge_point_id(),
            connector_id,
            delay_ms = settings.delay.as_millis() as u64,
            "Auto-start armed"
        );

        let session = Arc::clone(session);
        let delay = settings.delay;
        let id_tag = settings.id_tag.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(charge_point_id = session.charge_point_id(), connector_id, "Auto-start disarmed");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            session
                .auto_start()
                .timers
                .remove_if(&connector_id, |_, armed| armed.generation == generation);
            // Disarmed between expiry and removal.
            if token.is_cancelled() {
                return;
            }

            remote_start(&session, connector_id, id_tag).await;
        });
    }

    /// Cancel the timer for `connector_id`; `false` if none was armed.
    pub fn disarm(&self, connector_id: u32) -> bool {
        match self.timers.remove(&connector_id) {
            Some((_, armed)) => {
                armed.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        let connectors: Vec<u32> = self.timers.iter().map(|e| *e.key()).collect();
        for connector_id in connectors {
            self.disarm(connector_id);
        }
    }

    pub fn is_armed(&self, connector_id: u32) -> bool {
        self.timers.contains_key(&connector_id)
    }
}

async fn remote_start(session: &ChargePointSession, connector_id: u32, id_tag: String) {
    let request = RemoteStartTransactionRequest {
        connector_id: Some(connector_id),
        id_tag,
        charging_profile: None,
    };

    match session
        .call::<_, RemoteStartTransactionResponse>("RemoteStartTransaction", &request)
        .await
    {
        Ok(response) if matches!(response.status, RemoteStartStopStatus::Accepted) => {
            info!(
                charge_point_id = session.charge_point_id(),
                connector_id, "Auto-start accepted"
            );
        }
        Ok(response) => {
            warn!(
                charge_point_id = session.charge_point_id(),
                connector_id,
                status = ?response.status,
                "Auto-start rejected by charge point"
            );
        }
        Err(e) => {
            error!(
                charge_point_id = session.charge_point_id(),
                connector_id,
                error = %e,
                "Auto-start call failed"
            );
        }
    }
}
