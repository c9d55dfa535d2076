//! Closes sessions whose charge point stopped sending Heartbeats.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::application::session::ChargePointSession;

/// Missed intervals tolerated before the session is dropped.
pub const MISSED_HEARTBEATS_ALLOWED: u32 = 3;

pub const HEARTBEAT_TIMEOUT_REASON: &str = "Heartbeat timeout";

/// Watch one session until it closes. First check after
/// `3 × interval`, then every `interval`.
pub async fn watch(session: Arc<ChargePointSession>, interval: Duration) {
    let limit = interval * MISSED_HEARTBEATS_ALLOWED;

    tokio::select! {
        _ = session.closed() => return,
        _ = tokio::time::sleep(limit) => {}
    }

    loop {
        let silent_for = session.since_last_heartbeat();
        if silent_for > limit {
            warn!(
                charge_point_id = session.charge_point_id(),
                silent_secs = silent_for.as_secs(),
                "No heartbeat received, closing connection"
            );
            session.close(HEARTBEAT_TIMEOUT_REASON);
            return;
        }

        tokio::select! {
            _ = session.closed() => return,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
