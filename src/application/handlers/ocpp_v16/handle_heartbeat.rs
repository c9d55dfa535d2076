//! Heartbeat handler

use chrono::Utc;
use rust_ocpp::v1_6::messages::heart_beat::{HeartbeatRequest, HeartbeatResponse};
use tracing::debug;

use crate::application::handlers::OcppHandlerV16;
use crate::support::errors::ProtocolError;

pub async fn handle_heartbeat(
    handler: &OcppHandlerV16,
    _req: &HeartbeatRequest,
) -> Result<HeartbeatResponse, ProtocolError> {
    debug!(charge_point_id = handler.charge_point_id(), "Heartbeat");

    let now = Utc::now();
    handler.session.record_heartbeat();

    let repo = handler.repos.charge_points();
    let mut charge_point = repo.find_or_new(handler.charge_point_id()).await?;
    charge_point.last_heartbeat_at = Some(now);
    repo.upsert(charge_point).await?;

    Ok(HeartbeatResponse { current_time: now })
}
