//! StatusNotification handler

use chrono::{DateTime, Utc};
use rust_ocpp::v1_6::messages::status_notification::{
    StatusNotificationRequest, StatusNotificationResponse,
};
use tracing::{debug, error, info, warn};

use crate::application::handlers::OcppHandlerV16;
use crate::domain::{ConnectorStatus, ConnectorStatusUpdate, DomainResult, NewErrorEvent};
use crate::support::errors::ProtocolError;
use crate::support::serializations::wire_name;

const NO_ERROR: &str = "NoError";

pub async fn handle_status_notification(
    handler: &OcppHandlerV16,
    req: &StatusNotificationRequest,
) -> Result<StatusNotificationResponse, ProtocolError> {
    let status = ConnectorStatus::from(req.status.clone());
    let error_code = wire_name(&req.error_code);
    let at = req.timestamp.unwrap_or_else(Utc::now);

    info!(
        charge_point_id = handler.charge_point_id(),
        connector_id = req.connector_id,
        status = status.as_str(),
        error_code = error_code.as_str(),
        "StatusNotification"
    );

    // Timers follow the reported status even when storage is failing.
    if req.connector_id > 0 {
        update_auto_start(handler, req.connector_id, status);
    }

    if req.connector_id == 0 {
        handler
            .repos
            .charge_points()
            .update_status(handler.charge_point_id(), status)
            .await?;
    } else {
        handler
            .repos
            .connectors()
            .update_status(
                handler.charge_point_id(),
                req.connector_id,
                ConnectorStatusUpdate {
                    status,
                    error_code: Some(error_code.clone()),
                    info: req.info.clone(),
                    vendor_id: req.vendor_id.clone(),
                    vendor_error_code: req.vendor_error_code.clone(),
                    at,
                },
            )
            .await?;
    }

    if let Err(e) = track_error(handler, req, &error_code, at).await {
        error!(
            charge_point_id = handler.charge_point_id(),
            connector_id = req.connector_id,
            error = %e,
            "Failed to update error events"
        );
    }

    Ok(StatusNotificationResponse {})
}

/// Open an ErrorEvent for a fault code, or resolve the scope's open events
/// once the charge point reports `NoError` again.
async fn track_error(
    handler: &OcppHandlerV16,
    req: &StatusNotificationRequest,
    error_code: &str,
    at: DateTime<Utc>,
) -> DomainResult<()> {
    let charge_point_id = handler.charge_point_id();
    let scope = (req.connector_id > 0).then_some(req.connector_id);
    let events = handler.repos.error_events();

    if error_code == NO_ERROR {
        let resolved = events.resolve_open(charge_point_id, scope, at).await?;
        if resolved > 0 {
            info!(charge_point_id, connector_id = req.connector_id, resolved, "Errors cleared");
        }
        return Ok(());
    }

    // Repeated reports of the same fault keep the one open event.
    let already_open = events
        .find_open(charge_point_id, scope)
        .await?
        .iter()
        .any(|event| event.error_code == error_code);
    if already_open {
        return Ok(());
    }

    warn!(
        charge_point_id,
        connector_id = req.connector_id,
        error_code,
        info = ?req.info,
        "Charge point reported an error"
    );
    events
        .record(NewErrorEvent {
            charge_point_id: charge_point_id.to_string(),
            connector_id: scope,
            error_code: error_code.to_string(),
            description: req.info.clone(),
            vendor_error_code: req.vendor_error_code.clone(),
            occurred_at: at,
        })
        .await?;
    Ok(())
}

fn update_auto_start(handler: &OcppHandlerV16, connector_id: u32, status: ConnectorStatus) {
    let settings = &handler.settings.auto_start;
    let scheduler = handler.session.auto_start();

    if status == ConnectorStatus::Preparing && settings.enabled {
        scheduler.arm(&handler.session, connector_id, settings);
    } else if scheduler.disarm(connector_id) {
        debug!(
            charge_point_id = handler.charge_point_id(),
            connector_id,
            status = status.as_str(),
            "Connector left Preparing, auto-start cancelled"
        );
    }
}
