//! BootNotification handler

use chrono::Utc;
use rust_ocpp::v1_6::messages::boot_notification::{
    BootNotificationRequest, BootNotificationResponse,
};
use rust_ocpp::v1_6::types::RegistrationStatus;
use tracing::info;

use crate::application::handlers::OcppHandlerV16;
use crate::domain::BootInfo;
use crate::support::errors::ProtocolError;

pub async fn handle_boot_notification(
    handler: &OcppHandlerV16,
    req: &BootNotificationRequest,
) -> Result<BootNotificationResponse, ProtocolError> {
    info!(
        charge_point_id = handler.charge_point_id(),
        vendor = req.charge_point_vendor.as_str(),
        model = req.charge_point_model.as_str(),
        firmware = ?req.firmware_version,
        "BootNotification"
    );

    let now = Utc::now();
    let repo = handler.repos.charge_points();
    let mut charge_point = repo.find_or_new(handler.charge_point_id()).await?;
    charge_point.apply_boot(
        BootInfo {
            vendor: req.charge_point_vendor.clone(),
            model: req.charge_point_model.clone(),
            serial_number: req.charge_point_serial_number.clone(),
            firmware_version: req.firmware_version.clone(),
            iccid: req.iccid.clone(),
            imsi: req.imsi.clone(),
        },
        now,
    );
    repo.upsert(charge_point).await?;

    let interval = handler
        .settings
        .heartbeat_interval
        .as_secs()
        .try_into()
        .map_err(|_| ProtocolError::internal("heartbeat interval out of range"))?;

    Ok(BootNotificationResponse {
        current_time: now,
        interval,
        status: RegistrationStatus::Accepted,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::application::testing::Harness;
    use crate::domain::ChargePointRepository;
    use crate::support::ocpp_frame::OcppFrame;

    #[tokio::test]
    async fn boot_is_accepted_and_persisted() {
        let mut harness = Harness::new();
        let reply = harness
            .call(
                "BootNotification",
                json!({"chargePointVendor": "ACME", "chargePointModel": "X1", "firmwareVersion": "1.2"}),
            )
            .await;

        let OcppFrame::CallResult { payload, .. } = reply else {
            panic!("expected CallResult, got {:?}", reply);
        };
        assert_eq!(payload["status"], "Accepted");
        assert_eq!(payload["interval"], 60);
        assert!(payload["currentTime"].is_string());

        let stored = ChargePointRepository::find_by_id(harness.storage.as_ref(), "CP001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.vendor.as_deref(), Some("ACME"));
        assert_eq!(stored.firmware_version.as_deref(), Some("1.2"));
        assert!(stored.last_boot_at.is_some());
    }

    #[tokio::test]
    async fn reboot_keeps_fields_the_charge_point_omits() {
        let mut harness = Harness::new();
        harness
            .call(
                "BootNotification",
                json!({"chargePointVendor": "ACME", "chargePointModel": "X1", "chargePointSerialNumber": "SN-9"}),
            )
            .await;
        harness
            .call(
                "BootNotification",
                json!({"chargePointVendor": "ACME", "chargePointModel": "X2"}),
            )
            .await;

        let stored = ChargePointRepository::find_by_id(harness.storage.as_ref(), "CP001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.model.as_deref(), Some("X2"));
        assert_eq!(stored.serial_number.as_deref(), Some("SN-9"));
    }

    #[tokio::test]
    async fn boot_without_required_fields_is_rejected_unpersisted() {
        let mut harness = Harness::new();
        let reply = harness.call("BootNotification", json!({})).await;

        let OcppFrame::CallError { unique_id, error_code, .. } = reply else {
            panic!("expected CallError, got {:?}", reply);
        };
        assert_eq!(unique_id, "call-1");
        assert_eq!(error_code, "ProtocolError");

        let stored = ChargePointRepository::find_by_id(harness.storage.as_ref(), "CP001")
            .await
            .unwrap();
        assert!(stored.is_none());
    }
}
