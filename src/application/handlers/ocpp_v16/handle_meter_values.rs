//! MeterValues handler

use rust_ocpp::v1_6::messages::meter_values::{MeterValuesRequest, MeterValuesResponse};
use rust_ocpp::v1_6::types::MeterValue as OcppMeterValue;
use tracing::{info, warn};

use crate::application::handlers::OcppHandlerV16;
use crate::application::session::MeterReading;
use crate::domain::{NewMeterValue, ENERGY_ACTIVE_IMPORT_REGISTER};
use crate::support::errors::ProtocolError;
use crate::support::serializations::wire_name;

const DEFAULT_UNIT: &str = "Wh";
const DEFAULT_CONTEXT: &str = "Sample.Periodic";
const DEFAULT_LOCATION: &str = "Outlet";
const DEFAULT_FORMAT: &str = "Raw";

pub async fn handle_meter_values(
    handler: &OcppHandlerV16,
    req: &MeterValuesRequest,
) -> Result<MeterValuesResponse, ProtocolError> {
    let charge_point_id = handler.charge_point_id();
    info!(
        charge_point_id,
        connector_id = req.connector_id,
        transaction_id = ?req.transaction_id,
        samples = req.meter_value.len(),
        "MeterValues"
    );

    // Samples only attach to a transaction that is still running here.
    let transaction_id = match req.transaction_id {
        Some(id) => {
            let linked = handler
                .repos
                .transactions()
                .find_by_id(id)
                .await?
                .filter(|tx| tx.is_active() && tx.charge_point_id == charge_point_id)
                .map(|tx| tx.id);
            if linked.is_none() {
                warn!(
                    charge_point_id,
                    transaction_id = id,
                    "MeterValues for unknown or finished transaction, storing unlinked"
                );
            }
            linked
        }
        None => None,
    };

    if req.connector_id > 0 {
        handler
            .repos
            .connectors()
            .get_or_create(charge_point_id, req.connector_id)
            .await?;
    }

    let samples = collect_samples(
        charge_point_id,
        req.connector_id,
        transaction_id,
        &req.meter_value,
    );

    if let Some(energy_wh) = samples.iter().filter_map(NewMeterValue::energy_wh).last() {
        handler.session.record_meter_reading(
            req.connector_id,
            MeterReading {
                transaction_id,
                energy_wh,
            },
        );
    }

    handler.repos.meter_values().append(samples).await?;
    Ok(MeterValuesResponse {})
}

/// Flatten OCPP meter values into stored samples, filling the OCPP
/// defaults for omitted attributes. Unparseable values are skipped.
pub(super) fn collect_samples(
    charge_point_id: &str,
    connector_id: u32,
    transaction_id: Option<i32>,
    meter_values: &[OcppMeterValue],
) -> Vec<NewMeterValue> {
    let mut samples = Vec::new();
    for meter_value in meter_values {
        for sampled in &meter_value.sampled_value {
            let value: f64 = match sampled.value.trim().parse() {
                Ok(v) => v,
                Err(_) => {
                    warn!(
                        charge_point_id,
                        connector_id,
                        value = sampled.value.as_str(),
                        "Skipping non-numeric sampled value"
                    );
                    continue;
                }
            };

            samples.push(NewMeterValue {
                charge_point_id: charge_point_id.to_string(),
                connector_id,
                transaction_id,
                timestamp: meter_value.timestamp,
                measurand: sampled
                    .measurand
                    .as_ref()
                    .map(wire_name)
                    .unwrap_or_else(|| ENERGY_ACTIVE_IMPORT_REGISTER.to_string()),
                value,
                unit: sampled
                    .unit
                    .as_ref()
                    .map(wire_name)
                    .unwrap_or_else(|| DEFAULT_UNIT.to_string()),
                context: sampled
                    .context
                    .as_ref()
                    .map(wire_name)
                    .unwrap_or_else(|| DEFAULT_CONTEXT.to_string()),
                location: sampled
                    .location
                    .as_ref()
                    .map(wire_name)
                    .unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
                phase: sampled.phase.as_ref().map(wire_name),
                format: sampled
                    .format
                    .as_ref()
                    .map(wire_name)
                    .unwrap_or_else(|| DEFAULT_FORMAT.to_string()),
            });
        }
    }
    samples
}
