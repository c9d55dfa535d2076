use chrono::{DateTime, Utc};

pub const ENERGY_ACTIVE_IMPORT_REGISTER: &str = "Energy.Active.Import.Register";

/// One stored sampled value.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterValue {
    pub id: i64,
    pub charge_point_id: String,
    pub connector_id: u32,
    /// Set only when the sample belongs to a known Active transaction
    pub transaction_id: Option<i32>,
    pub timestamp: DateTime<Utc>,
    pub measurand: String,
    pub value: f64,
    pub unit: String,
    pub context: String,
    pub location: String,
    pub phase: Option<String>,
    pub format: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMeterValue {
    pub charge_point_id: String,
    pub connector_id: u32,
    pub transaction_id: Option<i32>,
    pub timestamp: DateTime<Utc>,
    pub measurand: String,
    pub value: f64,
    pub unit: String,
    pub context: String,
    pub location: String,
    pub phase: Option<String>,
    pub format: String,
}

impl NewMeterValue {
    pub fn into_meter_value(self, id: i64) -> MeterValue {
        MeterValue {
            id,
            charge_point_id: self.charge_point_id,
            connector_id: self.connector_id,
            transaction_id: self.transaction_id,
            timestamp: self.timestamp,
            measurand: self.measurand,
            value: self.value,
            unit: self.unit,
            context: self.context,
            location: self.location,
            phase: self.phase,
            format: self.format,
        }
    }

    pub fn energy_wh(&self) -> Option<f64> {
        energy_wh(&self.measurand, &self.unit, self.value)
    }
}

impl MeterValue {
    /// The reading in Wh if this is an import energy register sample.
    pub fn energy_wh(&self) -> Option<f64> {
        energy_wh(&self.measurand, &self.unit, self.value)
    }
}

fn energy_wh(measurand: &str, unit: &str, value: f64) -> Option<f64> {
    if measurand != ENERGY_ACTIVE_IMPORT_REGISTER {
        return None;
    }
    match unit {
        "kWh" => Some(value * 1000.0),
        _ => Some(value),
    }
}
