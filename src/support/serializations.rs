//! Helpers for moving OCPP enums between rust-ocpp types and storage strings.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// The JSON wire name of a unit-variant enum (e.g. `ChargePointStatus::Preparing` → `"Preparing"`).
pub fn wire_name<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(Value::String(s)) => s,
        Ok(other) => other.to_string(),
        Err(_) => String::new(),
    }
}

/// Inverse of [`wire_name`].
pub fn from_wire_name<T: DeserializeOwned>(name: &str) -> Option<T> {
    serde_json::from_value(Value::String(name.to_string())).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_ocpp::v1_6::types::{ChargePointErrorCode, ChargePointStatus};

    #[test]
    fn wire_names_follow_ocpp_spelling() {
        assert_eq!(wire_name(&ChargePointStatus::SuspendedEV), "SuspendedEV");
        assert_eq!(wire_name(&ChargePointErrorCode::NoError), "NoError");
    }

    #[test]
    fn wire_names_parse_back() {
        let status: Option<ChargePointStatus> = from_wire_name("Preparing");
        assert_eq!(status, Some(ChargePointStatus::Preparing));
        assert!(from_wire_name::<ChargePointStatus>("Sleeping").is_none());
    }
}
