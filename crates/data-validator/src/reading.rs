//! Reading Model

use crate::timestamp::{format_timestamp, parse_timestamp};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;

/// Flood-risk classification of the water surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WaterLevel {
    /// Water close to the sensor, flooding
    High,
    Low,
}

impl WaterLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaterLevel::High => "HIGH",
            WaterLevel::Low => "LOW",
        }
    }

    /// Case-insensitive lookup, `None` for anything that is not a level
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "HIGH" => Some(WaterLevel::High),
            "LOW" => Some(WaterLevel::Low),
            _ => None,
        }
    }
}

impl fmt::Display for WaterLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// System state derived from the water level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Normal,
    Alert,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Normal => "Normal",
            Status::Alert => "Alert",
        }
    }

    /// Case-insensitive lookup, `None` for anything that is not a status
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "normal" => Some(Status::Normal),
            "alert" => Some(Status::Alert),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified, timestamped sensor observation
///
/// Built once and never mutated; fields are read through accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    #[serde(with = "iso_millis")]
    timestamp: DateTime<Utc>,
    distance: f64,
    water_level: WaterLevel,
    status: Status,
}

impl Reading {
    /// Create a reading; the timestamp is truncated to millisecond precision
    pub fn new(
        timestamp: DateTime<Utc>,
        distance: f64,
        water_level: WaterLevel,
        status: Status,
    ) -> Self {
        Self {
            timestamp: timestamp.trunc_subsecs(3),
            distance,
            water_level,
            status,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Distance from sensor to water surface (cm)
    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn water_level(&self) -> WaterLevel {
        self.water_level
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_alert(&self) -> bool {
        self.status == Status::Alert
    }
}

mod iso_millis {
    use super::{format_timestamp, parse_timestamp};
    use chrono::{DateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp: {}", raw)))
    }
}

/// Loosely-typed inbound payload
///
/// Every field is kept as raw JSON so the normalizer can decide what counts
/// as missing, malformed or repairable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReading {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_level: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
}

impl RawReading {
    /// Payload carrying only a distance
    pub fn with_distance(distance: f64) -> Self {
        Self {
            distance: Number::from_f64(distance).map(Value::Number),
            ..Default::default()
        }
    }

    /// Pick the known fields out of an arbitrary JSON document
    ///
    /// Non-object documents yield an empty payload; `null` fields count as absent.
    pub fn from_value(value: &Value) -> Self {
        let field = |name: &str| value.get(name).filter(|v| !v.is_null()).cloned();
        Self {
            distance: field("distance"),
            timestamp: field("timestamp"),
            water_level: field("waterLevel"),
            status: field("status"),
        }
    }
}

impl From<&Reading> for RawReading {
    fn from(reading: &Reading) -> Self {
        Self {
            distance: Number::from_f64(reading.distance).map(Value::Number),
            timestamp: Some(Value::String(format_timestamp(&reading.timestamp))),
            water_level: Some(Value::String(reading.water_level.as_str().to_string())),
            status: Some(Value::String(reading.status.as_str().to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample() -> Reading {
        Reading::new(
            Utc.with_ymd_and_hms(2023, 7, 22, 4, 26, 40).unwrap(),
            8.5,
            WaterLevel::High,
            Status::Alert,
        )
    }

    #[test]
    fn test_wire_shape() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(
            value,
            json!({
                "timestamp": "2023-07-22T04:26:40.000Z",
                "distance": 8.5,
                "waterLevel": "HIGH",
                "status": "Alert",
            })
        );
    }

    #[test]
    fn test_deserialize_from_wire() {
        let reading: Reading = serde_json::from_value(json!({
            "timestamp": "2023-07-22T04:26:40.000Z",
            "distance": 8.5,
            "waterLevel": "HIGH",
            "status": "Alert",
        }))
        .unwrap();
        assert_eq!(reading, sample());
    }

    #[test]
    fn test_timestamp_truncated_to_millis() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
            + chrono::Duration::nanoseconds(1_234_567);
        let reading = Reading::new(ts, 20.0, WaterLevel::Low, Status::Normal);
        assert_eq!(reading.timestamp().timestamp_subsec_nanos(), 1_000_000);
    }

    #[test]
    fn test_enum_parse_is_lenient() {
        assert_eq!(WaterLevel::parse(" high "), Some(WaterLevel::High));
        assert_eq!(WaterLevel::parse("Low"), Some(WaterLevel::Low));
        assert_eq!(WaterLevel::parse("MEDIUM"), None);
        assert_eq!(Status::parse("ALERT"), Some(Status::Alert));
        assert_eq!(Status::parse(""), None);
    }

    #[test]
    fn test_raw_from_value() {
        let raw = RawReading::from_value(&json!({
            "distance": 42,
            "timestamp": null,
            "waterLevel": "LOW",
            "extra": true,
        }));
        assert_eq!(raw.distance, Some(json!(42)));
        assert_eq!(raw.timestamp, None);
        assert_eq!(raw.water_level, Some(json!("LOW")));
        assert_eq!(raw.status, None);

        assert_eq!(RawReading::from_value(&json!([1, 2, 3])), RawReading::default());
    }
}
