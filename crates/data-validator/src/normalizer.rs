//! Reading Normalizer
//!
//! Classifies a distance against the flood threshold, keeps caller-supplied
//! classifications, and repairs timestamps that are missing, unparseable or
//! implausibly old.

use crate::error::ValidationError;
use crate::reading::{RawReading, Reading, Status, WaterLevel};
use crate::timestamp;
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Normalizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Distances strictly below this are a flood (cm, default: 12)
    pub flood_threshold_cm: f64,
    /// Timestamps from before this year are replaced with "now"
    pub min_valid_year: i32,
    /// Epoch numbers below this are seconds, at or above are milliseconds
    pub epoch_seconds_cutoff: f64,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            flood_threshold_cm: 12.0, // matches the ESP32 firmware
            min_valid_year: 2020,
            epoch_seconds_cutoff: 10_000_000_000.0,
        }
    }
}

/// Stateless converter from raw payloads to [`Reading`]s
#[derive(Debug, Clone, Default)]
pub struct ReadingNormalizer {
    config: NormalizerConfig,
}

impl ReadingNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    /// Normalizer with a custom flood threshold and default timestamp rules
    pub fn with_threshold(flood_threshold_cm: f64) -> Self {
        Self::new(NormalizerConfig {
            flood_threshold_cm,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Classification implied by a distance alone
    pub fn classify(&self, distance_cm: f64) -> (WaterLevel, Status) {
        if distance_cm < self.config.flood_threshold_cm {
            (WaterLevel::High, Status::Alert)
        } else {
            (WaterLevel::Low, Status::Normal)
        }
    }

    /// Normalize against the current wall clock
    pub fn normalize(&self, raw: &RawReading) -> Result<Reading, ValidationError> {
        self.normalize_at(raw, Utc::now())
    }

    /// Normalize with `now` standing in for the current instant
    pub fn normalize_at(
        &self,
        raw: &RawReading,
        now: DateTime<Utc>,
    ) -> Result<Reading, ValidationError> {
        let distance = extract_distance(raw.distance.as_ref())?;
        let (calculated_level, calculated_status) = self.classify(distance);

        // Overrides are honored independently of each other
        let water_level = raw
            .water_level
            .as_ref()
            .and_then(|v| supplied(v, WaterLevel::parse))
            .unwrap_or(calculated_level);
        let status = raw
            .status
            .as_ref()
            .and_then(|v| supplied(v, Status::parse))
            .unwrap_or(calculated_status);

        let timestamp = self.resolve_timestamp(raw.timestamp.as_ref(), now);

        Ok(Reading::new(timestamp, distance, water_level, status))
    }

    /// Normalize an arbitrary JSON document
    pub fn normalize_value(&self, value: &Value) -> Result<Reading, ValidationError> {
        self.normalize(&RawReading::from_value(value))
    }

    fn resolve_timestamp(&self, raw: Option<&Value>, now: DateTime<Utc>) -> DateTime<Utc> {
        let Some(value) = raw.filter(|v| is_truthy(v)) else {
            return now;
        };

        let parsed = match value {
            Value::Number(n) => n
                .as_f64()
                .and_then(|v| timestamp::from_epoch(v, self.config.epoch_seconds_cutoff)),
            Value::String(s) => timestamp::parse_timestamp(s),
            _ => None,
        };

        match parsed {
            Some(ts) if ts.year() >= self.config.min_valid_year => ts,
            Some(ts) => {
                warn!(
                    "Timestamp too old (before {}): {} converted to {}, using current time",
                    self.config.min_valid_year,
                    value,
                    timestamp::format_timestamp(&ts)
                );
                now
            }
            None => {
                warn!("Invalid timestamp received: {}, using current time", value);
                now
            }
        }
    }
}

fn extract_distance(raw: Option<&Value>) -> Result<f64, ValidationError> {
    match raw {
        None | Some(Value::Null) => Err(ValidationError::MissingDistance),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| ValidationError::NonNumericDistance(n.to_string())),
        Some(other) => Err(ValidationError::NonNumericDistance(other.to_string())),
    }
}

/// Override value, if the caller really supplied one
fn supplied<T>(value: &Value, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
    let parsed = value.as_str().and_then(parse);
    if parsed.is_none() && is_truthy(value) {
        debug!("Ignoring unrecognized classification override: {}", value);
    }
    parsed
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |v| v != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
