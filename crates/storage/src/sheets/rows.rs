//! Sheet Row Mapping
//!
//! One reading per row: `Timestamp | Distance (cm) | Water Level | Status`.
//! Timestamps are written the way a person in the configured timezone would
//! read them, so they are parsed back with the same offset.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use data_validator::timestamp::parse_naive;
use data_validator::{Reading, Status, WaterLevel};
use serde_json::{Number, Value};

/// Header row written by `initialize`
pub const HEADER: [&str; 4] = ["Timestamp", "Distance (cm)", "Water Level", "Status"];

/// US-locale 12-hour layout used for the timestamp column
pub const SHEET_TIMESTAMP_FORMAT: &str = "%m/%d/%Y, %I:%M:%S %p";

pub fn format_sheet_timestamp(ts: &DateTime<Utc>, offset: &FixedOffset) -> String {
    ts.with_timezone(offset)
        .format(SHEET_TIMESTAMP_FORMAT)
        .to_string()
}

/// Parse a timestamp cell; cells without an offset are in the sheet's timezone
pub fn parse_sheet_timestamp(raw: &str, offset: &FixedOffset) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    let naive = parse_naive(raw)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|ts| ts.with_timezone(&Utc))
}

pub fn to_row(reading: &Reading, offset: &FixedOffset) -> Vec<Value> {
    vec![
        Value::String(format_sheet_timestamp(&reading.timestamp(), offset)),
        Number::from_f64(reading.distance())
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Value::String(reading.water_level().as_str().to_string()),
        Value::String(reading.status().as_str().to_string()),
    ]
}

/// Rebuild a reading from a sheet row
///
/// Rows without a usable timestamp or distance are skipped. Blank
/// classification cells fall back to `LOW` / `Normal`.
pub fn from_row(row: &[Value], offset: &FixedOffset) -> Option<Reading> {
    let timestamp = row.first()?.as_str().and_then(|s| parse_sheet_timestamp(s, offset))?;
    let distance = row.get(1).and_then(cell_number)?;
    let water_level = row
        .get(2)
        .and_then(Value::as_str)
        .and_then(WaterLevel::parse)
        .unwrap_or(WaterLevel::Low);
    let status = row
        .get(3)
        .and_then(Value::as_str)
        .and_then(Status::parse)
        .unwrap_or(Status::Normal);

    Some(Reading::new(timestamp, distance, water_level, status))
}

/// Newest-first readings from a full `A:D` value range
///
/// The first row is the header. Only the last `limit` data rows are
/// considered, before invalid rows are dropped.
pub fn readings_from_rows(rows: &[Vec<Value>], limit: usize, offset: &FixedOffset) -> Vec<Reading> {
    let data = rows.get(1..).unwrap_or_default();
    let start = data.len().saturating_sub(limit);

    data[start..]
        .iter()
        .rev()
        .filter_map(|row| from_row(row, offset))
        .collect()
}

fn cell_number(cell: &Value) -> Option<f64> {
    match cell {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}
