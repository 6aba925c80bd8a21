//! Timestamp Parsing and Formatting
//!
//! Sensors and browser forms send timestamps in whatever shape they have at
//! hand: epoch seconds, epoch milliseconds, RFC 3339 strings, bare dates or
//! the US-locale strings the spreadsheet stores. Everything lands here.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// Largest instant magnitude a timestamp may have, in milliseconds (±100M days)
pub const MAX_EPOCH_MILLIS: f64 = 8.64e15;

/// Formats accepted for timestamps that carry no offset (read as UTC)
const NAIVE_DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// US-locale layouts, as written by the spreadsheet adapter
pub const SHEET_FORMATS: &[&str] = &[
    "%m/%d/%Y, %I:%M:%S %p",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y, %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// RFC 3339 with a signed year beyond four digits (`+11476-08-15T05:20:00.000Z`)
const EXPANDED_YEAR_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%#z";

/// Parse a timestamp string in any of the supported layouts
///
/// Offset-aware layouts (RFC 3339, RFC 2822) are honored; everything else
/// is taken to be UTC. Returns `None` when nothing matches.
pub fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_rfc2822(input) {
        return Some(ts.with_timezone(&Utc));
    }
    if input.starts_with(|c: char| c == '+' || c == '-') {
        if let Ok(ts) = DateTime::parse_from_str(input, EXPANDED_YEAR_FORMAT) {
            return Some(ts.with_timezone(&Utc));
        }
    }

    parse_naive(input).map(|naive| naive.and_utc())
}

/// Parse a timestamp that carries no offset information
pub fn parse_naive(input: &str) -> Option<NaiveDateTime> {
    let input = input.trim();

    NAIVE_DATE_TIME_FORMATS
        .iter()
        .chain(SHEET_FORMATS)
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(input, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Convert an epoch number to an instant
///
/// Values below `seconds_cutoff` are epoch seconds, anything else is epoch
/// milliseconds. Sub-millisecond fractions are truncated.
pub fn from_epoch(value: f64, seconds_cutoff: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() {
        return None;
    }

    let millis = if value < seconds_cutoff {
        value * 1000.0
    } else {
        value
    }
    .trunc();

    if millis.abs() > MAX_EPOCH_MILLIS {
        return None;
    }

    DateTime::from_timestamp_millis(millis as i64)
}

/// Canonical ISO-8601 form: millisecond precision, `Z` designator
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike};

    #[test]
    fn test_rfc3339() {
        let ts = parse_timestamp("2024-03-01T10:00:00.123Z").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap() + chrono::Duration::milliseconds(123));

        let ts = parse_timestamp("2024-03-01T15:30:00+05:30").unwrap();
        assert_eq!(ts.hour(), 10);
    }

    #[test]
    fn test_bare_date_is_utc_midnight() {
        let ts = parse_timestamp("1999-01-01").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(1999, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_naive_and_sheet_layouts() {
        let ts = parse_timestamp("2024-06-05 07:08:09").unwrap();
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (7, 8, 9));

        let ts = parse_timestamp("06/05/2024, 07:08:09 PM").unwrap();
        assert_eq!((ts.month(), ts.day(), ts.hour()), (6, 5, 19));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("   ").is_none());
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("2024-13-45").is_none());
    }

    #[test]
    fn test_epoch_seconds_and_millis_agree() {
        let secs = from_epoch(1_690_000_000.0, 1e10).unwrap();
        let millis = from_epoch(1_690_000_000_000.0, 1e10).unwrap();
        assert_eq!(secs, millis);
        assert_eq!(secs.year(), 2023);
    }

    #[test]
    fn test_epoch_out_of_range() {
        assert!(from_epoch(f64::NAN, 1e10).is_none());
        assert!(from_epoch(1e17, 1e10).is_none());
    }

    #[test]
    fn test_format_millis() {
        let ts = Utc.with_ymd_and_hms(2023, 7, 22, 4, 26, 40).unwrap();
        assert_eq!(format_timestamp(&ts), "2023-07-22T04:26:40.000Z");
        assert_eq!(parse_timestamp(&format_timestamp(&ts)), Some(ts));
    }

    #[test]
    fn test_expanded_year_round_trip() {
        let ts = from_epoch(3e14, 1e10).unwrap();
        assert_eq!(ts.year(), 11476);

        let formatted = format_timestamp(&ts);
        assert!(formatted.starts_with('+'));
        assert_eq!(parse_timestamp(&formatted), Some(ts));
        assert_eq!(parse_timestamp("+011476-08-15T05:20:00.000Z"), Some(ts));
    }
}
