use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::errors::{DamError, DamResult, ErrorKind};

use super::{DATETIME_FORMAT, DATETIME_MINUTES_FORMAT, DATETIME_PATTERN};

static DATETIME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(DATETIME_PATTERN).expect("datetime pattern is a valid regex"));

fn invalid(value: &Value) -> DamError {
    log::error!("Invalid datetime value {}", value);
    DamError::new(
        &format!(
            "Invalid datetime value {}, expected YYYY-MM-DDTHH:MM or YYYY-MM-DDTHH:MM:SS",
            value
        ),
        ErrorKind::ValidationError,
    )
}

/// Parses a datetime filter operand.
///
/// # Errors
///
/// Returns [ErrorKind::ValidationError] when `value` is not a string of the
/// form `YYYY-MM-DDTHH:MM[:SS]` or names an impossible calendar date.
pub fn parse_datetime(value: &Value) -> DamResult<NaiveDateTime> {
    let Value::String(text) = value else {
        return Err(invalid(value));
    };
    if !DATETIME_REGEX.is_match(text) {
        return Err(invalid(value));
    }
    NaiveDateTime::parse_from_str(text, DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, DATETIME_MINUTES_FORMAT))
        .map_err(|_| invalid(value))
}

/// Validates a datetime operand and rewrites it with seconds precision.
pub fn normalize_datetime(value: &Value) -> DamResult<Value> {
    let parsed = parse_datetime(value)?;
    Ok(Value::String(parsed.format(DATETIME_FORMAT).to_string()))
}

/// Best-effort parse of a datetime as stored in a document.
///
/// Accepts RFC 3339 timestamps, ISO datetimes with optional fractional
/// seconds or minutes precision, and plain dates.
pub fn parse_stored_datetime(value: &Value) -> Option<NaiveDateTime> {
    let Value::String(text) = value else {
        return None;
    };
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.naive_utc());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", DATETIME_FORMAT, DATETIME_MINUTES_FORMAT]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_adds_seconds() {
        assert_eq!(
            normalize_datetime(&json!("2021-03-04T10:20")).unwrap(),
            json!("2021-03-04T10:20:00")
        );
        assert_eq!(
            normalize_datetime(&json!("2021-03-04T10:20:30")).unwrap(),
            json!("2021-03-04T10:20:30")
        );
    }

    #[test]
    fn malformed_datetimes_are_validation_errors() {
        for value in [
            json!("2021-03-04"),
            json!("2021-03-04 10:20"),
            json!("2021-13-04T10:20"),
            json!("2021-02-30T10:20:00"),
            json!("2021-03-04T10:20:00Z"),
            json!(20210304),
            Value::Null,
        ] {
            let err = normalize_datetime(&value).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::ValidationError, "value {}", value);
        }
    }

    #[test]
    fn stored_datetimes_accept_common_shapes() {
        let expected = NaiveDate::from_ymd_opt(2020, 1, 2)
            .and_then(|d| d.and_hms_opt(3, 4, 5))
            .unwrap();
        assert_eq!(parse_stored_datetime(&json!("2020-01-02T03:04:05")), Some(expected));
        assert_eq!(parse_stored_datetime(&json!("2020-01-02T03:04:05.250")).map(|d| d.date()), Some(expected.date()));
        assert_eq!(parse_stored_datetime(&json!("2020-01-02T03:04:05+00:00")), Some(expected));
        assert!(parse_stored_datetime(&json!("2020-01-02")).is_some());
        assert!(parse_stored_datetime(&json!("yesterday")).is_none());
        assert!(parse_stored_datetime(&json!(5)).is_none());
    }
}
