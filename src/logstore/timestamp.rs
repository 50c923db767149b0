use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimestampError {
    #[error("failed to parse timestamp '{value}' with format '{format}': {source}")]
    ParseError {
        value: String,
        format: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("timestamp '{0}' does not match any known format")]
    Unrecognized(String),

    #[error("epoch milliseconds {0} out of range")]
    OutOfRange(i64),
}

/// Tomcat access log: `[18/Jan/2019:09:55:40 +0100]`
const ACCESS_LOG_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";
/// `2019-01-19T12:10:06,734` with or without an offset
const COMMA_MILLIS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S,%3f";

/// Shapes an `eventTime` field arrives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTimeFormat {
    AccessLog,
    IsoUtc,
    CommaMillis,
}

impl EventTimeFormat {
    /// Pick the format by looking at the value's shape
    pub fn detect(value: &str) -> Self {
        if value.starts_with('[') {
            EventTimeFormat::AccessLog
        } else if value.ends_with('Z') {
            EventTimeFormat::IsoUtc
        } else {
            EventTimeFormat::CommaMillis
        }
    }

    pub fn parse(&self, value: &str) -> Result<DateTime<Utc>, TimestampError> {
        match self {
            EventTimeFormat::AccessLog => parse_access_log(value),
            EventTimeFormat::IsoUtc => parse_rfc3339(value),
            EventTimeFormat::CommaMillis => parse_comma_millis(value),
        }
    }
}

fn parse_access_log(value: &str) -> Result<DateTime<Utc>, TimestampError> {
    let trimmed = value.trim_start_matches('[').trim_end_matches(']');
    DateTime::parse_from_str(trimmed, ACCESS_LOG_FORMAT)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TimestampError::ParseError {
            value: value.to_string(),
            format: ACCESS_LOG_FORMAT.to_string(),
            source: e,
        })
}

fn parse_rfc3339(value: &str) -> Result<DateTime<Utc>, TimestampError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TimestampError::ParseError {
            value: value.to_string(),
            format: "rfc3339".to_string(),
            source: e,
        })
}

/// Comma-millis time with an optional offset.
///
/// A value without an offset is read as UTC, not as local time.
fn parse_comma_millis(value: &str) -> Result<DateTime<Utc>, TimestampError> {
    for zoned in [
        format!("{}%z", COMMA_MILLIS_FORMAT),
        format!("{}%:z", COMMA_MILLIS_FORMAT),
    ] {
        if let Ok(dt) = DateTime::parse_from_str(value, &zoned) {
            return Ok(dt.with_timezone(&Utc));
        }
    }

    // No offset: assume UTC
    NaiveDateTime::parse_from_str(value, COMMA_MILLIS_FORMAT)
        .map(|ndt| Utc.from_utc_datetime(&ndt))
        .map_err(|e| TimestampError::ParseError {
            value: value.to_string(),
            format: COMMA_MILLIS_FORMAT.to_string(),
            source: e,
        })
}

/// Parse an absolute time field: RFC 3339 text or epoch milliseconds.
pub fn parse_instant(value: &Value) -> Result<DateTime<Utc>, TimestampError> {
    match value {
        Value::String(text) => parse_rfc3339(text),
        Value::Number(number) => {
            let millis = number
                .as_i64()
                .or_else(|| number.as_f64().map(|f| f as i64))
                .ok_or_else(|| TimestampError::Unrecognized(number.to_string()))?;
            DateTime::from_timestamp_millis(millis).ok_or(TimestampError::OutOfRange(millis))
        }
        other => Err(TimestampError::Unrecognized(other.to_string())),
    }
}

/// Normalize an `eventTime` value, falling back to `fallback`.
///
/// Never fails: anything unparsable yields the fallback.
pub fn normalize_event_time(value: Option<&Value>, fallback: DateTime<Utc>) -> DateTime<Utc> {
    let text = match value {
        Some(Value::String(text)) if !text.is_empty() => text,
        Some(number @ Value::Number(_)) => return parse_instant(number).unwrap_or(fallback),
        _ => return fallback,
    };

    let format = EventTimeFormat::detect(text);
    match format.parse(text) {
        Ok(dt) => dt,
        Err(e) => {
            tracing::debug!(
                event_time = %text,
                format = ?format,
                error = %e,
                "Unparsable eventTime, using record time"
            );
            fallback
        }
    }
}
