use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateArgError {
    #[error("unrecognized date '{0}', expected RFC 3339, YYYY-MM-DDTHH:MM:SS, YYYY-MM-DD, <n>m or <n>h")]
    Unrecognized(String),

    #[error("relative date '{0}' is out of range")]
    OutOfRange(String),
}

/// Parse a `--since`/`--until` argument. Relative forms count back from `now`;
/// naive values are taken as UTC.
pub fn parse_date_arg(value: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, DateArgError> {
    let value = value.trim();

    if let Some(relative) = parse_relative(value) {
        let delta = relative.ok_or_else(|| DateArgError::OutOfRange(value.to_string()))?;
        return now
            .checked_sub_signed(delta)
            .ok_or_else(|| DateArgError::OutOfRange(value.to_string()));
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }

    Err(DateArgError::Unrecognized(value.to_string()))
}

/// `Some(None)` when the value is relative but does not fit a duration
fn parse_relative(value: &str) -> Option<Option<Duration>> {
    let (unit_start, _) = value.char_indices().last()?;
    let (amount, unit) = value.split_at(unit_start);
    if amount.is_empty() || !amount.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: i64 = match amount.parse() {
        Ok(amount) => amount,
        Err(_) => return Some(None),
    };

    match unit {
        "m" => Some(Duration::try_minutes(amount)),
        "h" => Some(Duration::try_hours(amount)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_relative_minutes_and_hours() {
        assert_eq!(
            parse_date_arg("15m", now()).unwrap(),
            Utc.with_ymd_and_hms(2021, 3, 10, 11, 45, 0).unwrap()
        );
        assert_eq!(
            parse_date_arg("2h", now()).unwrap(),
            Utc.with_ymd_and_hms(2021, 3, 10, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_absolute_forms() {
        assert_eq!(
            parse_date_arg("2021-03-01T08:30:00+01:00", now()).unwrap(),
            Utc.with_ymd_and_hms(2021, 3, 1, 7, 30, 0).unwrap()
        );
        assert_eq!(
            parse_date_arg("2021-03-01T08:30:00", now()).unwrap(),
            Utc.with_ymd_and_hms(2021, 3, 1, 8, 30, 0).unwrap()
        );
        assert_eq!(
            parse_date_arg("2021-03-01", now()).unwrap(),
            Utc.with_ymd_and_hms(2021, 3, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            parse_date_arg("yesterday", now()),
            Err(DateArgError::Unrecognized(_))
        ));
        assert!(parse_date_arg("5d", now()).is_err());
        assert!(parse_date_arg("m", now()).is_err());
        assert!(parse_date_arg("", now()).is_err());
    }

    #[test]
    fn test_relative_overflow() {
        assert!(matches!(
            parse_date_arg("99999999999999999h", now()),
            Err(DateArgError::OutOfRange(_))
        ));
    }
}
