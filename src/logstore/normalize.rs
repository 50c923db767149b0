use crate::logstore::record::{
    field_text, fields, merge_fields, value_text, LogRecord, RawRecord, RecordType,
};
use crate::logstore::repair::correct_envelope;
use crate::logstore::target::Target;
use crate::logstore::timestamp::{normalize_event_time, parse_instant};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Trace records written without a logger carry their real fields as a JSON
/// envelope in `message`. Unpack it onto the record; leave the record alone
/// if the envelope cannot be parsed even after repair.
pub fn unwrap_trace_envelope(raw: RawRecord) -> RawRecord {
    let is_trace = field_text(&raw, fields::RECORD_TYPE).as_deref() == Some("TRACE_LOG");
    if !is_trace || field_text(&raw, fields::LOGGER).is_some() {
        return raw;
    }
    let Some(message) = field_text(&raw, fields::MESSAGE) else {
        return raw;
    };

    let repaired = correct_envelope(&message);
    let body = match repaired.strip_suffix("\\n") {
        Some(stripped) => stripped,
        None => repaired.trim(),
    };

    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(envelope)) => merge_fields(raw, envelope),
        _ => raw,
    }
}

fn take_text(raw: &mut RawRecord, name: &str) -> Option<String> {
    raw.remove(name)
        .as_ref()
        .and_then(value_text)
        .filter(|text| !text.is_empty())
}

fn take_instant(raw: &mut RawRecord, name: &str) -> Option<DateTime<Utc>> {
    let value = raw.remove(name)?;
    match parse_instant(&value) {
        Ok(instant) => Some(instant),
        Err(e) => {
            tracing::debug!(field = name, error = %e, "Unparsable record time");
            None
        }
    }
}

/// Build the canonical record. The record is attributed to `target`
/// regardless of what the log store reported.
pub fn into_record(mut raw: RawRecord, target: &Target) -> LogRecord {
    raw.remove(fields::APP_DEPLOYMENT_URI);
    raw.remove(fields::APP_TARGET_URI);

    let timestamp = take_instant(&mut raw, fields::TIMESTAMP);
    let time = take_instant(&mut raw, fields::TIME)
        .or(timestamp)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    let event_time = normalize_event_time(raw.remove(fields::EVENT_TIME).as_ref(), time);

    LogRecord {
        id: take_text(&mut raw, fields::ID),
        app_target_uri: target.as_str().to_string(),
        record_type: take_text(&mut raw, fields::RECORD_TYPE).map(|t| RecordType::parse(&t)),
        log_level: take_text(&mut raw, fields::LOG_LEVEL),
        logger: take_text(&mut raw, fields::LOGGER),
        message: take_text(&mut raw, fields::MESSAGE).unwrap_or_default(),
        stack_trace: take_text(&mut raw, fields::STACK_TRACE),
        correlation_id: take_text(&mut raw, fields::CORRELATION_ID),
        thread_name: take_text(&mut raw, fields::THREAD_NAME),
        time,
        event_time,
        timestamp,
        extensions: raw,
    }
}

/// Newest first, stable for equal times
pub fn sort_newest_first(records: &mut [LogRecord]) {
    records.sort_by(|a, b| b.event_time.cmp(&a.event_time));
}

/// Envelope unwrap, typed conversion, newest-first ordering
pub fn normalize_page(records: Vec<RawRecord>, target: &Target) -> Vec<LogRecord> {
    let mut normalized: Vec<LogRecord> = records
        .into_iter()
        .map(unwrap_trace_envelope)
        .map(|raw| into_record(raw, target))
        .collect();
    sort_newest_first(&mut normalized);
    normalized
}
