use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A log entry exactly as the log store returned it
pub type RawRecord = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordType {
    AccessLog,
    TraceLog,
    #[serde(other)]
    Unknown,
}

impl RecordType {
    pub fn parse(value: &str) -> Self {
        match value {
            "ACCESS_LOG" => RecordType::AccessLog,
            "TRACE_LOG" => RecordType::TraceLog,
            _ => RecordType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::AccessLog => "ACCESS_LOG",
            RecordType::TraceLog => "TRACE_LOG",
            RecordType::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical log record.
///
/// Built once per raw entry by the normalization pipeline. Fields the
/// pipeline does not know about are carried in `extensions` untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub id: Option<String>,
    pub app_target_uri: String,
    pub record_type: Option<RecordType>,
    pub log_level: Option<String>,
    pub logger: Option<String>,
    pub message: String,
    pub stack_trace: Option<String>,
    pub correlation_id: Option<String>,
    pub thread_name: Option<String>,
    pub time: DateTime<Utc>,
    pub event_time: DateTime<Utc>,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

/// Wire names of the typed fields
pub mod fields {
    pub const ID: &str = "id";
    pub const APP_DEPLOYMENT_URI: &str = "appDeploymentUri";
    pub const APP_TARGET_URI: &str = "appTargetUri";
    pub const RECORD_TYPE: &str = "recordType";
    pub const LOG_LEVEL: &str = "logLevel";
    pub const LOGGER: &str = "logger";
    pub const MESSAGE: &str = "message";
    pub const STACK_TRACE: &str = "stackTrace";
    pub const CORRELATION_ID: &str = "correlationId";
    pub const THREAD_NAME: &str = "threadName";
    pub const TIME: &str = "time";
    pub const EVENT_TIME: &str = "eventTime";
    pub const TIMESTAMP: &str = "timestamp";
    pub const TRACE_ID: &str = "traceId";
}

/// Text of a JSON value, without quotes for strings.
///
/// `null` yields `None`.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Non-empty text of a raw field
pub fn field_text(raw: &RawRecord, name: &str) -> Option<String> {
    raw.get(name)
        .and_then(value_text)
        .filter(|text| !text.is_empty())
}

/// Shallow merge of `source` onto `target`, later keys winning
pub fn merge_fields(mut target: RawRecord, source: RawRecord) -> RawRecord {
    for (key, value) in source {
        target.insert(key, value);
    }
    target
}
