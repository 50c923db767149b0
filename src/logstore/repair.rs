//! Repair of JSON envelopes whose string fields contain raw quotes.
//!
//! Some producers write free text into `message` or `stackTrace` without
//! escaping it, so the envelope stops being valid JSON. The repair finds the
//! value of one named field and escapes the bare quotes inside it.

use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;
use std::sync::OnceLock;

fn field_pattern(field: &str, following: Option<&str>) -> Result<Regex, regex::Error> {
    let pattern = match following {
        Some(next) => format!(
            r#""{}"\s*:\s*"(?P<value>.*)"\s*,\s*"{}""#,
            regex::escape(field),
            regex::escape(next)
        ),
        None => format!(r#""{}"\s*:\s*"(?P<value>.*)"\s*\}}"#, regex::escape(field)),
    };
    Regex::new(&pattern)
}

fn message_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| field_pattern("message", Some("traceId")).expect("message pattern is valid"))
}

fn stack_trace_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| field_pattern("stackTrace", None).expect("stackTrace pattern is valid"))
}

/// Escape unescaped `"` inside the value of `field`.
///
/// With `following`, the value runs up to the last `", "following"` on the
/// line; without it, up to the last `"}`. Only the captured value is
/// touched. When nothing matches the input is returned as is.
pub fn correct_json<'a>(json: &'a str, field: &str, following: Option<&str>) -> Cow<'a, str> {
    match field_pattern(field, following) {
        Ok(regex) => correct_with(json, &regex),
        Err(_) => Cow::Borrowed(json),
    }
}

/// Escape the bare quotes inside the `value` group of `regex`
fn correct_with<'a>(json: &'a str, regex: &Regex) -> Cow<'a, str> {
    let Some(value) = regex.captures(json).and_then(|caps| caps.name("value")) else {
        return Cow::Borrowed(json);
    };

    let escaped = escape_bare_quotes(value.as_str());
    if escaped == value.as_str() {
        return Cow::Borrowed(json);
    }

    let mut repaired = String::with_capacity(json.len() + escaped.len() - value.len());
    repaired.push_str(&json[..value.start()]);
    repaired.push_str(&escaped);
    repaired.push_str(&json[value.end()..]);
    Cow::Owned(repaired)
}

/// Prefix every `"` not already escaped with a backslash
fn escape_bare_quotes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut backslashes = 0usize;

    for c in text.chars() {
        match c {
            '\\' => backslashes += 1,
            '"' => {
                if backslashes % 2 == 0 {
                    out.push('\\');
                }
                backslashes = 0;
            }
            _ => backslashes = 0,
        }
        out.push(c);
    }

    out
}

/// Apply the standard repairs for trace envelopes
pub fn correct_envelope(json: &str) -> String {
    let json = correct_with(json, message_pattern());
    correct_with(&json, stack_trace_pattern()).into_owned()
}

/// Parse `text` as JSON, retrying once after envelope repair with raw
/// newlines escaped.
pub fn parse_lenient(text: &str) -> Result<Value, serde_json::Error> {
    match serde_json::from_str(text) {
        Ok(value) => Ok(value),
        Err(_) => {
            let repaired = correct_envelope(text).replace('\n', "\\n");
            serde_json::from_str(&repaired)
        }
    }
}
