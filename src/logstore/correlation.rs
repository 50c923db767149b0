use crate::logstore::record::{field_text, fields, merge_fields, RawRecord};
use crate::logstore::repair::parse_lenient;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

pub const INCOMPLETE_PREFIX: &str =
    "This correlated record is probably not complete, or its message is not valid JSON : ";

/// Position of a record in the assembled page
enum Slot {
    Plain(RawRecord),
    Group(String),
}

/// Split `<groupId>-<index>` at the last dash. A non-numeric index means the
/// id is not a fragment marker.
fn parse_correlation_id(correlation_id: &str) -> Option<(String, u64)> {
    let (group, index) = correlation_id.rsplit_once('-')?;
    if group.is_empty() {
        return None;
    }
    let index = index.parse().ok()?;
    Some((group.to_string(), index))
}

/// Reassemble records the producer split into fragments.
///
/// Scoped to one page: fragments whose siblings landed on another page are
/// assembled from what is here. Uncorrelated records keep their order; each
/// group takes the position of its first fragment.
pub fn assemble(records: Vec<RawRecord>) -> Vec<RawRecord> {
    let mut slots = Vec::with_capacity(records.len());
    let mut groups: HashMap<String, BTreeMap<u64, RawRecord>> = HashMap::new();

    for record in records {
        let parsed = field_text(&record, fields::CORRELATION_ID)
            .as_deref()
            .and_then(parse_correlation_id);

        match parsed {
            Some((group, index)) => {
                groups
                    .entry(group.clone())
                    .or_insert_with(|| {
                        slots.push(Slot::Group(group));
                        BTreeMap::new()
                    })
                    .insert(index, record);
            }
            None => slots.push(Slot::Plain(record)),
        }
    }

    slots
        .into_iter()
        .filter_map(|slot| match slot {
            Slot::Plain(record) => Some(record),
            Slot::Group(group) => groups.remove(&group).and_then(|parts| merge_parts(&group, parts)),
        })
        .collect()
}

fn merge_parts(group: &str, parts: BTreeMap<u64, RawRecord>) -> Option<RawRecord> {
    let part_count = parts.len();
    let mut parts = parts.into_values();
    let mut merged = parts.next()?;

    let mut message = field_text(&merged, fields::MESSAGE).unwrap_or_default();
    for part in parts {
        if let Some(text) = field_text(&part, fields::MESSAGE) {
            message.push_str(&text);
        }
    }

    match parse_lenient(&message) {
        Ok(Value::Object(embedded)) => {
            merged.insert(fields::MESSAGE.to_string(), Value::String(message));
            merged = merge_fields(merged, embedded);
        }
        Ok(_) => {
            merged.insert(fields::MESSAGE.to_string(), Value::String(message));
        }
        Err(e) => {
            tracing::debug!(
                correlation_group = %group,
                parts = part_count,
                error = %e,
                "Correlated record did not parse as JSON"
            );
            merged.insert(
                fields::MESSAGE.to_string(),
                Value::String(format!("{}{}", INCOMPLETE_PREFIX, message)),
            );
        }
    }

    Some(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawRecord {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_parse_correlation_id() {
        assert_eq!(parse_correlation_id("G1-0"), Some(("G1".to_string(), 0)));
        assert_eq!(parse_correlation_id("a-b-12"), Some(("a-b".to_string(), 12)));
        assert_eq!(parse_correlation_id("abc"), None);
        assert_eq!(parse_correlation_id("abc-x"), None);
        assert_eq!(parse_correlation_id("-3"), None);
    }

    #[test]
    fn test_uncorrelated_pass_through_in_order() {
        let records = vec![raw(json!({"message": "a"})), raw(json!({"message": "b"}))];
        let assembled = assemble(records.clone());
        assert_eq!(assembled, records);
    }

    #[test]
    fn test_fragments_merge_invalid_json() {
        let records = vec![
            raw(json!({"correlationId": "G1-0", "message": "ab", "logger": "first"})),
            raw(json!({"correlationId": "G1-1", "message": "cd", "logger": "second"})),
        ];

        let assembled = assemble(records);

        assert_eq!(assembled.len(), 1);
        assert_eq!(assembled[0]["message"], format!("{}abcd", INCOMPLETE_PREFIX));
        assert_eq!(assembled[0]["logger"], "first");
    }

    #[test]
    fn test_fragments_merge_valid_json() {
        let records = vec![
            raw(json!({"correlationId": "G1-0", "message": r#"{"logLevel": "ERROR", "#})),
            raw(json!({"id": "x", "message": "plain"})),
            raw(json!({"correlationId": "G1-1", "message": r#""message": "done", "k": 1}"#})),
        ];

        let assembled = assemble(records);

        assert_eq!(assembled.len(), 2);
        assert_eq!(assembled[0]["logLevel"], "ERROR");
        assert_eq!(assembled[0]["message"], "done");
        assert_eq!(assembled[0]["k"], 1);
        assert_eq!(assembled[1]["message"], "plain");
    }

    #[test]
    fn test_fragments_sorted_numerically() {
        let mut records: Vec<RawRecord> = (0..11)
            .rev()
            .map(|i| raw(json!({"correlationId": format!("G-{}", i), "message": format!("{},", i)})))
            .collect();
        records.insert(0, raw(json!({"message": "head"})));

        let assembled = assemble(records);

        assert_eq!(assembled[0]["message"], "head");
        assert_eq!(
            assembled[1]["message"],
            format!("{}0,1,2,3,4,5,6,7,8,9,10,", INCOMPLETE_PREFIX)
        );
    }

    #[test]
    fn test_separate_groups_stay_separate() {
        let records = vec![
            raw(json!({"correlationId": "A-0", "message": "{\"v\":"})),
            raw(json!({"correlationId": "B-0", "message": "{\"w\":"})),
            raw(json!({"correlationId": "B-1", "message": "2}"})),
            raw(json!({"correlationId": "A-1", "message": "1}"})),
        ];

        let assembled = assemble(records);

        assert_eq!(assembled.len(), 2);
        assert_eq!(assembled[0]["v"], 1);
        assert_eq!(assembled[1]["w"], 2);
    }
}
