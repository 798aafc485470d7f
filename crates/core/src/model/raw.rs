use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const CHILD_OF: &str = "CHILD_OF";

/// One trace as returned by the Jaeger query API.
///
/// Every field is optional on the wire. Absent, `null` or mistyped values
/// decode to their defaults, and list elements that cannot be decoded are
/// skipped, so a sloppy span never fails the whole response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawTrace {
    #[serde(rename = "traceID", default, deserialize_with = "lenient_string")]
    pub trace_id: String,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub spans: Vec<RawSpan>,
    #[serde(default, deserialize_with = "lenient_map")]
    pub processes: HashMap<String, RawProcess>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawSpan {
    #[serde(rename = "traceID", default, deserialize_with = "lenient_string")]
    pub trace_id: String,
    #[serde(rename = "spanID", default, deserialize_with = "lenient_string")]
    pub span_id: String,
    #[serde(rename = "operationName", default, deserialize_with = "lenient_opt_string")]
    pub operation_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub references: Vec<RawReference>,
    #[serde(rename = "startTime", default, deserialize_with = "lenient_i64")]
    pub start_time: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub duration: i64,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub tags: Vec<KeyValue>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub logs: Vec<RawLog>,
    #[serde(rename = "processID", default, deserialize_with = "lenient_opt_string")]
    pub process_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawReference {
    #[serde(rename = "refType", default, deserialize_with = "lenient_string")]
    pub ref_type: String,
    #[serde(rename = "traceID", default, deserialize_with = "lenient_string")]
    pub trace_id: String,
    #[serde(rename = "spanID", default, deserialize_with = "lenient_string")]
    pub span_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct KeyValue {
    #[serde(default, deserialize_with = "lenient_string")]
    pub key: String,
    #[serde(rename = "type", default, deserialize_with = "lenient_opt_string")]
    pub value_type: Option<String>,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawLog {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub timestamp: i64,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub fields: Vec<KeyValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawProcess {
    #[serde(rename = "serviceName", default, deserialize_with = "lenient_string")]
    pub service_name: String,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub tags: Vec<KeyValue>,
}

impl RawSpan {
    /// First tag with the given key, in backend order.
    pub fn tag(&self, key: &str) -> Option<&Value> {
        find_value(&self.tags, key)
    }

    /// Span id named by the first `CHILD_OF` reference, if any.
    pub fn parent_span_id(&self) -> Option<&str> {
        self.references
            .iter()
            .find(|r| r.ref_type == CHILD_OF)
            .map(|r| r.span_id.as_str())
    }
}

impl RawLog {
    pub fn field(&self, key: &str) -> Option<&Value> {
        find_value(&self.fields, key)
    }

    pub fn has_field(&self, key: &str) -> bool {
        self.fields.iter().any(|f| f.key == key)
    }
}

/// First value with the given key, in backend order.
pub fn find_value<'a>(pairs: &'a [KeyValue], key: &str) -> Option<&'a Value> {
    pairs.iter().find(|kv| kv.key == key).map(|kv| &kv.value)
}

/// Renders a tag value the way it reads in the Jaeger UI: strings verbatim,
/// everything else as its JSON text.
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Decodes a list element by element, dropping the ones that do not fit `T`.
fn lenient_vec<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

fn lenient_map<'de, D, T>(deserializer: D) -> std::result::Result<HashMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Value::Object(entries) = Value::deserialize(deserializer)? else {
        return Ok(HashMap::new());
    };
    Ok(entries
        .into_iter()
        .filter_map(|(k, v)| serde_json::from_value(v).ok().map(|v| (k, v)))
        .collect())
}

/// Integers, floats (truncated, saturating) and numeric strings. Anything
/// else is 0.
fn lenient_i64<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .unwrap_or_default(),
        Value::String(s) => s.trim().parse::<f64>().map(|f| f as i64).unwrap_or_default(),
        _ => 0,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_opt_string(deserializer)?.unwrap_or_default())
}

fn lenient_opt_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_jaeger_trace_shape() {
        let raw = serde_json::json!({
            "traceID": "abc123",
            "spans": [{
                "traceID": "abc123",
                "spanID": "s2",
                "operationName": "llm_call",
                "references": [
                    {"refType": "FOLLOWS_FROM", "traceID": "abc123", "spanID": "s0"},
                    {"refType": "CHILD_OF", "traceID": "abc123", "spanID": "s1"}
                ],
                "startTime": 1_700_000_000_000_000i64,
                "duration": 1500,
                "tags": [{"key": "error", "type": "bool", "value": true}],
                "logs": [{"timestamp": 1_700_000_000_000_100i64, "fields": [
                    {"key": "event", "type": "string", "value": "exception"}
                ]}],
                "processID": "p1",
                "warnings": null
            }],
            "processes": {"p1": {"serviceName": "aiai-api", "tags": []}}
        });

        let trace: RawTrace = serde_json::from_value(raw).unwrap();
        assert_eq!(trace.trace_id, "abc123");
        let span = &trace.spans[0];
        assert_eq!(span.parent_span_id(), Some("s1"));
        assert_eq!(span.tag("error"), Some(&Value::Bool(true)));
        assert_eq!(
            span.logs[0].field("event"),
            Some(&Value::String("exception".to_string()))
        );
        assert_eq!(trace.processes["p1"].service_name, "aiai-api");
    }

    #[test]
    fn nulls_and_missing_fields_default() {
        let raw = serde_json::json!({
            "traceID": "t",
            "spans": [{"spanID": "a", "tags": null, "logs": null, "references": null}],
            "processes": null
        });

        let trace: RawTrace = serde_json::from_value(raw).unwrap();
        let span = &trace.spans[0];
        assert!(span.tags.is_empty());
        assert!(span.logs.is_empty());
        assert_eq!(span.parent_span_id(), None);
        assert_eq!(span.start_time, 0);
        assert_eq!(span.duration, 0);
        assert!(span.operation_name.is_none());
        assert!(trace.processes.is_empty());
    }

    #[test]
    fn malformed_elements_are_skipped() {
        let raw = serde_json::json!({
            "traceID": "t",
            "spans": [
                "not a span",
                {
                    "spanID": 42,
                    "operationName": "llm_call",
                    "startTime": 1.7e15,
                    "duration": "1500",
                    "references": [7, {"refType": "CHILD_OF", "spanID": "root"}],
                    "tags": [{"key": "error", "value": true}, "garbage", null],
                    "logs": [{"timestamp": 1.5, "fields": [{"key": "exception", "value": "x"}, 3]}, "bad"]
                }
            ],
            "processes": {"p1": "broken", "p2": {"serviceName": "aiai-api"}}
        });

        let trace: RawTrace = serde_json::from_value(raw).unwrap();
        assert_eq!(trace.spans.len(), 1);
        let span = &trace.spans[0];
        assert_eq!(span.span_id, "42");
        assert_eq!(span.start_time, 1_700_000_000_000_000);
        assert_eq!(span.duration, 1500);
        assert_eq!(span.parent_span_id(), Some("root"));
        assert_eq!(span.tags.len(), 1);
        assert_eq!(span.tag("error"), Some(&Value::Bool(true)));
        assert_eq!(span.logs.len(), 1);
        assert_eq!(span.logs[0].timestamp, 1);
        assert!(span.logs[0].has_field("exception"));
        assert_eq!(span.logs[0].fields.len(), 1);
        assert_eq!(trace.processes.len(), 1);
        assert_eq!(trace.processes["p2"].service_name, "aiai-api");
    }

    #[test]
    fn value_rendering() {
        assert_eq!(
            value_to_string(&Value::String("u-1".into())).as_deref(),
            Some("u-1")
        );
        assert_eq!(
            value_to_string(&serde_json::json!(42)).as_deref(),
            Some("42")
        );
        assert_eq!(value_to_string(&Value::Null), None);
    }
}
