use chrono::{DateTime, TimeZone, Utc};
use locator_core::model::raw::CHILD_OF;
use locator_core::model::{KeyValue, RawLog, RawReference, RawSpan, RawTrace};
use serde_json::Value;

/// 2026-02-01T00:00:00Z in microseconds.
pub const BASE_US: i64 = 1_769_904_000_000_000;

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()
}

pub struct SpanBuilder {
    span: RawSpan,
}

impl SpanBuilder {
    pub fn new(trace_id: &str, span_id: &str, operation: &str) -> Self {
        Self {
            span: RawSpan {
                trace_id: trace_id.to_string(),
                span_id: span_id.to_string(),
                operation_name: Some(operation.to_string()),
                process_id: Some("p1".to_string()),
                ..RawSpan::default()
            },
        }
    }

    pub fn child_of(self, parent: &str) -> Self {
        self.reference(CHILD_OF, parent)
    }

    pub fn follows_from(self, parent: &str) -> Self {
        self.reference("FOLLOWS_FROM", parent)
    }

    fn reference(mut self, ref_type: &str, parent: &str) -> Self {
        self.span.references.push(RawReference {
            ref_type: ref_type.to_string(),
            trace_id: self.span.trace_id.clone(),
            span_id: parent.to_string(),
        });
        self
    }

    /// Start and end in milliseconds after [`BASE_US`].
    pub fn at_ms(self, start_ms: i64, end_ms: i64) -> Self {
        self.at_us(start_ms * 1000, (end_ms - start_ms) * 1000)
    }

    pub fn at_us(mut self, start_offset_us: i64, duration_us: i64) -> Self {
        self.span.start_time = BASE_US + start_offset_us;
        self.span.duration = duration_us;
        self
    }

    pub fn tag(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.span.tags.push(kv(key, value.into()));
        self
    }

    pub fn log(mut self, fields: &[(&str, Value)]) -> Self {
        self.span.logs.push(RawLog {
            timestamp: self.span.start_time,
            fields: fields.iter().map(|(k, v)| kv(k, v.clone())).collect(),
        });
        self
    }

    pub fn build(self) -> RawSpan {
        self.span
    }
}

fn kv(key: &str, value: Value) -> KeyValue {
    let value_type = match &value {
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float64",
        Value::Number(_) => "int64",
        _ => "string",
    };
    KeyValue {
        key: key.to_string(),
        value_type: Some(value_type.to_string()),
        value,
    }
}

pub fn raw_trace(trace_id: &str, spans: Vec<RawSpan>) -> RawTrace {
    RawTrace {
        trace_id: trace_id.to_string(),
        spans,
        ..RawTrace::default()
    }
}

/// Root A (0-100ms), B child of A failing (10-40ms), C child of A (50-90ms).
pub fn sample_trace(trace_id: &str) -> RawTrace {
    raw_trace(
        trace_id,
        vec![
            SpanBuilder::new(trace_id, "b", "llm_call")
                .child_of("a")
                .at_ms(10, 40)
                .tag("error", true)
                .tag("otel.status_description", "upstream model timed out")
                .build(),
            SpanBuilder::new(trace_id, "c", "mcp_tool")
                .child_of("a")
                .at_ms(50, 90)
                .build(),
            SpanBuilder::new(trace_id, "a", "POST /chat")
                .at_ms(0, 100)
                .tag("request_id", "req-1")
                .tag("user_id", "alice")
                .build(),
        ],
    )
}

pub fn healthy_trace(trace_id: &str, user: &str) -> RawTrace {
    raw_trace(
        trace_id,
        vec![
            SpanBuilder::new(trace_id, "root", "POST /chat")
                .at_ms(0, 20)
                .tag("user_id", user)
                .build(),
            SpanBuilder::new(trace_id, "cls", "classifier")
                .child_of("root")
                .at_ms(2, 8)
                .build(),
        ],
    )
}

pub fn failed_trace(trace_id: &str, user: &str) -> RawTrace {
    raw_trace(
        trace_id,
        vec![
            SpanBuilder::new(trace_id, "root", "POST /chat")
                .at_ms(0, 30)
                .tag("user_id", user)
                .build(),
            SpanBuilder::new(trace_id, "tool", "mcp_tool")
                .child_of("root")
                .at_ms(5, 25)
                .tag("otel.status_code", "ERROR")
                .build(),
        ],
    )
}

/// Body returned by the Jaeger query API for trace lookups and searches.
pub fn jaeger_envelope(traces: &[RawTrace]) -> Value {
    serde_json::json!({
        "data": traces,
        "total": 0,
        "limit": 0,
        "offset": 0,
        "errors": null
    })
}

pub fn jaeger_list(items: &[&str]) -> Value {
    serde_json::json!({
        "data": items,
        "total": items.len(),
        "limit": 0,
        "offset": 0,
        "errors": null
    })
}
