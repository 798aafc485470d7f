use std::collections::HashSet;

use chrono::Utc;
use locator_core::model::raw::{find_value, value_to_string};
use locator_core::model::{KeyValue, RawLog, RawSpan, RawTrace, Step, StepStatus, Trace};
use locator_core::time::from_epoch_micros;
use serde_json::{Map, Value};

/// Turns the unordered span set of one trace into a [`Trace`].
///
/// Reconstruction is pure: no I/O, no shared state. Malformed span data is
/// absorbed with defaults; the only "failure" is an empty span set.
#[derive(Debug, Clone)]
pub struct Reconstructor {
    service: String,
}

impl Reconstructor {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Returns `None` when the trace carries no spans.
    pub fn reconstruct(&self, raw: &RawTrace) -> Option<Trace> {
        let root = find_root(&raw.spans)?;

        let root_tag = |key: &str| root.tag(key).and_then(non_empty_string);
        let request_id = root_tag("request_id").unwrap_or_else(|| raw.trace_id.clone());
        let user_id = root_tag("user_id").or_else(|| root_tag("user"));

        let steps = extract_steps(&raw.spans);

        let status = if steps.iter().any(|s| s.status == StepStatus::Failed) {
            StepStatus::Failed
        } else {
            StepStatus::Ok
        };
        let timestamp = steps
            .iter()
            .map(|s| s.start_time)
            .min()
            .unwrap_or_else(Utc::now);
        let end = steps
            .iter()
            .filter_map(|s| s.end_time)
            .max()
            .unwrap_or(timestamp);
        let duration_ms = (end - timestamp).num_milliseconds().max(0);

        tracing::debug!(
            trace_id = %raw.trace_id,
            spans = raw.spans.len(),
            root = %root.span_id,
            status = %status,
            "trace reconstructed"
        );

        Some(Trace {
            request_id,
            trace_id: raw.trace_id.clone(),
            timestamp,
            status,
            user_id,
            duration_ms,
            steps,
            service: self.service.clone(),
            operation: root.operation_name.clone(),
        })
    }
}

/// First span with no parent inside this span set, else the first span.
///
/// A span counts as a root when it has no references at all, or when its
/// `CHILD_OF` parent is missing or was not fetched with the rest of the trace.
pub fn find_root(spans: &[RawSpan]) -> Option<&RawSpan> {
    let ids: HashSet<&str> = spans.iter().map(|s| s.span_id.as_str()).collect();
    spans
        .iter()
        .find(|span| {
            if span.references.is_empty() {
                return true;
            }
            match span.parent_span_id() {
                Some(parent) => !ids.contains(parent),
                None => true,
            }
        })
        .or_else(|| spans.first())
}

/// One step per span, ordered by the converted start time. Ties keep
/// backend order.
pub fn extract_steps(spans: &[RawSpan]) -> Vec<Step> {
    let mut steps: Vec<Step> = spans.iter().map(step_from_span).collect();
    steps.sort_by_key(|s| s.start_time);
    steps
}

fn step_from_span(span: &RawSpan) -> Step {
    let duration_us = span.duration.max(0);
    let start_time = from_epoch_micros(span.start_time);
    let end_time = from_epoch_micros(span.start_time.saturating_add(duration_us));

    let outcome = escalate_from_logs(outcome_from_tags(&span.tags), &span.logs);

    Step {
        name: span
            .operation_name
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        status: outcome.status,
        start_time,
        end_time: Some(end_time),
        duration_ms: duration_us / 1000,
        error: outcome.error,
        data: tag_map(&span.tags),
        span_id: (!span.span_id.is_empty()).then(|| span.span_id.clone()),
        children: None,
    }
}

/// Partial status of a step while its signals are folded in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepOutcome {
    pub status: StepStatus,
    pub error: Option<String>,
}

impl StepOutcome {
    fn fail(&mut self, message: Option<String>) {
        self.status = StepStatus::Failed;
        if self.error.is_none() {
            self.error = message;
        }
    }
}

/// First stage: span tags. `error=true` or an OpenTelemetry `ERROR` status
/// code marks the step failed.
pub fn outcome_from_tags(tags: &[KeyValue]) -> StepOutcome {
    let mut outcome = StepOutcome::default();

    let flagged = tags.iter().any(|t| match (t.key.as_str(), &t.value) {
        ("error", Value::Bool(b)) => *b,
        ("error", Value::String(s)) => s.eq_ignore_ascii_case("true"),
        ("otel.status_code", Value::String(s)) => s == "ERROR",
        _ => false,
    });

    if flagged {
        let message = tag_string(tags, "otel.status_description")
            .or_else(|| tag_string(tags, "error.message"));
        outcome.fail(message);
    }
    outcome
}

/// Second stage: span logs. Any log carrying an `error` or `exception` field
/// fails the step. Only upgrades; an existing message is kept.
pub fn escalate_from_logs(mut outcome: StepOutcome, logs: &[RawLog]) -> StepOutcome {
    for log in logs {
        if log.has_field("error") || log.has_field("exception") {
            let message = log
                .field("message")
                .and_then(non_empty_string)
                .or_else(|| log.field("error").and_then(non_empty_string));
            outcome.fail(message);
        }
    }
    outcome
}

fn tag_string(tags: &[KeyValue], key: &str) -> Option<String> {
    find_value(tags, key).and_then(non_empty_string)
}

fn non_empty_string(value: &Value) -> Option<String> {
    value_to_string(value).filter(|s| !s.is_empty())
}

fn tag_map(tags: &[KeyValue]) -> Map<String, Value> {
    tags.iter()
        .map(|t| (t.key.clone(), t.value.clone()))
        .collect()
}
