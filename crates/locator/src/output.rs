use std::io::IsTerminal;

use chrono::SecondsFormat;
use locator_core::model::{StepStatus, Trace};
use locator_core::query::TraceSearchResult;
use owo_colors::OwoColorize;

pub fn print_trace_human(v: &Trace) {
    println!(
        "TRACE {} request={} status={} duration={}ms steps={} user={}",
        v.trace_id,
        v.request_id,
        status_label(v.status),
        v.duration_ms,
        v.steps.len(),
        v.user_id.as_deref().unwrap_or("-")
    );
    println!(
        "service={} operation=\"{}\" started={}",
        v.service,
        v.operation.as_deref().unwrap_or("-"),
        v.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    );

    for step in &v.steps {
        let offset = (step.start_time - v.timestamp).num_milliseconds();
        println!(
            "  +{offset}ms {} ({}ms) {}",
            step.name,
            step.duration_ms,
            status_label(step.status)
        );
        if let Some(error) = &step.error {
            println!("    error: {error}");
        }
    }
}

pub fn print_search_human(v: &TraceSearchResult) {
    for trace in &v.traces {
        println!(
            "{} trace={} status={} duration={}ms steps={} user={} root=\"{}\"",
            trace.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            trace.trace_id,
            status_label(trace.status),
            trace.duration_ms,
            trace.steps.len(),
            trace.user_id.as_deref().unwrap_or("-"),
            trace.operation.as_deref().unwrap_or("-")
        );
        if let Some(error) = trace.first_error() {
            println!("  error: {error}");
        }
    }
    if v.has_more {
        println!("-- {} traces (more available, raise --limit) --", v.total);
    } else {
        println!("-- {} traces --", v.total);
    }
}

pub fn print_names_human(kind: &str, names: &[String]) {
    for name in names {
        println!("{name}");
    }
    println!("-- {} {kind} --", names.len());
}

fn status_label(status: StepStatus) -> String {
    if !std::io::stdout().is_terminal() {
        return status.to_string();
    }
    match status {
        StepStatus::Ok => status.green().to_string(),
        StepStatus::Failed => status.red().to_string(),
        StepStatus::Skipped => status.bright_black().to_string(),
        StepStatus::InProgress => status.yellow().to_string(),
    }
}
