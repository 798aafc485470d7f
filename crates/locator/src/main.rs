mod output;
mod protocol;
mod telemetry;

use std::process::ExitCode;

use anyhow::Context;
use base64::Engine;
use clap::{Parser, Subcommand};
use locator_core::config::Config;
use locator_core::filter::TimeWindow;
use locator_core::model::StepStatus;
use locator_core::query::{DEFAULT_RECENT_MINUTES, TraceSearchParams};
use locator_core::time::{parse_duration_str, parse_time_or_relative};
use locator_engine::TraceSearchService;

use crate::output::{print_names_human, print_search_human, print_trace_human};
use crate::protocol::{ApiRequest, ApiResponse, execute};
use crate::telemetry::{init_tracing, shutdown_tracing};

#[derive(Parser, Debug)]
#[command(name = "locator")]
#[command(about = "Reconstruct and search request traces from Jaeger")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true, help = "Jaeger query base URL")]
    base_url: Option<String>,

    #[arg(long, global = true, help = "Service whose traces are searched")]
    service: Option<String>,

    #[arg(long, global = true, help = "Upstream request timeout (e.g. 10s)")]
    timeout: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Reconstruct a single trace")]
    Trace { trace_id: String },
    #[command(about = "Search traces in a time window")]
    Search {
        #[arg(long)]
        since: Option<String>,
        #[arg(long)]
        until: Option<String>,
        #[arg(long, help = "ok, failed, skipped or in_progress")]
        status: Option<String>,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        operation: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    #[command(about = "Failed requests over the last N hours")]
    Failed {
        #[arg(long, default_value_t = 1)]
        hours: i64,
        #[arg(long)]
        limit: Option<usize>,
    },
    #[command(about = "Requests over the last N minutes")]
    Recent {
        #[arg(long, default_value_t = DEFAULT_RECENT_MINUTES)]
        minutes: i64,
        #[arg(long)]
        limit: Option<usize>,
    },
    #[command(about = "List operation names of a service")]
    Operations {
        #[arg(value_name = "SERVICE", help = "Defaults to the configured service")]
        of: Option<String>,
    },
    #[command(about = "List services known to the tracing store")]
    Services,
    #[command(about = "Execute a previously emitted handle")]
    Handle { handle: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing();
    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let cfg = resolve_config(cli.base_url, cli.service, cli.timeout)?;
    let limit = |v: Option<usize>| v.unwrap_or(cfg.default_limit);

    let (request, replayed) = match cli.command {
        Commands::Trace { trace_id } => (ApiRequest::Trace { trace_id }, false),
        Commands::Search {
            since,
            until,
            status,
            user,
            operation,
            limit: n,
        } => {
            let params = TraceSearchParams {
                window: parse_window(since, until)?,
                status: parse_status(status)?,
                user_id: user,
                operation,
                limit: limit(n),
            };
            (ApiRequest::Search(params), false)
        }
        Commands::Failed { hours, limit: n } => (
            ApiRequest::Search(TraceSearchParams::failed_in_last_hours(hours, limit(n))?),
            false,
        ),
        Commands::Recent { minutes, limit: n } => (
            ApiRequest::Search(TraceSearchParams::recent_in_last_minutes(
                minutes,
                limit(n),
            )?),
            false,
        ),
        Commands::Operations { of } => (ApiRequest::Operations { service: of }, false),
        Commands::Services => (ApiRequest::Services, false),
        Commands::Handle { handle } => (decode_handle(&handle)?, true),
    };

    let handle = encode_handle(&request)?;
    let service = TraceSearchService::from_config(&cfg).context("create jaeger client")?;
    let response = execute(&service, request).await?;
    let code = print_response(&response, cli.json)?;
    if !cli.json && !replayed && code == ExitCode::SUCCESS {
        println!("handle={handle}");
    }
    Ok(code)
}

/// Config file and environment first, then command-line flags.
fn resolve_config(
    base_url: Option<String>,
    service: Option<String>,
    timeout: Option<String>,
) -> anyhow::Result<Config> {
    let mut cfg = Config::load().context("load configuration")?;
    if let Some(base_url) = base_url {
        cfg.jaeger_base_url = base_url;
    }
    if let Some(service) = service {
        cfg.service_name = service;
    }
    if let Some(timeout) = timeout {
        cfg.fetch_timeout = parse_duration_str(&timeout)?;
    }
    Ok(cfg)
}

fn parse_window(since: Option<String>, until: Option<String>) -> anyhow::Result<TimeWindow> {
    let since = since.map(|v| parse_time_or_relative(&v)).transpose()?;
    let until = until.map(|v| parse_time_or_relative(&v)).transpose()?;
    Ok(TimeWindow { since, until })
}

fn parse_status(status: Option<String>) -> anyhow::Result<Option<StepStatus>> {
    Ok(status.map(|s| s.parse::<StepStatus>()).transpose()?)
}

fn encode_handle(req: &ApiRequest) -> anyhow::Result<String> {
    let payload = serde_json::to_vec(req)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(payload))
}

fn decode_handle(handle: &str) -> anyhow::Result<ApiRequest> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(handle.trim())
        .context("handle is not valid base64")?;
    serde_json::from_slice(&bytes).context("handle does not describe a request")
}

fn print_response(response: &ApiResponse, json: bool) -> anyhow::Result<ExitCode> {
    if let ApiResponse::NotFound { trace_id } = response {
        eprintln!("trace not found: {trace_id}");
        return Ok(ExitCode::FAILURE);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(response)?);
        return Ok(ExitCode::SUCCESS);
    }

    match response {
        ApiResponse::Trace(v) => print_trace_human(v),
        ApiResponse::Search(v) => print_search_human(v),
        ApiResponse::Operations(v) => print_names_human("operations", v),
        ApiResponse::Services(v) => print_names_human("services", v),
        ApiResponse::NotFound { .. } => {}
    }
    Ok(ExitCode::SUCCESS)
}
