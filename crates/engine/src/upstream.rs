use std::future::Future;
use std::time::Instant;

use locator_core::config::Config;
use locator_core::error::{LocatorError, Result};
use locator_core::model::RawTrace;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Backend-side search parameters. Bounds are microsecond epochs.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TraceQuery {
    pub service: String,
    pub start: i64,
    pub end: i64,
    pub limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
}

/// Query-only access to a tracing store: the three read paths the engine
/// needs plus the service listing. Implementations never mutate the store.
pub trait TraceStore: Send + Sync {
    /// `Ok(None)` when the store does not know the trace.
    fn fetch_trace(
        &self,
        trace_id: &str,
    ) -> impl Future<Output = Result<Option<RawTrace>>> + Send;

    fn find_traces(
        &self,
        query: &TraceQuery,
    ) -> impl Future<Output = Result<Vec<RawTrace>>> + Send;

    fn operations(&self, service: &str) -> impl Future<Output = Result<Vec<String>>> + Send;

    fn services(&self) -> impl Future<Output = Result<Vec<String>>> + Send;
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    data: Option<T>,
    #[serde(default)]
    errors: Option<Vec<EnvelopeError>>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeError {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    msg: Option<String>,
}

/// HTTP client for the Jaeger query service (`/api/...`).
#[derive(Debug, Clone)]
pub struct JaegerClient {
    http: Client,
    base_url: Url,
}

impl JaegerClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let base_url = Url::parse(cfg.jaeger_base_url.trim()).map_err(|e| {
            LocatorError::Config(format!(
                "invalid jaeger_base_url {}: {e}",
                cfg.jaeger_base_url
            ))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(LocatorError::Config(format!(
                "jaeger_base_url cannot be used as a base: {base_url}"
            )));
        }

        let http = Client::builder()
            .timeout(cfg.fetch_timeout)
            .build()
            .map_err(|e| LocatorError::Config(format!("failed to build http client: {e}")))?;

        Ok(Self { http, base_url })
    }

    /// Appends percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// GETs `url` and unwraps the `data` member. `Ok(None)` on 404.
    async fn get_data<T>(&self, url: Url, query: Option<&TraceQuery>) -> Result<Option<T>>
    where
        T: DeserializeOwned + Default,
    {
        let target = url.path().to_string();
        let started = Instant::now();

        let mut request = self.http.get(url);
        if let Some(query) = query {
            request = request.query(query);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(&target, started, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::debug!(path = %target, "upstream reported not found");
            return Ok(None);
        }
        if !status.is_success() {
            let message = match response.text().await {
                Ok(body) => truncate(&body, 512),
                Err(e) => format!("failed to read response body: {e}"),
            };
            return Err(LocatorError::Upstream {
                target,
                status: Some(status.as_u16()),
                message,
            });
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| transport_error(&target, started, e))?;

        if let Some(errors) = envelope.errors.filter(|e| !e.is_empty()) {
            for err in &errors {
                tracing::warn!(
                    path = %target,
                    code = ?err.code,
                    msg = err.msg.as_deref().unwrap_or(""),
                    "upstream returned partial errors"
                );
            }
        }

        tracing::debug!(
            path = %target,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "upstream request completed"
        );
        Ok(Some(envelope.data.unwrap_or_default()))
    }
}

impl TraceStore for JaegerClient {
    async fn fetch_trace(&self, trace_id: &str) -> Result<Option<RawTrace>> {
        let url = self.endpoint(&["api", "traces", trace_id]);
        let target = url.path().to_string();
        let data: Option<Vec<Value>> = self.get_data(url, None).await?;
        Ok(data.and_then(|items| decode_traces(&target, items).into_iter().next()))
    }

    async fn find_traces(&self, query: &TraceQuery) -> Result<Vec<RawTrace>> {
        let url = self.endpoint(&["api", "traces"]);
        let target = url.path().to_string();
        let data: Option<Vec<Value>> = self.get_data(url, Some(query)).await?;
        Ok(decode_traces(&target, data.unwrap_or_default()))
    }

    async fn operations(&self, service: &str) -> Result<Vec<String>> {
        let url = self.endpoint(&["api", "services", service, "operations"]);
        Ok(self.get_data(url, None).await?.unwrap_or_default())
    }

    async fn services(&self) -> Result<Vec<String>> {
        let url = self.endpoint(&["api", "services"]);
        Ok(self.get_data(url, None).await?.unwrap_or_default())
    }
}

/// Decodes each trace on its own; one undecodable entry only drops itself.
fn decode_traces(target: &str, items: Vec<Value>) -> Vec<RawTrace> {
    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value::<RawTrace>(item) {
            Ok(trace) => Some(trace),
            Err(e) => {
                tracing::warn!(path = %target, index, error = %e, "skipping undecodable trace");
                None
            }
        })
        .collect()
}

fn transport_error(target: &str, started: Instant, err: reqwest::Error) -> LocatorError {
    if err.is_timeout() {
        tracing::warn!(
            path = %target,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "upstream request timed out"
        );
        return LocatorError::UpstreamTimeout {
            target: target.to_string(),
            elapsed: started.elapsed(),
        };
    }
    tracing::warn!(path = %target, error = %err, "upstream request failed");
    LocatorError::Upstream {
        target: target.to_string(),
        status: err.status().map(|s| s.as_u16()),
        message: err.to_string(),
    }
}

fn truncate(body: &str, max: usize) -> String {
    if body.len() <= max {
        return body.to_string();
    }
    let mut end = max;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
