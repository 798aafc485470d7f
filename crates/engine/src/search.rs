use chrono::Utc;
use locator_core::config::Config;
use locator_core::error::{LocatorError, Result};
use locator_core::model::Trace;
use locator_core::query::{TraceSearchParams, TraceSearchResult};
use locator_core::time::to_epoch_micros;

use crate::reconstruct::Reconstructor;
use crate::upstream::{JaegerClient, TraceQuery, TraceStore};

/// Single-trace lookup and filtered search over a [`TraceStore`].
///
/// Holds no mutable state: every call is one upstream round-trip followed by
/// pure reconstruction, so a service can be shared freely across tasks.
#[derive(Debug, Clone)]
pub struct TraceSearchService<S> {
    store: S,
    reconstructor: Reconstructor,
}

impl TraceSearchService<JaegerClient> {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        Ok(Self::new(JaegerClient::new(cfg)?, cfg.service_name.clone()))
    }
}

impl<S: TraceStore> TraceSearchService<S> {
    pub fn new(store: S, service_name: impl Into<String>) -> Self {
        Self {
            store,
            reconstructor: Reconstructor::new(service_name),
        }
    }

    pub fn service_name(&self) -> &str {
        self.reconstructor.service()
    }

    /// `Ok(None)` when the store has no such trace or it has no spans.
    pub async fn get_trace(&self, trace_id: &str) -> Result<Option<Trace>> {
        let trace_id = trace_id.trim();
        if trace_id.is_empty() {
            return Err(LocatorError::InvalidArgument(
                "trace id cannot be empty".to_string(),
            ));
        }

        tracing::info!(trace_id, "fetching trace");
        let Some(mut raw) = self.store.fetch_trace(trace_id).await? else {
            tracing::warn!(trace_id, "trace not found");
            return Ok(None);
        };
        if raw.trace_id.is_empty() {
            raw.trace_id = trace_id.to_string();
        }

        let trace = self.reconstructor.reconstruct(&raw);
        if trace.is_none() {
            tracing::warn!(trace_id, "trace has no spans");
        }
        Ok(trace)
    }

    /// Backend filters on service, window and operation; status and user are
    /// derived, so they are applied here after reconstruction.
    pub async fn search_traces(&self, params: &TraceSearchParams) -> Result<TraceSearchResult> {
        params.validate()?;

        let window = params.window.resolve(Utc::now());
        let query = TraceQuery {
            service: self.service_name().to_string(),
            start: to_epoch_micros(window.start),
            end: to_epoch_micros(window.end),
            limit: params.limit,
            operation: params.operation.clone(),
        };
        tracing::info!(
            service = %query.service,
            start = query.start,
            end = query.end,
            limit = query.limit,
            operation = query.operation.as_deref().unwrap_or("*"),
            "searching traces"
        );

        let raw_traces = self.store.find_traces(&query).await?;
        let fetched = raw_traces.len();

        let filter = params.derived_filter();
        let matched = raw_traces
            .iter()
            .filter_map(|raw| self.reconstructor.reconstruct(raw))
            .filter(|trace| filter.matches(trace))
            .collect::<Vec<_>>();

        tracing::debug!(
            fetched,
            matched = matched.len(),
            dropped = fetched - matched.len(),
            "trace search filtered"
        );
        Ok(TraceSearchResult::page(matched, params.limit))
    }

    pub async fn list_operations(&self) -> Result<Vec<String>> {
        self.list_operations_for(None).await
    }

    /// Operations of `service`, or of the configured service when `None`.
    pub async fn list_operations_for(&self, service: Option<&str>) -> Result<Vec<String>> {
        let service = service.unwrap_or(self.service_name());
        self.store.operations(service).await
    }

    pub async fn list_services(&self) -> Result<Vec<String>> {
        self.store.services().await
    }
}
