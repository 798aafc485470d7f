use locator_core::Result;
use locator_core::model::Trace;
use locator_core::query::{TraceSearchParams, TraceSearchResult};
use locator_engine::{TraceSearchService, TraceStore};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ApiRequest {
    Trace { trace_id: String },
    Search(TraceSearchParams),
    Operations { service: Option<String> },
    Services,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ApiResponse {
    Trace(Trace),
    NotFound { trace_id: String },
    Search(TraceSearchResult),
    Operations(Vec<String>),
    Services(Vec<String>),
}

pub async fn execute<S: TraceStore>(
    service: &TraceSearchService<S>,
    request: ApiRequest,
) -> Result<ApiResponse> {
    let response = match request {
        ApiRequest::Trace { trace_id } => match service.get_trace(&trace_id).await? {
            Some(trace) => ApiResponse::Trace(trace),
            None => ApiResponse::NotFound { trace_id },
        },
        ApiRequest::Search(params) => ApiResponse::Search(service.search_traces(&params).await?),
        ApiRequest::Operations { service: name } => {
            ApiResponse::Operations(service.list_operations_for(name.as_deref()).await?)
        }
        ApiRequest::Services => ApiResponse::Services(service.list_services().await?),
    };
    Ok(response)
}
