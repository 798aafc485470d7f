use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LocatorError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("upstream timeout after {}ms: {target}", .elapsed.as_millis())]
    UpstreamTimeout { target: String, elapsed: Duration },

    #[error("upstream error ({}): {target}: {message}", status_label(.status))]
    Upstream {
        target: String,
        status: Option<u16>,
        message: String,
    },
}

impl LocatorError {
    /// Timeouts are the only condition a caller may sensibly retry as-is.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::UpstreamTimeout { .. })
    }
}

fn status_label(status: &Option<u16>) -> String {
    status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "no status".to_string())
}

pub type Result<T> = std::result::Result<T, LocatorError>;
