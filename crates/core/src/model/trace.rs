use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{LocatorError, Result};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Ok,
    Failed,
    Skipped,
    InProgress,
}

impl StepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::InProgress => "in_progress",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepStatus {
    type Err = LocatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ok" => Ok(Self::Ok),
            "failed" | "error" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            "in_progress" | "in-progress" => Ok(Self::InProgress),
            _ => Err(LocatorError::Parse(format!("unknown step status: {s}"))),
        }
    }
}

/// One span, as the engine presents it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Step {
    pub name: String,
    pub status: StepStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: i64,
    pub error: Option<String>,
    /// The span's tags, verbatim.
    pub data: Map<String, Value>,
    pub span_id: Option<String>,
    /// Reserved for nested rendering; reconstruction leaves this empty.
    pub children: Option<Vec<Step>>,
}

/// A request, reconstructed from every span the store returned for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trace {
    pub request_id: String,
    pub trace_id: String,
    pub timestamp: DateTime<Utc>,
    pub status: StepStatus,
    pub user_id: Option<String>,
    pub duration_ms: i64,
    pub steps: Vec<Step>,
    pub service: String,
    pub operation: Option<String>,
}

impl Trace {
    pub fn failed_steps(&self) -> impl Iterator<Item = &Step> {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Failed)
    }

    /// Error message of the earliest failed step.
    pub fn first_error(&self) -> Option<&str> {
        self.failed_steps().find_map(|s| s.error.as_deref())
    }
}
