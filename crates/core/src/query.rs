use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LocatorError, Result};
use crate::filter::{DerivedFilter, TimeWindow};
use crate::model::{StepStatus, Trace};

pub const DEFAULT_LIMIT: usize = 20;
pub const MAX_LIMIT: usize = 100;
pub const MAX_FAILED_HOURS: i64 = 24;
pub const MAX_RECENT_MINUTES: i64 = 1440;
pub const DEFAULT_RECENT_MINUTES: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceSearchParams {
    pub window: TimeWindow,
    pub status: Option<StepStatus>,
    pub user_id: Option<String>,
    pub operation: Option<String>,
    pub limit: usize,
}

impl Default for TraceSearchParams {
    fn default() -> Self {
        Self {
            window: TimeWindow::all(),
            status: None,
            user_id: None,
            operation: None,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl TraceSearchParams {
    /// Failed requests over the last `hours` (1..=24).
    pub fn failed_in_last_hours(hours: i64, limit: usize) -> Result<Self> {
        if !(1..=MAX_FAILED_HOURS).contains(&hours) {
            return Err(LocatorError::InvalidArgument(format!(
                "hours must be between 1 and {MAX_FAILED_HOURS}, got {hours}"
            )));
        }
        Ok(Self {
            window: TimeWindow::last(Duration::hours(hours), Utc::now()),
            status: Some(StepStatus::Failed),
            limit,
            ..Self::default()
        })
    }

    /// Any request over the last `minutes` (1..=1440).
    pub fn recent_in_last_minutes(minutes: i64, limit: usize) -> Result<Self> {
        if !(1..=MAX_RECENT_MINUTES).contains(&minutes) {
            return Err(LocatorError::InvalidArgument(format!(
                "minutes must be between 1 and {MAX_RECENT_MINUTES}, got {minutes}"
            )));
        }
        Ok(Self {
            window: TimeWindow::last(Duration::minutes(minutes), Utc::now()),
            limit,
            ..Self::default()
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_LIMIT).contains(&self.limit) {
            return Err(LocatorError::InvalidArgument(format!(
                "limit must be between 1 and {MAX_LIMIT}, got {}",
                self.limit
            )));
        }
        Ok(())
    }

    pub fn derived_filter(&self) -> DerivedFilter {
        DerivedFilter {
            status: self.status,
            user_id: self.user_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceSearchResult {
    /// Traces on this page after client-side filtering. Not a count across
    /// the whole store.
    pub total: usize,
    pub traces: Vec<Trace>,
    pub has_more: bool,
}

impl TraceSearchResult {
    /// Truncates the filtered page to `limit` entries.
    pub fn page(mut matched: Vec<Trace>, limit: usize) -> Self {
        let has_more = matched.len() > limit;
        matched.truncate(limit);
        Self {
            total: matched.len(),
            traces: matched,
            has_more,
        }
    }
}
