use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{StepStatus, Trace};

pub const DEFAULT_LOOKBACK_SECS: i64 = 60 * 60;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TimeWindow {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

/// Concrete bounds sent to the tracing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn all() -> Self {
        Self {
            since: None,
            until: None,
        }
    }

    pub fn last(lookback: Duration, now: DateTime<Utc>) -> Self {
        Self {
            since: Some(now - lookback),
            until: Some(now),
        }
    }

    /// Missing end means `now`; missing start means one hour before the end.
    pub fn resolve(&self, now: DateTime<Utc>) -> ResolvedWindow {
        let end = self.until.unwrap_or(now);
        let start = self
            .since
            .unwrap_or(end - Duration::seconds(DEFAULT_LOOKBACK_SECS));
        ResolvedWindow { start, end }
    }
}

/// Filters on fields that only exist after reconstruction, so the store
/// cannot apply them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DerivedFilter {
    pub status: Option<StepStatus>,
    pub user_id: Option<String>,
}

impl DerivedFilter {
    pub fn matches(&self, trace: &Trace) -> bool {
        if let Some(status) = self.status
            && trace.status != status
        {
            return false;
        }
        if let Some(user) = &self.user_id
            && trace.user_id.as_deref() != Some(user.as_str())
        {
            return false;
        }
        true
    }
}
