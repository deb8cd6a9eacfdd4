//! Usage analytics over execution history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bucket width for usage reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Hour,
    #[default]
    Day,
    Week,
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Granularity::Hour => write!(f, "hour"),
            Granularity::Day => write!(f, "day"),
            Granularity::Week => write!(f, "week"),
        }
    }
}

impl std::str::FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hour" => Ok(Granularity::Hour),
            "day" => Ok(Granularity::Day),
            "week" => Ok(Granularity::Week),
            other => Err(format!("invalid granularity: '{other}' (expected hour, day or week)")),
        }
    }
}

/// Run counts for one time bucket, or for the whole window in `totals`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageCounts {
    pub executions: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub paused: u64,
    pub running: u64,
    pub test_runs: u64,
    /// Runs per trigger source (`manual`, `webhook`, `test`, ...).
    #[serde(default)]
    pub by_source: std::collections::BTreeMap<String, u64>,
    /// Mean wall time of finished runs, if any finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_duration_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageBucket {
    /// Inclusive start of the bucket.
    pub period: DateTime<Utc>,
    #[serde(flatten)]
    pub counts: UsageCounts,
}

/// Usage between `start` and `end`, oldest bucket first. Empty buckets are omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageReport {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub granularity: Granularity,
    pub buckets: Vec<UsageBucket>,
    pub totals: UsageCounts,
}
