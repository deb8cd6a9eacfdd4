//! Query parameter extractors for list endpoints.

use chainflow_types::analytics::Granularity;
use chainflow_types::page::PageRequest;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};
use serde::Deserialize;
use uuid::Uuid;

/// `?limit=` for history listings (executions, deliveries, test runs).
#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    20
}

impl LimitQuery {
    /// Requested limit clamped to `1..=200`.
    pub fn clamped(&self) -> u32 {
        self.limit.clamp(1, 200)
    }
}

/// `?user_id=&page=&limit=` for workflow listings.
#[derive(Debug, Default, Deserialize)]
pub struct WorkflowListQuery {
    pub user_id: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl WorkflowListQuery {
    /// Page 1 of 20 unless asked otherwise; out-of-range values are clamped.
    pub fn page_request(&self) -> PageRequest {
        let default = PageRequest::default();
        PageRequest::new(self.page.unwrap_or(default.page), self.limit.unwrap_or(default.limit))
    }
}

/// `?start_date=&end_date=&granularity=&workflow_id=` for usage analytics.
///
/// Dates are RFC 3339 timestamps or plain `YYYY-MM-DD` days (UTC midnight).
#[derive(Debug, Default, Deserialize)]
pub struct UsageQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default)]
    pub granularity: Granularity,
    pub workflow_id: Option<Uuid>,
}

impl UsageQuery {
    pub const DEFAULT_WINDOW_DAYS: i64 = 30;

    /// The `[start, end)` window. Defaults to the last 30 days up to now.
    pub fn window(&self) -> Result<(DateTime<Utc>, DateTime<Utc>), String> {
        let end = match &self.end_date {
            Some(raw) => parse_date(raw, "end_date")?,
            None => Utc::now(),
        };
        let start = match &self.start_date {
            Some(raw) => parse_date(raw, "start_date")?,
            None => end - TimeDelta::days(Self::DEFAULT_WINDOW_DAYS),
        };
        if start >= end {
            return Err("start_date must be before end_date".to_string());
        }
        Ok((start, end))
    }
}

fn parse_date(raw: &str, field: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
        .map_err(|_| format!("{field} must be an RFC 3339 timestamp or YYYY-MM-DD, got '{raw}'"))
}

/// `?id=` on inbound webhook deliveries.
#[derive(Debug, Deserialize)]
pub struct WebhookDeliveryQuery {
    pub id: Option<String>,
}
