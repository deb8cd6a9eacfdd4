//! Usage analytics: execution history folded into time buckets.

use std::collections::BTreeMap;

use chainflow_types::analytics::{Granularity, UsageBucket, UsageCounts, UsageReport};
use chainflow_types::error::RepositoryError;
use chainflow_types::execution::{ExecutionRecord, ExecutionStatus};
use chrono::{DateTime, Datelike, NaiveTime, TimeDelta, Timelike, Utc};
use uuid::Uuid;

use crate::repository::execution::ExecutionStore;

/// Start of the bucket `ts` falls in. Weeks start on Monday, all in UTC.
pub fn bucket_start(ts: DateTime<Utc>, granularity: Granularity) -> DateTime<Utc> {
    let date = ts.date_naive();
    match granularity {
        Granularity::Hour => date
            .and_time(NaiveTime::MIN)
            .and_utc()
            + TimeDelta::hours(i64::from(ts.hour())),
        Granularity::Day => date.and_time(NaiveTime::MIN).and_utc(),
        Granularity::Week => {
            let monday = date - TimeDelta::days(i64::from(date.weekday().num_days_from_monday()));
            monday.and_time(NaiveTime::MIN).and_utc()
        }
    }
}

#[derive(Default)]
struct Tally {
    counts: UsageCounts,
    duration_sum_ms: u64,
    finished: u64,
}

impl Tally {
    fn add(&mut self, record: &ExecutionRecord) {
        let counts = &mut self.counts;
        counts.executions += 1;
        match record.status {
            ExecutionStatus::Completed => counts.completed += 1,
            ExecutionStatus::Failed => counts.failed += 1,
            ExecutionStatus::Cancelled => counts.cancelled += 1,
            ExecutionStatus::Paused => counts.paused += 1,
            ExecutionStatus::Running => counts.running += 1,
        }
        if record.test_mode {
            counts.test_runs += 1;
        }
        *counts.by_source.entry(record.source.clone()).or_default() += 1;

        if let Some(completed_at) = record.completed_at {
            let ms = (completed_at - record.started_at).num_milliseconds().max(0) as u64;
            self.duration_sum_ms += ms;
            self.finished += 1;
        }
    }

    fn into_counts(self) -> UsageCounts {
        let mut counts = self.counts;
        counts.avg_duration_ms = (self.finished > 0).then(|| self.duration_sum_ms / self.finished);
        counts
    }
}

/// Fold `records` into a report. Records outside `[start, end)` are ignored.
pub fn summarize_usage(
    records: &[ExecutionRecord],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    granularity: Granularity,
) -> UsageReport {
    let mut buckets: BTreeMap<DateTime<Utc>, Tally> = BTreeMap::new();
    let mut totals = Tally::default();

    for record in records.iter().filter(|r| r.started_at >= start && r.started_at < end) {
        buckets
            .entry(bucket_start(record.started_at, granularity))
            .or_default()
            .add(record);
        totals.add(record);
    }

    UsageReport {
        start,
        end,
        granularity,
        buckets: buckets
            .into_iter()
            .map(|(period, tally)| UsageBucket {
                period,
                counts: tally.into_counts(),
            })
            .collect(),
        totals: totals.into_counts(),
    }
}

/// Load the window from `store` and summarize it.
pub async fn usage_report<E: ExecutionStore>(
    store: &E,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    granularity: Granularity,
    workflow_id: Option<&Uuid>,
) -> Result<UsageReport, RepositoryError> {
    let records = store.list_executions_between(start, end, workflow_id).await?;
    tracing::debug!(
        records = records.len(),
        %granularity,
        start = %start,
        end = %end,
        "summarizing execution usage"
    );
    Ok(summarize_usage(&records, start, end, granularity))
}
