use super::nullable;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A time-bucketed aggregate of an endpoint.
///
/// Missing and `null` numbers are read as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricSample {
    #[serde(deserialize_with = "nullable")]
    pub timestamp: String,
    #[serde(deserialize_with = "nullable")]
    pub tasks_submitted: f64,
    #[serde(deserialize_with = "nullable")]
    pub tasks_completed: f64,
    #[serde(deserialize_with = "nullable")]
    pub tasks_failed: f64,
    #[serde(deserialize_with = "nullable")]
    pub tasks_retried: f64,
    #[serde(deserialize_with = "nullable")]
    pub cold_starts: f64,
    #[serde(deserialize_with = "nullable")]
    pub avg_cold_start_ms: f64,
    #[serde(deserialize_with = "nullable")]
    pub active_workers: f64,
    #[serde(deserialize_with = "nullable")]
    pub idle_workers: f64,
    /// Percent.
    #[serde(deserialize_with = "nullable")]
    pub avg_worker_utilization: f64,
    #[serde(deserialize_with = "nullable")]
    pub avg_idle_duration_sec: f64,
    #[serde(deserialize_with = "nullable")]
    pub avg_queue_wait_ms: f64,
    #[serde(deserialize_with = "nullable")]
    pub avg_execution_ms: f64,
    /// Absent on older backends, see [`MetricSample::execution_p50`].
    pub p50_execution_ms: Option<f64>,
    #[serde(deserialize_with = "nullable")]
    pub p95_execution_ms: f64,
}

impl MetricSample {
    /// Median execution time, or the average when the backend did not report it.
    pub fn execution_p50(&self) -> f64 {
        self.p50_execution_ms.unwrap_or(self.avg_execution_ms)
    }

    pub fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Bucket size chosen by the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Granularity {
    #[default]
    #[serde(rename = "1m")]
    Minute,
    #[serde(rename = "1h")]
    Hour,
    #[serde(rename = "1d")]
    Day,
}

impl Granularity {
    pub fn label(&self) -> &'static str {
        match self {
            Granularity::Minute => "per minute",
            Granularity::Hour => "per hour",
            Granularity::Day => "per day",
        }
    }
}

/// Historical window selectable on the metrics tab.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TimeRange {
    #[default]
    OneHour,
    SixHours,
    OneDay,
    SevenDays,
    ThirtyDays,
}

impl TimeRange {
    pub const ALL: [TimeRange; 5] = [
        TimeRange::OneHour,
        TimeRange::SixHours,
        TimeRange::OneDay,
        TimeRange::SevenDays,
        TimeRange::ThirtyDays,
    ];

    /// Value sent as the `granularity` parameter, the server picks the bucket size.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::OneHour => "1h",
            TimeRange::SixHours => "6h",
            TimeRange::OneDay => "24h",
            TimeRange::SevenDays => "7d",
            TimeRange::ThirtyDays => "30d",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimeRange::OneHour => "Last 1 hour",
            TimeRange::SixHours => "Last 6 hours",
            TimeRange::OneDay => "Last 24 hours",
            TimeRange::SevenDays => "Last 7 days",
            TimeRange::ThirtyDays => "Last 30 days",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            TimeRange::OneHour => Duration::hours(1),
            TimeRange::SixHours => Duration::hours(6),
            TimeRange::OneDay => Duration::hours(24),
            TimeRange::SevenDays => Duration::days(7),
            TimeRange::ThirtyDays => Duration::days(30),
        }
    }

    /// `(from, to)` ending at `now`.
    pub fn window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        (now - self.duration(), now)
    }

    pub fn next(&self) -> Self {
        let i = Self::ALL.iter().position(|r| r == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }

    pub fn prev(&self) -> Self {
        let i = Self::ALL.iter().position(|r| r == self).unwrap_or(0);
        Self::ALL[(i + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// Response of `GET /api/v1/endpoints/{name}/stats`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StatsSeries {
    #[serde(default, deserialize_with = "nullable")]
    pub stats: Vec<MetricSample>,
    #[serde(default, deserialize_with = "nullable")]
    pub granularity: Granularity,
}

/// Response of `GET /api/v1/endpoints/{name}/metrics`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RealtimeMetrics {
    #[serde(deserialize_with = "nullable")]
    pub workers: RealtimeWorkers,
    #[serde(deserialize_with = "nullable")]
    pub tasks: RealtimeTasks,
    #[serde(deserialize_with = "nullable")]
    pub performance: RealtimePerformance,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RealtimeWorkers {
    #[serde(deserialize_with = "nullable")]
    pub active: u64,
    #[serde(deserialize_with = "nullable")]
    pub idle: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RealtimeTasks {
    #[serde(deserialize_with = "nullable")]
    pub completed_last_minute: u64,
    #[serde(deserialize_with = "nullable")]
    pub running: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RealtimePerformance {
    #[serde(deserialize_with = "nullable")]
    pub avg_execution_ms: f64,
    #[serde(deserialize_with = "nullable")]
    pub avg_queue_wait_ms: f64,
}

/// Header counters of `GET /api/v1/endpoints/{name}/statistics`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TaskStatistics {
    #[serde(deserialize_with = "nullable", alias = "pendingTasks")]
    pub pending_tasks: u64,
    #[serde(deserialize_with = "nullable", alias = "runningTasks")]
    pub running_tasks: u64,
    #[serde(deserialize_with = "nullable", alias = "completedTasks")]
    pub completed_tasks: u64,
    #[serde(deserialize_with = "nullable", alias = "failedTasks")]
    pub failed_tasks: u64,
    #[serde(deserialize_with = "nullable", alias = "onlineWorkers")]
    pub online_workers: u64,
    #[serde(deserialize_with = "nullable", alias = "busyWorkers")]
    pub busy_workers: u64,
}

impl TaskStatistics {
    pub fn total_tasks(&self) -> u64 {
        self.pending_tasks + self.running_tasks + self.completed_tasks + self.failed_tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_nulls_are_zero() {
        let sample: MetricSample = serde_json::from_str(
            r#"{"timestamp": "2025-03-01T10:00:00Z", "tasks_submitted": 4,
                "avg_execution_ms": 1200, "p95_execution_ms": null}"#,
        )
        .unwrap();
        assert_eq!(sample.tasks_submitted, 4.0);
        assert_eq!(sample.tasks_failed, 0.0);
        assert_eq!(sample.p95_execution_ms, 0.0);
        assert_eq!(sample.execution_p50(), 1200.0);
        assert!(sample.time().is_some());

        let with_p50 = MetricSample {
            p50_execution_ms: Some(900.0),
            ..sample
        };
        assert_eq!(with_p50.execution_p50(), 900.0);
    }

    #[test]
    fn test_stats_series() {
        let series: StatsSeries =
            serde_json::from_str(r#"{"stats": null, "granularity": "1d"}"#).unwrap();
        assert!(series.stats.is_empty());
        assert_eq!(series.granularity, Granularity::Day);

        let statistics: TaskStatistics =
            serde_json::from_str(r#"{"pendingTasks": 2, "runningTasks": 1, "completedTasks": 7}"#)
                .unwrap();
        assert_eq!(statistics.total_tasks(), 10);
    }

    #[test]
    fn test_time_range_cycle() {
        assert_eq!(TimeRange::OneHour.prev(), TimeRange::ThirtyDays);
        assert_eq!(TimeRange::ThirtyDays.next(), TimeRange::OneHour);
        assert_eq!(TimeRange::SixHours.next().as_str(), "24h");

        let now = Utc::now();
        let (from, to) = TimeRange::SevenDays.window(now);
        assert_eq!(to - from, Duration::days(7));
    }
}
