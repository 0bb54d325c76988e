use crate::common::{Granularity, MetricSample};
use chrono::Local;

/// A plotted quantity of the metrics tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Submitted,
    Completed,
    Failed,
    Retried,
    ExecutionP50,
    ExecutionP95,
    QueueWait,
    ColdStarts,
    ColdStartTime,
    ActiveWorkers,
    IdleWorkers,
    Utilization,
    IdleTime,
}

impl Dimension {
    pub const ALL: [Dimension; 13] = [
        Dimension::Submitted,
        Dimension::Completed,
        Dimension::Failed,
        Dimension::Retried,
        Dimension::ExecutionP50,
        Dimension::ExecutionP95,
        Dimension::QueueWait,
        Dimension::ColdStarts,
        Dimension::ColdStartTime,
        Dimension::ActiveWorkers,
        Dimension::IdleWorkers,
        Dimension::Utilization,
        Dimension::IdleTime,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Dimension::Submitted => "Submitted",
            Dimension::Completed => "Completed",
            Dimension::Failed => "Failed",
            Dimension::Retried => "Retried",
            Dimension::ExecutionP50 => "P50",
            Dimension::ExecutionP95 => "P95",
            Dimension::QueueWait => "Delay",
            Dimension::ColdStarts => "Cold starts",
            Dimension::ColdStartTime => "Cold start time",
            Dimension::ActiveWorkers => "Active",
            Dimension::IdleWorkers => "Idle",
            Dimension::Utilization => "Utilization",
            Dimension::IdleTime => "Idle time",
        }
    }

    /// Value of this dimension in `sample`, in display units.
    ///
    /// Durations are shown in seconds, utilization in percent.
    fn value(&self, sample: &MetricSample) -> f64 {
        match self {
            Dimension::Submitted => sample.tasks_submitted,
            Dimension::Completed => sample.tasks_completed,
            Dimension::Failed => sample.tasks_failed,
            Dimension::Retried => sample.tasks_retried,
            Dimension::ExecutionP50 => sample.execution_p50() / 1000.0,
            Dimension::ExecutionP95 => sample.p95_execution_ms / 1000.0,
            Dimension::QueueWait => sample.avg_queue_wait_ms / 1000.0,
            Dimension::ColdStarts => sample.cold_starts,
            Dimension::ColdStartTime => sample.avg_cold_start_ms / 1000.0,
            Dimension::ActiveWorkers => sample.active_workers,
            Dimension::IdleWorkers => sample.idle_workers,
            Dimension::Utilization => sample.avg_worker_utilization,
            Dimension::IdleTime => sample.avg_idle_duration_sec,
        }
    }
}

/// Series derived from a sample sequence, aligned by sample index.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSet {
    pub granularity: Granularity,
    pub labels: Vec<String>,
    series: Vec<(Dimension, Vec<f64>)>,
}

impl ChartSet {
    pub fn build(samples: &[MetricSample], granularity: Granularity) -> Self {
        let labels = samples
            .iter()
            .map(|sample| bucket_label(sample, granularity))
            .collect();
        let series = Dimension::ALL
            .iter()
            .map(|dim| (*dim, samples.iter().map(|s| dim.value(s)).collect()))
            .collect();

        Self {
            granularity,
            labels,
            series,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn series(&self, dim: Dimension) -> &[f64] {
        self.series
            .iter()
            .find(|(d, _)| *d == dim)
            .map(|(_, values)| values.as_slice())
            .unwrap_or_default()
    }

    pub fn total(&self, dim: Dimension) -> f64 {
        self.series(dim).iter().sum()
    }

    /// Arithmetic mean over the samples, zero when there are none.
    pub fn average(&self, dim: Dimension) -> f64 {
        let values = self.series(dim);
        if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        }
    }

    pub fn max(&self, dim: Dimension) -> f64 {
        self.series(dim).iter().copied().fold(0.0, f64::max)
    }

    /// `(index, value)` points for line charts.
    pub fn points(&self, dim: Dimension) -> Vec<(f64, f64)> {
        self.series(dim)
            .iter()
            .enumerate()
            .map(|(i, v)| (i as f64, *v))
            .collect()
    }
}

/// `Mon DD` for daily buckets, `HH:MM` otherwise, in local time.
fn bucket_label(sample: &MetricSample, granularity: Granularity) -> String {
    let Some(time) = sample.time() else {
        return sample.timestamp.clone();
    };
    let local = time.with_timezone(&Local);
    match granularity {
        Granularity::Day => local.format("%b %d").to_string(),
        Granularity::Minute | Granularity::Hour => local.format("%H:%M").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(timestamp: &str, submitted: f64, avg_exec: f64) -> MetricSample {
        MetricSample {
            timestamp: timestamp.to_string(),
            tasks_submitted: submitted,
            avg_execution_ms: avg_exec,
            avg_worker_utilization: submitted * 10.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_samples() {
        let charts = ChartSet::build(&[], Granularity::Minute);
        assert!(charts.is_empty());
        for dim in Dimension::ALL {
            assert_eq!(charts.total(dim), 0.0);
            assert_eq!(charts.average(dim), 0.0);
            assert_eq!(charts.max(dim), 0.0);
        }
    }

    #[test]
    fn test_totals_and_averages() {
        let samples = [
            sample("2025-03-01T10:00:00Z", 2.0, 1000.0),
            sample("2025-03-01T10:01:00Z", 4.0, 3000.0),
            sample("2025-03-01T10:02:00Z", 0.0, 0.0),
        ];
        let charts = ChartSet::build(&samples, Granularity::Minute);

        assert_eq!(charts.len(), 3);
        assert_eq!(charts.total(Dimension::Submitted), 6.0);
        assert_eq!(charts.average(Dimension::Submitted), 2.0);
        assert_eq!(charts.average(Dimension::Utilization), 20.0);
        // p50 is missing, so it falls back to the average execution time
        assert_eq!(charts.series(Dimension::ExecutionP50), &[1.0, 3.0, 0.0]);
        assert_eq!(charts.points(Dimension::Submitted)[1], (1.0, 4.0));
        assert_eq!(charts.max(Dimension::Submitted), 4.0);
    }

    #[test]
    fn test_labels() {
        let samples = [sample("2025-03-01T12:00:00Z", 1.0, 0.0)];
        let daily = ChartSet::build(&samples, Granularity::Day);
        let hourly = ChartSet::build(&samples, Granularity::Hour);

        // local time zone dependent, check the shape only
        assert_eq!(daily.labels[0].len(), 6);
        assert!(daily.labels[0].chars().next().unwrap().is_ascii_alphabetic());
        assert_eq!(hourly.labels[0].len(), 5);
        assert_eq!(&hourly.labels[0][2..3], ":");

        let broken = ChartSet::build(&[sample("yesterday", 1.0, 0.0)], Granularity::Hour);
        assert_eq!(broken.labels, vec!["yesterday"]);
    }
}
