use super::nullable;
use serde::{Deserialize, Deserializer, Serialize};

/// A worker pod of an endpoint, only valid for the poll cycle that fetched it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    #[serde(default, deserialize_with = "nullable")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable", alias = "workerId")]
    pub worker_id: String,
    #[serde(default, deserialize_with = "nullable", alias = "podName")]
    pub pod_name: String,
    /// One of `STARTING`, `ONLINE`, `BUSY`, `DRAINING`, `OFFLINE` (any case).
    #[serde(default, deserialize_with = "nullable")]
    pub status: String,
    #[serde(default, deserialize_with = "nullable", alias = "currentJobs")]
    pub current_jobs: u32,
    #[serde(default, deserialize_with = "nullable")]
    pub concurrency: u32,
    #[serde(default, deserialize_with = "nullable", alias = "totalTasksCompleted")]
    pub total_tasks_completed: u64,
    #[serde(default, deserialize_with = "nullable", alias = "totalTasksFailed")]
    pub total_tasks_failed: u64,
    #[serde(default, alias = "lastHeartbeat")]
    pub last_heartbeat: Option<String>,
    #[serde(default, alias = "lastTaskTime")]
    pub last_task_time: Option<String>,
    #[serde(default, alias = "podCreatedAt")]
    pub pod_created_at: Option<String>,
    #[serde(default, alias = "coldStartDurationMs")]
    pub cold_start_duration_ms: Option<u64>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default, rename = "podStatus", alias = "pod_status")]
    pub pod_status: Option<String>,
}

impl Worker {
    /// Identifier used to address the worker pod (exec, logs).
    ///
    /// Prefers the pod name, which is what the exec proxy resolves, then the worker id.
    pub fn address(&self) -> &str {
        [&self.pod_name, &self.worker_id, &self.id]
            .into_iter()
            .find(|s| !s.is_empty())
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Identifier tasks record for the worker that ran them, never the pod name.
    pub fn task_key(&self) -> &str {
        if self.worker_id.is_empty() {
            &self.id
        } else {
            &self.worker_id
        }
    }

    /// Identifier shown in tables.
    pub fn label(&self) -> &str {
        if self.id.is_empty() {
            self.address()
        } else {
            &self.id
        }
    }

    pub fn is_active(&self) -> bool {
        self.current_jobs > 0
    }

    pub fn status_upper(&self) -> String {
        self.status.to_uppercase()
    }
}

/// Counters shown above the workers table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    /// Workers with at least one running job.
    pub active: usize,
    pub idle: usize,
    pub total: usize,
    /// Sum of running jobs over all workers.
    pub jobs: u32,
}

impl WorkerSummary {
    pub fn of(workers: &[Worker]) -> Self {
        let total = workers.len();
        let active = workers.iter().filter(|w| w.is_active()).count();
        Self {
            active,
            idle: total - active,
            total,
            jobs: workers.iter().map(|w| w.current_jobs).sum(),
        }
    }
}

/// `GET /api/v1/endpoints/{name}/workers` answers either a bare array or
/// `{"endpoint_name": .., "workers": [..]}`.
pub(crate) fn deserialize_workers<'de, D>(deserializer: D) -> Result<Vec<Worker>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum WorkersResponse {
        List(Vec<Worker>),
        Wrapped {
            #[serde(default, deserialize_with = "nullable")]
            workers: Vec<Worker>,
        },
    }

    let mut workers = match WorkersResponse::deserialize(deserializer)? {
        WorkersResponse::List(workers) | WorkersResponse::Wrapped { workers } => workers,
    };
    workers.sort_by(|a, b| a.label().cmp(b.label()));
    Ok(workers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Vec<Worker> {
        let mut de = serde_json::Deserializer::from_str(json);
        deserialize_workers(&mut de).unwrap()
    }

    #[test]
    fn test_single_busy_worker_summary() {
        let workers = parse(
            r#"{"endpoint_name": "my-endpoint", "workers": [
                {"id": "w-1", "pod_name": "my-endpoint-abc", "status": "online",
                 "current_jobs": 1, "concurrency": 2}
            ]}"#,
        );

        let summary = WorkerSummary::of(&workers);
        assert_eq!(
            summary,
            WorkerSummary {
                active: 1,
                idle: 0,
                total: 1,
                jobs: 1
            }
        );
    }

    #[test]
    fn test_workers_sorted_and_summed() {
        let workers = parse(
            r#"[
                {"id": "w-2", "status": "ONLINE", "current_jobs": 0, "concurrency": 1},
                {"id": "w-3", "status": "BUSY", "current_jobs": 3, "concurrency": 4, "podStatus": "Running"},
                {"id": "w-1", "status": "STARTING", "current_jobs": null}
            ]"#,
        );

        let ids: Vec<_> = workers.iter().map(|w| w.label()).collect();
        assert_eq!(ids, ["w-1", "w-2", "w-3"]);
        assert_eq!(workers[2].pod_status.as_deref(), Some("Running"));

        let summary = WorkerSummary::of(&workers);
        assert_eq!(summary.active, 1);
        assert_eq!(summary.idle, 2);
        assert_eq!(summary.jobs, 3);

        assert_eq!(WorkerSummary::of(&[]), WorkerSummary::default());
    }

    #[test]
    fn test_worker_address() {
        let worker = Worker {
            id: "w-1".into(),
            worker_id: "worker-xyz".into(),
            ..Default::default()
        };
        assert_eq!(worker.address(), "worker-xyz");

        let worker = Worker {
            pod_name: "pod-1".into(),
            ..worker
        };
        assert_eq!(worker.address(), "pod-1");
        assert_eq!(worker.task_key(), "worker-xyz");
    }

    #[test]
    fn test_task_key_skips_pod_name() {
        let worker = Worker {
            id: "w-1".into(),
            pod_name: "pod-1".into(),
            ..Default::default()
        };
        assert_eq!(worker.task_key(), "w-1");
        assert_eq!(worker.address(), "pod-1");
    }
}
