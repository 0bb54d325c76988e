use super::nullable;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-side task status, never computed locally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    /// Statuses that can be used as a list filter, in display order.
    pub const FILTERS: [TaskStatus; 4] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Failed,
    ];

    /// Only queued or running tasks may be cancelled.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::InProgress)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Cancelled => "CANCELLED",
            TaskStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task, from the status endpoint (camelCase) or from task lists (snake_case).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(alias = "task_id")]
    pub id: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default, deserialize_with = "nullable")]
    pub endpoint: String,
    #[serde(default, alias = "workerId")]
    pub worker_id: Option<String>,
    /// Queue delay in milliseconds.
    #[serde(default, alias = "delayTime", alias = "delay_time_ms")]
    pub delay_time: Option<u64>,
    /// Execution duration in milliseconds.
    #[serde(default, alias = "executionTime", alias = "execution_time_ms")]
    pub execution_time: Option<u64>,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<String>,
    #[serde(default)]
    pub input: Option<serde_json::Value>,
    #[serde(default)]
    pub output: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Task {
    pub fn worker(&self) -> &str {
        self.worker_id.as_deref().unwrap_or("-")
    }
}

/// One page of tasks, `total` counts all matches.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TaskPage {
    #[serde(default, deserialize_with = "nullable")]
    pub tasks: Vec<Task>,
    #[serde(default, deserialize_with = "nullable")]
    pub total: u64,
}

/// Filters and pagination for task lists.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskQuery {
    pub limit: u32,
    pub offset: u32,
    pub status: Option<TaskStatus>,
    pub task_id: Option<String>,
    pub worker_id: Option<String>,
    /// Only honored by the global task list.
    pub endpoint: Option<String>,
}

impl Default for TaskQuery {
    fn default() -> Self {
        Self {
            limit: TaskQuery::PAGE_SIZES[1],
            offset: 0,
            status: None,
            task_id: None,
            worker_id: None,
            endpoint: None,
        }
    }
}

impl TaskQuery {
    pub const PAGE_SIZES: [u32; 4] = [10, 20, 50, 100];

    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("limit", self.limit.to_string()),
            ("offset", self.offset.to_string()),
        ];
        if let Some(status) = self.status {
            pairs.push(("status", status.to_string()));
        }
        let optional = [
            ("task_id", &self.task_id),
            ("worker_id", &self.worker_id),
            ("endpoint", &self.endpoint),
        ];
        for (key, value) in optional {
            if let Some(value) = value.as_ref().filter(|v| !v.is_empty()) {
                pairs.push((key, value.clone()));
            }
        }
        pairs
    }

    /// Zero-based page index.
    pub fn page(&self) -> u32 {
        self.offset / self.limit.max(1)
    }

    /// Number of pages for `total` results, at least one.
    pub fn page_count(&self, total: u64) -> u64 {
        total.div_ceil(self.limit.max(1) as u64).max(1)
    }

    pub fn next_page(&mut self, total: u64) -> bool {
        if (self.offset + self.limit) as u64 >= total {
            return false;
        }
        self.offset += self.limit;
        true
    }

    pub fn prev_page(&mut self) -> bool {
        if self.offset == 0 {
            return false;
        }
        self.offset = self.offset.saturating_sub(self.limit);
        true
    }

    /// Switch to the next page size and go back to the first page.
    pub fn cycle_page_size(&mut self) {
        let current = Self::PAGE_SIZES.iter().position(|s| *s == self.limit);
        let next = current.map(|i| (i + 1) % Self::PAGE_SIZES.len()).unwrap_or(0);
        self.limit = Self::PAGE_SIZES[next];
        self.offset = 0;
    }

    /// Rotate the status filter through all, then each status.
    pub fn cycle_status(&mut self) {
        self.status = match self.status {
            None => Some(TaskStatus::FILTERS[0]),
            Some(status) => TaskStatus::FILTERS
                .iter()
                .position(|s| *s == status)
                .and_then(|i| TaskStatus::FILTERS.get(i + 1))
                .copied(),
        };
        self.offset = 0;
    }
}

/// Counters of `GET /api/v1/tasks/overview`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TasksOverview {
    #[serde(default, deserialize_with = "nullable")]
    pub completed: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub in_progress: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub pending: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub failed: u64,
}

/// A status transition of a task.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TimelineEvent {
    #[serde(default, deserialize_with = "nullable")]
    pub event_type: String,
    #[serde(default)]
    pub from_status: Option<String>,
    #[serde(default)]
    pub to_status: Option<String>,
    #[serde(default)]
    pub event_time: Option<String>,
    #[serde(default)]
    pub worker_id: Option<String>,
    #[serde(default)]
    pub worker_pod_name: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// One execution attempt of a task on a worker.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExecutionAttempt {
    #[serde(default, deserialize_with = "nullable")]
    pub worker_id: String,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
}

/// Everything shown in the task drill-down.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskDetail {
    pub task: Task,
    pub timeline: Vec<TimelineEvent>,
    pub history: Vec<ExecutionAttempt>,
}

/// Whether a task is run asynchronously or waited for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubmitMode {
    #[default]
    Async,
    Sync,
}

impl SubmitMode {
    pub fn path(&self) -> &'static str {
        match self {
            SubmitMode::Async => "run",
            SubmitMode::Sync => "runsync",
        }
    }

    pub fn toggle(&self) -> Self {
        match self {
            SubmitMode::Async => SubmitMode::Sync,
            SubmitMode::Sync => SubmitMode::Async,
        }
    }
}

/// Response of a submission, kept verbatim for display.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub response: serde_json::Value,
}

impl Submission {
    /// The task id, if the backend returned one.
    pub fn task_id(&self) -> Option<&str> {
        self.response.get("id").and_then(|id| id.as_str())
    }

    pub fn pretty(&self) -> String {
        serde_json::to_string_pretty(&self.response).unwrap_or_else(|_| self.response.to_string())
    }
}

/// Parses user input as the task payload, before anything is sent.
pub fn parse_task_input(raw: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(raw).map_err(|e| format!("Invalid JSON input: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellable_statuses() {
        assert!(TaskStatus::Pending.is_cancellable());
        assert!(TaskStatus::InProgress.is_cancellable());
        assert!(!TaskStatus::Completed.is_cancellable());
        assert!(!TaskStatus::Failed.is_cancellable());
        assert!(!TaskStatus::Cancelled.is_cancellable());
        assert!(!TaskStatus::Unknown.is_cancellable());
    }

    #[test]
    fn test_task_accepts_both_spellings() {
        let status: Task = serde_json::from_str(
            r#"{"id": "t-1", "status": "IN_PROGRESS", "workerId": "w-1",
                "delayTime": 120, "executionTime": 3400, "createdAt": "2025-01-01T00:00:00Z",
                "input": {"prompt": "cat"}}"#,
        )
        .unwrap();
        let row: Task = serde_json::from_str(
            r#"{"task_id": "t-1", "status": "IN_PROGRESS", "worker_id": "w-1",
                "execution_time_ms": 3400, "created_at": "2025-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        assert_eq!(status.id, row.id);
        assert_eq!(status.worker_id, row.worker_id);
        assert_eq!(status.execution_time, row.execution_time);
        assert_eq!(status.created_at, row.created_at);
        assert!(status.status.is_cancellable());

        let odd: Task = serde_json::from_str(r#"{"id": "t-2", "status": "TIMED_OUT"}"#).unwrap();
        assert_eq!(odd.status, TaskStatus::Unknown);
        assert_eq!(odd.worker(), "-");
    }

    #[test]
    fn test_query_pairs_and_paging() {
        let mut query = TaskQuery {
            status: Some(TaskStatus::InProgress),
            task_id: Some(String::new()),
            worker_id: Some("pod-1".into()),
            ..Default::default()
        };
        assert_eq!(
            query.pairs(),
            vec![
                ("limit", "20".to_string()),
                ("offset", "0".to_string()),
                ("status", "IN_PROGRESS".to_string()),
                ("worker_id", "pod-1".to_string()),
            ]
        );

        assert_eq!(query.page_count(0), 1);
        assert_eq!(query.page_count(41), 3);
        assert!(query.next_page(41));
        assert!(query.next_page(41));
        assert!(!query.next_page(41));
        assert_eq!(query.page(), 2);
        assert!(query.prev_page());
        assert_eq!(query.offset, 20);

        query.cycle_page_size();
        assert_eq!((query.limit, query.offset), (50, 0));
        query.cycle_page_size();
        query.cycle_page_size();
        assert_eq!(query.limit, 10);
    }

    #[test]
    fn test_cycle_status_filter() {
        let mut query = TaskQuery::default();
        let mut seen = vec![];
        for _ in 0..5 {
            query.cycle_status();
            seen.push(query.status);
        }
        assert_eq!(
            seen,
            vec![
                Some(TaskStatus::Pending),
                Some(TaskStatus::InProgress),
                Some(TaskStatus::Completed),
                Some(TaskStatus::Failed),
                None,
            ]
        );
    }

    #[test]
    fn test_submission() {
        assert!(parse_task_input("{\"prompt\": ").is_err());
        assert!(parse_task_input("{\"prompt\": \"a cat\"}").is_ok());

        let submission = Submission {
            response: serde_json::json!({"id": "t-9", "status": "IN_QUEUE"}),
        };
        assert_eq!(submission.task_id(), Some("t-9"));
        assert_eq!(SubmitMode::Sync.path(), "runsync");
        assert_eq!(SubmitMode::Async.toggle(), SubmitMode::Sync);
    }
}
