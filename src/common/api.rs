use super::*;
use crate::config::Config;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{AUTHORIZATION, COOKIE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// HTTP client of the console API.
///
/// Cheap to clone, every clone shares the connection pool, the cookie store and
/// the [`Session`]. Any `401` answered to any request expires the session.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
    session_cookie: Option<String>,
    session: Arc<Session>,
}

impl ApiClient {
    pub fn new(config: &Config, session: Arc<Session>) -> ApiResult<Self> {
        let base_url = Url::parse(&config.api_url)?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidInput(format!(
                "API URL {} cannot be used as a base",
                config.api_url
            )));
        }

        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", key))?);
        }
        if let Some(cookie) = &config.session_cookie {
            headers.insert(COOKIE, header_value(cookie)?);
        }

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
            session_cookie: config.session_cookie.clone(),
            session,
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL joined with `segments`, each one percent-encoded.
    fn url(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidInput("API URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn url_with_query<K, V>(&self, segments: &[&str], pairs: &[(K, V)]) -> ApiResult<Url>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut url = self.url(segments)?;
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        Ok(url)
    }

    /// Sends the request and returns the body of a successful response.
    async fn send_text(&self, request: reqwest::RequestBuilder) -> ApiResult<String> {
        let response = request.send().await?;
        let status = response.status();
        let url = response.url().path().to_string();
        let body = response.text().await?;

        if status.is_success() {
            return Ok(body);
        }

        let err = ApiError::from_response(status, &body);
        if err.is_unauthorized() && self.session.expire() {
            tracing::warn!("session expired on {}", url);
        } else {
            tracing::debug!("{} {} failed: {}", status.as_u16(), url, err);
        }
        Err(err)
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> ApiResult<T> {
        let body = self.send_text(request).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// `GET /api/v1/user`
    pub async fn current_user(&self) -> ApiResult<User> {
        let url = self.url(&["api", "v1", "user"])?;
        self.send(self.client.get(url)).await
    }

    /// `GET /api/v1/endpoints`
    pub async fn list_endpoints(&self) -> ApiResult<Vec<EndpointSummary>> {
        #[derive(Deserialize)]
        struct EndpointsResponse {
            #[serde(default, deserialize_with = "nullable")]
            endpoints: Vec<EndpointSummary>,
        }

        let url = self.url(&["api", "v1", "endpoints"])?;
        let response: EndpointsResponse = self.send(self.client.get(url)).await?;
        Ok(response.endpoints)
    }

    /// `GET /api/v1/endpoints/{name}`
    pub async fn get_endpoint(&self, name: &str) -> ApiResult<Endpoint> {
        let url = self.url(&["api", "v1", "endpoints", name])?;
        self.send(self.client.get(url)).await
    }

    /// `PUT /api/v1/endpoints/{name}`
    pub async fn update_endpoint(&self, name: &str, update: &EndpointUpdate) -> ApiResult<()> {
        let url = self.url(&["api", "v1", "endpoints", name])?;
        self.send_text(self.client.put(url).json(update)).await?;
        Ok(())
    }

    /// `PUT /api/v1/endpoints/{name}/config`
    pub async fn update_endpoint_config(
        &self,
        name: &str,
        update: &EndpointConfigUpdate,
    ) -> ApiResult<()> {
        let url = self.url(&["api", "v1", "endpoints", name, "config"])?;
        self.send_text(self.client.put(url).json(update)).await?;
        Ok(())
    }

    /// `POST /api/v1/endpoints`
    pub async fn create_endpoint(&self, endpoint: &NewEndpoint) -> ApiResult<()> {
        endpoint.validate().map_err(ApiError::InvalidInput)?;
        let url = self.url(&["api", "v1", "endpoints"])?;
        self.send_text(self.client.post(url).json(endpoint)).await?;
        Ok(())
    }

    /// `DELETE /api/v1/endpoints/{name}`
    pub async fn delete_endpoint(&self, name: &str) -> ApiResult<()> {
        let url = self.url(&["api", "v1", "endpoints", name])?;
        self.send_text(self.client.delete(url)).await?;
        Ok(())
    }

    /// `GET /api/v1/endpoints/{name}/workers`, sorted by id.
    pub async fn list_workers(&self, name: &str) -> ApiResult<Vec<Worker>> {
        let url = self.url(&["api", "v1", "endpoints", name, "workers"])?;
        let body = self.send_text(self.client.get(url)).await?;
        let mut de = serde_json::Deserializer::from_str(&body);
        Ok(deserialize_workers(&mut de)?)
    }

    /// `GET /api/v1/endpoints/{name}/logs?pod_name=`, plain text.
    pub async fn worker_logs(&self, name: &str, pod_name: &str) -> ApiResult<String> {
        let url = self.url_with_query(
            &["api", "v1", "endpoints", name, "logs"],
            &[("pod_name", pod_name)],
        )?;
        self.send_text(self.client.get(url)).await
    }

    /// `GET /api/v1/endpoints/{name}/metrics`
    pub async fn realtime_metrics(&self, name: &str) -> ApiResult<RealtimeMetrics> {
        let url = self.url(&["api", "v1", "endpoints", name, "metrics"])?;
        self.send(self.client.get(url)).await
    }

    /// `GET /api/v1/endpoints/{name}/stats` for the window of `range` ending at `now`.
    pub async fn endpoint_stats(
        &self,
        name: &str,
        range: TimeRange,
        now: DateTime<Utc>,
    ) -> ApiResult<StatsSeries> {
        let (from, to) = range.window(now);
        let url = self.url_with_query(
            &["api", "v1", "endpoints", name, "stats"],
            &[
                ("granularity", range.as_str().to_string()),
                ("from", from.to_rfc3339_opts(SecondsFormat::Millis, true)),
                ("to", to.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ],
        )?;
        self.send(self.client.get(url)).await
    }

    /// `GET /api/v1/endpoints/{name}/statistics`
    pub async fn task_statistics(&self, name: &str) -> ApiResult<TaskStatistics> {
        let url = self.url(&["api", "v1", "endpoints", name, "statistics"])?;
        self.send(self.client.get(url)).await
    }

    /// `GET /api/v1/endpoints/{name}/tasks`
    pub async fn endpoint_tasks(&self, name: &str, query: &TaskQuery) -> ApiResult<TaskPage> {
        let url = self.url_with_query(&["api", "v1", "endpoints", name, "tasks"], &query.pairs())?;
        self.send(self.client.get(url)).await
    }

    /// `GET /api/v1/tasks`
    pub async fn all_tasks(&self, query: &TaskQuery) -> ApiResult<TaskPage> {
        let url = self.url_with_query(&["api", "v1", "tasks"], &query.pairs())?;
        self.send(self.client.get(url)).await
    }

    /// `GET /api/v1/tasks/overview`
    pub async fn tasks_overview(&self) -> ApiResult<TasksOverview> {
        let url = self.url(&["api", "v1", "tasks", "overview"])?;
        self.send(self.client.get(url)).await
    }

    /// Validates `raw` as JSON and posts it to `/v1/{endpoint}/run` or `/runsync`.
    ///
    /// Nothing is sent when the input is not valid JSON.
    pub async fn submit_task(
        &self,
        endpoint: &str,
        mode: SubmitMode,
        raw: &str,
    ) -> ApiResult<Submission> {
        let input = parse_task_input(raw).map_err(ApiError::InvalidInput)?;
        let url = self.url(&["v1", endpoint, mode.path()])?;
        let body = serde_json::json!({ "input": input });
        let response = self.send(self.client.post(url).json(&body)).await?;
        Ok(Submission { response })
    }

    /// `GET /v1/status/{id}`
    pub async fn task_status(&self, task_id: &str) -> ApiResult<Task> {
        let task_id = require_id(task_id)?;
        let url = self.url(&["v1", "status", task_id])?;
        self.send(self.client.get(url)).await
    }

    /// `POST /v1/cancel/{id}`
    pub async fn cancel_task(&self, task_id: &str) -> ApiResult<()> {
        let task_id = require_id(task_id)?;
        let url = self.url(&["v1", "cancel", task_id])?;
        self.send_text(self.client.post(url)).await?;
        Ok(())
    }

    /// `GET /api/v1/tasks/{id}/timeline`
    pub async fn task_timeline(&self, task_id: &str) -> ApiResult<Vec<TimelineEvent>> {
        #[derive(Deserialize)]
        struct TimelineResponse {
            #[serde(default, deserialize_with = "nullable")]
            timeline: Vec<TimelineEvent>,
        }

        let url = self.url(&["api", "v1", "tasks", task_id, "timeline"])?;
        let response: TimelineResponse = self.send(self.client.get(url)).await?;
        Ok(response.timeline)
    }

    /// `GET /api/v1/tasks/{id}/execution-history`
    pub async fn task_execution_history(&self, task_id: &str) -> ApiResult<Vec<ExecutionAttempt>> {
        #[derive(Deserialize)]
        struct HistoryResponse {
            #[serde(default, deserialize_with = "nullable")]
            history: Vec<ExecutionAttempt>,
        }

        let url = self.url(&["api", "v1", "tasks", task_id, "execution-history"])?;
        let response: HistoryResponse = self.send(self.client.get(url)).await?;
        Ok(response.history)
    }

    /// Status, timeline and history of a task, fetched concurrently.
    ///
    /// Only the status is required, the other two fall back to empty lists.
    pub async fn task_detail(&self, task_id: &str) -> ApiResult<TaskDetail> {
        let (task, timeline, history) = tokio::join!(
            self.task_status(task_id),
            self.task_timeline(task_id),
            self.task_execution_history(task_id),
        );

        Ok(TaskDetail {
            task: task?,
            timeline: timeline.unwrap_or_else(|err| {
                tracing::debug!("timeline of {} unavailable: {}", task_id, err);
                Vec::new()
            }),
            history: history.unwrap_or_else(|err| {
                tracing::debug!("history of {} unavailable: {}", task_id, err);
                Vec::new()
            }),
        })
    }

    /// `GET /api/v1/specs`
    pub async fn specs(&self) -> ApiResult<Vec<Spec>> {
        #[derive(Deserialize)]
        struct SpecsResponse {
            #[serde(default, deserialize_with = "nullable")]
            specs: Vec<Spec>,
        }

        let url = self.url(&["api", "v1", "specs"])?;
        let response: SpecsResponse = self.send(self.client.get(url)).await?;
        Ok(response.specs)
    }

    /// `GET /api/v1/admin/clusters`
    pub async fn clusters(&self) -> ApiResult<Vec<Cluster>> {
        #[derive(Deserialize)]
        struct ClustersResponse {
            #[serde(default, deserialize_with = "nullable")]
            clusters: Vec<Cluster>,
        }

        let url = self.url(&["api", "v1", "admin", "clusters"])?;
        let response: ClustersResponse = self.send(self.client.get(url)).await?;
        Ok(response.clusters)
    }

    /// `DELETE /api/v1/admin/clusters/{id}`
    pub async fn delete_cluster(&self, cluster_id: &str) -> ApiResult<()> {
        let url = self.url(&["api", "v1", "admin", "clusters", cluster_id])?;
        self.send_text(self.client.delete(url)).await?;
        Ok(())
    }

    /// `GET /api/v1/admin/clusters/{id}/specs`
    pub async fn cluster_specs(&self, cluster_id: &str) -> ApiResult<Vec<ClusterSpec>> {
        #[derive(Deserialize)]
        struct ClusterSpecsResponse {
            #[serde(default, deserialize_with = "nullable")]
            specs: Vec<ClusterSpec>,
        }

        let url = self.url(&["api", "v1", "admin", "clusters", cluster_id, "specs"])?;
        let response: ClusterSpecsResponse = self.send(self.client.get(url)).await?;
        Ok(response.specs)
    }

    /// `PUT /api/v1/admin/clusters/{id}/specs`
    pub async fn update_cluster_spec(
        &self,
        cluster_id: &str,
        update: &ClusterSpecUpdate,
    ) -> ApiResult<()> {
        let url = self.url(&["api", "v1", "admin", "clusters", cluster_id, "specs"])?;
        self.send_text(self.client.put(url).json(update)).await?;
        Ok(())
    }

    /// `DELETE /api/v1/admin/clusters/{id}/specs`, the spec id goes in the body.
    pub async fn delete_cluster_spec(&self, cluster_id: &str, spec_id: i64) -> ApiResult<()> {
        let url = self.url(&["api", "v1", "admin", "clusters", cluster_id, "specs"])?;
        let body = serde_json::json!({ "id": spec_id });
        self.send_text(self.client.delete(url).json(&body)).await?;
        Ok(())
    }

    /// `POST /api/v1/admin/clusters/{id}/specs`
    pub async fn create_cluster_spec(&self, cluster_id: &str, spec: &NewClusterSpec) -> ApiResult<()> {
        spec.validate().map_err(ApiError::InvalidInput)?;
        let url = self.url(&["api", "v1", "admin", "clusters", cluster_id, "specs"])?;
        self.send_text(self.client.post(url).json(spec)).await?;
        Ok(())
    }

    /// `GET /api/v1/admin/specs`, unavailable specs included.
    pub async fn admin_specs(&self) -> ApiResult<Vec<AdminSpec>> {
        #[derive(Deserialize)]
        struct AdminSpecsResponse {
            #[serde(default, deserialize_with = "nullable")]
            specs: Vec<AdminSpec>,
        }

        let url = self.url(&["api", "v1", "admin", "specs"])?;
        let response: AdminSpecsResponse = self.send(self.client.get(url)).await?;
        Ok(response.specs)
    }

    /// `POST /api/v1/admin/specs`, or `PUT` when the payload has an id.
    pub async fn save_spec(&self, spec: &SpecPayload) -> ApiResult<()> {
        spec.validate().map_err(ApiError::InvalidInput)?;
        let url = self.url(&["api", "v1", "admin", "specs"])?;
        let request = match spec.id {
            Some(_) => self.client.put(url),
            None => self.client.post(url),
        };
        self.send_text(request.json(spec)).await?;
        Ok(())
    }

    /// `PUT /api/v1/admin/specs` with only the availability.
    pub async fn set_spec_available(&self, id: i64, is_available: bool) -> ApiResult<()> {
        let url = self.url(&["api", "v1", "admin", "specs"])?;
        let body = serde_json::json!({ "id": id, "is_available": is_available });
        self.send_text(self.client.put(url).json(&body)).await?;
        Ok(())
    }

    /// `DELETE /api/v1/admin/specs`, the id goes in the body.
    pub async fn delete_spec(&self, id: i64) -> ApiResult<()> {
        let url = self.url(&["api", "v1", "admin", "specs"])?;
        let body = serde_json::json!({ "id": id });
        self.send_text(self.client.delete(url).json(&body)).await?;
        Ok(())
    }

    /// `GET /api/v1/registry-credentials`
    pub async fn registry_credentials(&self) -> ApiResult<Vec<RegistryCredential>> {
        #[derive(Deserialize)]
        struct CredentialsResponse {
            #[serde(default, deserialize_with = "nullable")]
            credentials: Vec<RegistryCredential>,
        }

        let url = self.url(&["api", "v1", "registry-credentials"])?;
        let response: CredentialsResponse = self.send(self.client.get(url)).await?;
        Ok(response.credentials)
    }

    /// `POST /api/v1/registry-credentials`
    pub async fn create_registry_credential(&self, credential: &NewCredential) -> ApiResult<()> {
        let mut credential = credential.clone();
        credential.validate().map_err(ApiError::InvalidInput)?;
        let url = self.url(&["api", "v1", "registry-credentials"])?;
        self.send_text(self.client.post(url).json(&credential)).await?;
        Ok(())
    }

    /// `DELETE /api/v1/registry-credentials/{name}`
    pub async fn delete_registry_credential(&self, name: &str) -> ApiResult<()> {
        let url = self.url(&["api", "v1", "registry-credentials", name])?;
        self.send_text(self.client.delete(url)).await?;
        Ok(())
    }

    /// `GET /api/v1/billing/usage`
    pub async fn usage(&self) -> ApiResult<Usage> {
        let url = self.url(&["api", "v1", "billing", "usage"])?;
        self.send(self.client.get(url)).await
    }

    /// `GET /api/v1/billing/workers`
    pub async fn billing_records(&self, limit: u32, offset: u32) -> ApiResult<BillingPage> {
        let url = self.url_with_query(
            &["api", "v1", "billing", "workers"],
            &[("limit", limit.to_string()), ("offset", offset.to_string())],
        )?;
        self.send(self.client.get(url)).await
    }

    /// WebSocket URL of a worker shell, the scheme follows the API (`https` → `wss`).
    pub fn exec_url(&self, endpoint: &str, worker_id: &str) -> ApiResult<Url> {
        let mut url = self.url_with_query(
            &["api", "v1", "endpoints", endpoint, "workers", "exec"],
            &[("worker_id", worker_id)],
        )?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| ApiError::InvalidInput(format!("cannot use {} for a socket", url)))?;
        Ok(url)
    }

    /// Credentials to repeat on the socket handshake.
    pub fn handshake_headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = Vec::new();
        if let Some(key) = &self.api_key {
            headers.push(("authorization", format!("Bearer {}", key)));
        }
        if let Some(cookie) = &self.session_cookie {
            headers.push(("cookie", cookie.clone()));
        }
        headers
    }
}

fn header_value(value: &str) -> ApiResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| ApiError::InvalidInput("credential contains invalid characters".to_string()))
}

fn require_id(task_id: &str) -> ApiResult<&str> {
    let task_id = task_id.trim();
    if task_id.is_empty() {
        return Err(ApiError::InvalidInput("Task ID is required".to_string()));
    }
    Ok(task_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn client(server: &Server) -> ApiClient {
        let config = Config {
            api_url: server.url(),
            api_key: Some("secret".to_string()),
            ..Default::default()
        };
        ApiClient::new(&config, Arc::new(Session::new("https://wavespeed.ai"))).unwrap()
    }

    #[tokio::test]
    async fn test_unauthorized_expires_session() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/endpoints/my-endpoint/workers")
            .with_status(401)
            .with_body(r#"{"error": "unauthorized"}"#)
            .create_async()
            .await;

        let api = client(&server);
        api.session().sign_in(User {
            user_id: "u-1".into(),
            ..Default::default()
        });

        let err = api.list_workers("my-endpoint").await.unwrap_err();
        assert!(err.is_unauthorized());
        assert!(api.session().is_expired());
        assert!(api.session().user().is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_bearer_and_query() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/endpoints/my-endpoint/tasks")
            .match_header("authorization", "Bearer secret")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("limit".into(), "20".into()),
                Matcher::UrlEncoded("offset".into(), "0".into()),
                Matcher::UrlEncoded("status".into(), "PENDING".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"tasks": [{"id": "t-1", "status": "PENDING"}], "total": 1}"#)
            .create_async()
            .await;

        let query = TaskQuery {
            status: Some(TaskStatus::Pending),
            ..Default::default()
        };
        let page = client(&server)
            .endpoint_tasks("my-endpoint", &query)
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.tasks[0].id, "t-1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_malformed_input_is_not_sent() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let err = client(&server)
            .submit_task("my-endpoint", SubmitMode::Async, "{\"prompt\": ")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_submit_sync() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/my-endpoint/runsync")
            .match_body(Matcher::Json(serde_json::json!({"input": {"prompt": "a cat"}})))
            .with_status(200)
            .with_body(r#"{"id": "t-7", "status": "COMPLETED", "output": {"url": "x"}}"#)
            .create_async()
            .await;

        let submission = client(&server)
            .submit_task("my-endpoint", SubmitMode::Sync, r#"{"prompt": "a cat"}"#)
            .await
            .unwrap();
        assert_eq!(submission.task_id(), Some("t-7"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_cancel_failure_message() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/cancel/t-1")
            .with_status(400)
            .with_body(r#"{"error": "task already completed"}"#)
            .create_async()
            .await;

        let err = client(&server).cancel_task("t-1").await.unwrap_err();
        assert_eq!(err.to_string(), "task already completed");

        let err = client(&server).cancel_task("  ").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_task_detail_is_best_effort() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/v1/status/t-1")
            .with_status(200)
            .with_body(r#"{"id": "t-1", "status": "FAILED", "error": "OOM"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/api/v1/tasks/t-1/timeline")
            .with_status(500)
            .create_async()
            .await;
        server
            .mock("GET", "/api/v1/tasks/t-1/execution-history")
            .with_status(200)
            .with_body(r#"{"history": [{"worker_id": "w-1", "duration_seconds": 1.5}]}"#)
            .create_async()
            .await;

        let detail = client(&server).task_detail("t-1").await.unwrap();
        assert_eq!(detail.task.status, TaskStatus::Failed);
        assert!(detail.timeline.is_empty());
        assert_eq!(detail.history.len(), 1);
    }

    #[tokio::test]
    async fn test_not_found_endpoint() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/v1/endpoints/ghost")
            .with_status(404)
            .with_body(r#"{"error": "endpoint not found"}"#)
            .create_async()
            .await;

        let api = client(&server);
        let err = api.get_endpoint("ghost").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(!api.session().is_expired());
    }

    #[tokio::test]
    async fn test_create_endpoint() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/endpoints")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "logical_name": "flux-dev",
                "spec_name": "GPU-A100-40GB",
                "max_replicas": 2,
            })))
            .with_status(200)
            .with_body(r#"{"message": "created"}"#)
            .create_async()
            .await;

        let api = client(&server);
        let draft = NewEndpoint {
            logical_name: "flux-dev".to_string(),
            spec_name: "GPU-A100-40GB".to_string(),
            image: "registry/flux:1".to_string(),
            max_replicas: 2,
            ..Default::default()
        };
        api.create_endpoint(&draft).await.unwrap();
        mock.assert_async().await;

        // rejected before anything is sent
        let invalid = NewEndpoint {
            image: String::new(),
            ..draft
        };
        let err = api.create_endpoint(&invalid).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_cluster_specs() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/v1/admin/clusters/us-east/specs")
            .with_status(200)
            .with_body(
                r#"{"specs": [{"id": 3, "cluster_id": "us-east", "cluster_spec_name": "4090-1",
                    "spec_name": "GPU-4090", "total_capacity": 8, "available_capacity": 2,
                    "is_available": true}]}"#,
            )
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/api/v1/admin/clusters/us-east/specs")
            .match_body(Matcher::Json(serde_json::json!({ "id": 3 })))
            .with_status(200)
            .create_async()
            .await;

        let api = client(&server);
        let specs = api.cluster_specs("us-east").await.unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].cluster_spec_name, "4090-1");

        api.delete_cluster_spec("us-east", specs[0].id).await.unwrap();
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_cluster_spec() {
        let mut server = Server::new_async().await;
        let create = server
            .mock("POST", "/api/v1/admin/clusters/us-east/specs")
            .match_body(Matcher::Json(serde_json::json!({
                "cluster_spec_name": "4090-1",
                "spec_name": "GPU-4090",
                "total_capacity": 8,
                "available_capacity": 6,
                "is_available": true,
            })))
            .with_status(200)
            .with_body(r#"{"message": "created"}"#)
            .create_async()
            .await;

        let api = client(&server);
        let spec = NewClusterSpec {
            cluster_spec_name: "4090-1".to_string(),
            spec_name: "GPU-4090".to_string(),
            total_capacity: 8,
            available_capacity: 6,
            is_available: true,
        };
        api.create_cluster_spec("us-east", &spec).await.unwrap();
        create.assert_async().await;

        let over = NewClusterSpec {
            available_capacity: 9,
            ..spec
        };
        let err = api.create_cluster_spec("us-east", &over).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_admin_specs() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/v1/admin/specs")
            .with_status(200)
            .with_body(
                r#"{"specs": [{"id": 2, "spec_name": "GPU-L4", "spec_type": "GPU",
                    "gpu_type": "L4", "gpu_count": 1, "cpu_cores": 8, "ram_gb": 32,
                    "disk_gb": 100, "price_per_hour": 0.8, "description": "",
                    "is_available": false}]}"#,
            )
            .create_async()
            .await;
        let create = server
            .mock("POST", "/api/v1/admin/specs")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "spec_name": "GPU-H100",
                "spec_type": "GPU",
                "gpu_count": 1,
            })))
            .with_status(200)
            .create_async()
            .await;
        let update = server
            .mock("PUT", "/api/v1/admin/specs")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "id": 2,
                "price_per_hour": 0.9,
            })))
            .with_status(200)
            .create_async()
            .await;
        let enable = server
            .mock("PUT", "/api/v1/admin/specs")
            .match_body(Matcher::Json(serde_json::json!({ "id": 2, "is_available": true })))
            .with_status(200)
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/api/v1/admin/specs")
            .match_body(Matcher::Json(serde_json::json!({ "id": 2 })))
            .with_status(200)
            .create_async()
            .await;

        let api = client(&server);
        let specs = api.admin_specs().await.unwrap();
        assert_eq!(specs.len(), 1);
        assert!(!specs[0].is_available);

        let new = SpecPayload {
            spec_name: "GPU-H100".to_string(),
            gpu_type: "H100".to_string(),
            price_per_hour: 3.5,
            ..Default::default()
        };
        api.save_spec(&new).await.unwrap();
        create.assert_async().await;

        let mut edited = SpecPayload::from(&specs[0]);
        edited.price_per_hour = 0.9;
        api.save_spec(&edited).await.unwrap();
        update.assert_async().await;

        api.set_spec_available(2, true).await.unwrap();
        enable.assert_async().await;
        api.delete_spec(2).await.unwrap();
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_registry_credentials() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/v1/registry-credentials")
            .with_status(200)
            .with_body(
                r#"{"credentials": [{"id": 1, "name": "ghcr-main", "registry": "ghcr.io",
                    "username": "bot", "created_at": "2025-01-02T03:04:05Z"}]}"#,
            )
            .create_async()
            .await;
        let create = server
            .mock("POST", "/api/v1/registry-credentials")
            .match_body(Matcher::Json(serde_json::json!({
                "name": "hub",
                "registry": "docker.io",
                "username": "me",
                "password": "secret",
            })))
            .with_status(200)
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/api/v1/registry-credentials/ghcr-main")
            .with_status(200)
            .with_body(r#"{"message": "deleted"}"#)
            .create_async()
            .await;

        let api = client(&server);
        let credentials = api.registry_credentials().await.unwrap();
        assert_eq!(credentials[0].registry, "ghcr.io");

        let new = NewCredential {
            name: "hub".to_string(),
            registry: String::new(),
            username: "me".to_string(),
            password: "secret".to_string(),
        };
        api.create_registry_credential(&new).await.unwrap();
        create.assert_async().await;

        api.delete_registry_credential("ghcr-main").await.unwrap();
        delete.assert_async().await;
    }

    #[test]
    fn test_exec_url() {
        let session = Arc::new(Session::new("https://wavespeed.ai"));
        let config = Config {
            api_url: "https://console.example.com/".to_string(),
            session_cookie: Some("sid=abc".to_string()),
            ..Default::default()
        };
        let api = ApiClient::new(&config, session.clone()).unwrap();
        let url = api.exec_url("my-endpoint", "my-endpoint-abc").unwrap();
        assert_eq!(
            url.as_str(),
            "wss://console.example.com/api/v1/endpoints/my-endpoint/workers/exec?worker_id=my-endpoint-abc"
        );
        assert_eq!(api.handshake_headers(), vec![("cookie", "sid=abc".to_string())]);

        let config = Config {
            api_url: "http://127.0.0.1:8080".to_string(),
            ..Default::default()
        };
        let api = ApiClient::new(&config, session).unwrap();
        assert_eq!(api.exec_url("e", "w").unwrap().scheme(), "ws");
    }
}
