use super::nullable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A deployed endpoint, as returned by `GET /api/v1/endpoints/{name}`.
///
/// The backend merges a live detail object (camelCase) with its own record
/// (snake_case), and falls back to the record alone when the cluster is
/// unreachable, so both spellings are accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Name the user sees, e.g. `my-model`.
    #[serde(default, deserialize_with = "nullable")]
    pub logical_name: String,
    /// Name on the cluster side.
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable", alias = "specName")]
    pub spec_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub status: String,
    #[serde(default, deserialize_with = "nullable")]
    pub image: String,
    #[serde(default, deserialize_with = "nullable")]
    pub replicas: u32,
    #[serde(default, deserialize_with = "nullable", alias = "readyReplicas")]
    pub ready_replicas: u32,
    #[serde(default, deserialize_with = "nullable", alias = "minReplicas")]
    pub min_replicas: u32,
    #[serde(default, deserialize_with = "nullable", alias = "maxReplicas")]
    pub max_replicas: u32,
    /// Task timeout in seconds.
    #[serde(default, deserialize_with = "nullable", alias = "taskTimeout")]
    pub task_timeout: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub price_per_hour: f64,
    #[serde(default, deserialize_with = "nullable")]
    pub cluster_id: String,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub env: BTreeMap<String, String>,
}

impl Endpoint {
    /// The name to show and to address the endpoint with.
    pub fn display_name(&self) -> &str {
        if self.logical_name.is_empty() {
            &self.name
        } else {
            &self.logical_name
        }
    }
}

/// A row of `GET /api/v1/endpoints`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointSummary {
    #[serde(default)]
    pub id: i64,
    pub logical_name: String,
    #[serde(default, deserialize_with = "nullable", alias = "specName")]
    pub spec_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub spec_type: String,
    #[serde(default, deserialize_with = "nullable")]
    pub cluster_id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub status: String,
    #[serde(default, deserialize_with = "nullable")]
    pub replicas: u32,
    #[serde(default, deserialize_with = "nullable")]
    pub current_replicas: u32,
    #[serde(default, deserialize_with = "nullable")]
    pub price_per_hour: f64,
}

/// Body of `PUT /api/v1/endpoints/{name}`, only set fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EndpointUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,
}

/// Body of `PUT /api/v1/endpoints/{name}/config`, only set fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointConfigUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_replicas: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_replicas: Option<u32>,
}

/// Body of `POST /api/v1/endpoints`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewEndpoint {
    pub logical_name: String,
    pub spec_name: String,
    pub image: String,
    pub replicas: u32,
    pub min_replicas: u32,
    pub max_replicas: u32,
    pub task_timeout: u64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Name of a registry credential for pulling a private image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_credential_name: Option<String>,
}

impl NewEndpoint {
    /// Checks what the backend would otherwise reject.
    pub fn validate(&self) -> Result<(), String> {
        if self.logical_name.is_empty() {
            return Err("Endpoint name is required".to_string());
        }
        if !self
            .logical_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err("Endpoint name may only contain letters, numbers and hyphens".to_string());
        }
        if self.image.trim().is_empty() {
            return Err("Docker image is required".to_string());
        }
        if self.max_replicas == 0 {
            return Err("Max replicas must be at least 1".to_string());
        }
        if self.min_replicas > self.max_replicas {
            return Err(format!(
                "Min replicas {} exceeds max replicas {}",
                self.min_replicas, self.max_replicas
            ));
        }
        if self.replicas > self.max_replicas {
            return Err(format!(
                "Replicas {} exceeds max replicas {}",
                self.replicas, self.max_replicas
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_endpoint_validation() {
        let mut draft = NewEndpoint {
            logical_name: "my-model".to_string(),
            spec_name: "GPU-A100-40GB".to_string(),
            image: "registry/model:latest".to_string(),
            replicas: 1,
            min_replicas: 0,
            max_replicas: 3,
            task_timeout: 3600,
            env: BTreeMap::new(),
            registry_credential_name: None,
        };
        assert!(draft.validate().is_ok());
        let body = serde_json::to_string(&draft).unwrap();
        assert!(!body.contains("env"));
        assert!(!body.contains("registry_credential_name"));

        draft.logical_name = "my_model".to_string();
        assert!(draft.validate().is_err());
        draft.logical_name = "my-model".to_string();

        draft.min_replicas = 4;
        assert!(draft.validate().is_err());
        draft.min_replicas = 0;

        draft.replicas = 5;
        assert!(draft.validate().is_err());
    }

    #[test]
    fn test_endpoint_accepts_both_spellings() {
        let live: Endpoint = serde_json::from_str(
            r#"{
                "name": "user-my-endpoint",
                "logical_name": "my-endpoint",
                "specName": "GPU-A100-40GB",
                "status": "Running",
                "replicas": 2,
                "readyReplicas": 1,
                "minReplicas": 0,
                "maxReplicas": 4,
                "taskTimeout": 600,
                "createdAt": "2025-01-02T03:04:05Z",
                "price_per_hour": 1.5,
                "env": {"MODEL": "sdxl"}
            }"#,
        )
        .unwrap();

        let stored: Endpoint = serde_json::from_str(
            r#"{
                "logical_name": "my-endpoint",
                "spec_name": "GPU-A100-40GB",
                "replicas": 2,
                "min_replicas": 0,
                "max_replicas": 4,
                "task_timeout": 600,
                "created_at": "2025-01-02T03:04:05Z",
                "env": null,
                "image": null
            }"#,
        )
        .unwrap();

        assert_eq!(live.display_name(), "my-endpoint");
        assert_eq!(live.ready_replicas, 1);
        assert_eq!(live.env.get("MODEL").map(String::as_str), Some("sdxl"));
        assert_eq!(stored.spec_name, live.spec_name);
        assert_eq!(stored.task_timeout, live.task_timeout);
        assert_eq!(stored.created_at, live.created_at);
        assert!(stored.env.is_empty());
        assert!(stored.image.is_empty());
    }

    #[test]
    fn test_updates_send_only_set_fields() {
        let update = EndpointUpdate {
            replicas: Some(0),
            ..Default::default()
        };
        assert_eq!(serde_json::to_string(&update).unwrap(), r#"{"replicas":0}"#);

        let config = EndpointConfigUpdate {
            min_replicas: Some(1),
            max_replicas: Some(3),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_string(&config).unwrap(),
            r#"{"minReplicas":1,"maxReplicas":3}"#
        );
    }
}
