use super::nullable;
use serde::{Deserialize, Serialize};

/// A compute cluster endpoints are placed on (`GET /api/v1/admin/clusters`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Cluster {
    #[serde(deserialize_with = "nullable")]
    pub cluster_id: String,
    #[serde(deserialize_with = "nullable")]
    pub cluster_name: String,
    #[serde(deserialize_with = "nullable")]
    pub region: String,
    #[serde(deserialize_with = "nullable")]
    pub api_endpoint: String,
    /// `active`, `maintenance` or `offline`.
    #[serde(deserialize_with = "nullable")]
    pub status: String,
    #[serde(deserialize_with = "nullable")]
    pub priority: i64,
    #[serde(deserialize_with = "nullable")]
    pub total_gpu_slots: u32,
    #[serde(deserialize_with = "nullable")]
    pub available_gpu_slots: u32,
    pub last_heartbeat_at: Option<String>,
}

/// A spec offered by one cluster, mapped onto a portal spec.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClusterSpec {
    #[serde(deserialize_with = "nullable")]
    pub id: i64,
    #[serde(deserialize_with = "nullable")]
    pub cluster_id: String,
    /// Name of the spec on the cluster side, e.g. `4090-1`.
    #[serde(deserialize_with = "nullable")]
    pub cluster_spec_name: String,
    /// Portal spec it is billed as.
    #[serde(deserialize_with = "nullable")]
    pub spec_name: String,
    #[serde(deserialize_with = "nullable")]
    pub total_capacity: u32,
    #[serde(deserialize_with = "nullable")]
    pub available_capacity: u32,
    #[serde(deserialize_with = "nullable")]
    pub is_available: bool,
}

fn check_capacity(available: u32, total: u32) -> Result<(), String> {
    if total == 0 {
        return Err("Total capacity must be greater than 0".to_string());
    }
    if available > total {
        return Err(format!(
            "Available capacity {} exceeds the total {}",
            available, total
        ));
    }
    Ok(())
}

/// Body of `POST /api/v1/admin/clusters/{id}/specs`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewClusterSpec {
    pub cluster_spec_name: String,
    pub spec_name: String,
    pub total_capacity: u32,
    pub available_capacity: u32,
    pub is_available: bool,
}

impl NewClusterSpec {
    pub fn validate(&self) -> Result<(), String> {
        if self.cluster_spec_name.trim().is_empty() {
            return Err("Cluster spec name is required".to_string());
        }
        if self.spec_name.trim().is_empty() {
            return Err("Portal spec is required".to_string());
        }
        check_capacity(self.available_capacity, self.total_capacity)
    }
}

/// Body of `PUT /api/v1/admin/clusters/{id}/specs`.
///
/// The backend ignores a zero `total_capacity`, so it is only sent when set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClusterSpecUpdate {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_capacity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_capacity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_available: Option<bool>,
}

impl ClusterSpecUpdate {
    /// Flips the availability of `spec`.
    pub fn toggle(spec: &ClusterSpec) -> Self {
        Self {
            id: spec.id,
            is_available: Some(!spec.is_available),
            ..Default::default()
        }
    }

    /// Sets capacity and availability of the spec with `id`.
    pub fn edit(id: i64, available: u32, total: u32, is_available: bool) -> Result<Self, String> {
        check_capacity(available, total)?;
        Ok(Self {
            id,
            total_capacity: Some(total),
            available_capacity: Some(available),
            is_available: Some(is_available),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ClusterSpec {
        ClusterSpec {
            id: 7,
            total_capacity: 10,
            available_capacity: 4,
            is_available: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_cluster_nulls() {
        let cluster: Cluster = serde_json::from_str(
            r#"{"cluster_id": "us-east-1", "cluster_name": "US East", "region": null,
                "status": "active", "priority": 100, "last_heartbeat_at": null}"#,
        )
        .unwrap();
        assert_eq!(cluster.cluster_id, "us-east-1");
        assert!(cluster.region.is_empty());
        assert_eq!(cluster.total_gpu_slots, 0);
    }

    #[test]
    fn test_toggle_sends_only_availability() {
        let update = ClusterSpecUpdate::toggle(&spec());
        assert_eq!(
            serde_json::to_string(&update).unwrap(),
            r#"{"id":7,"is_available":false}"#
        );
    }

    #[test]
    fn test_capacity_checks() {
        let update = ClusterSpecUpdate::edit(7, 6, 10, false).unwrap();
        assert_eq!(
            serde_json::to_string(&update).unwrap(),
            r#"{"id":7,"total_capacity":10,"available_capacity":6,"is_available":false}"#
        );
        assert!(ClusterSpecUpdate::edit(7, 11, 10, true).is_err());
        assert!(ClusterSpecUpdate::edit(7, 0, 0, true).is_err());

        let mut new = NewClusterSpec {
            cluster_spec_name: "4090-1".to_string(),
            spec_name: "GPU-4090".to_string(),
            total_capacity: 8,
            available_capacity: 8,
            is_available: true,
        };
        assert!(new.validate().is_ok());
        new.spec_name.clear();
        assert_eq!(new.validate().unwrap_err(), "Portal spec is required");
    }
}
