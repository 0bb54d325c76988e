use super::nullable;
use serde::{Deserialize, Serialize};

/// A hardware spec endpoints can be deployed on.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Spec {
    #[serde(deserialize_with = "nullable")]
    pub spec_name: String,
    /// `GPU` or `CPU`.
    #[serde(deserialize_with = "nullable")]
    pub spec_type: String,
    pub gpu_type: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub gpu_count: u32,
    #[serde(deserialize_with = "nullable")]
    pub cpu_cores: u32,
    #[serde(deserialize_with = "nullable")]
    pub ram_gb: u32,
    #[serde(deserialize_with = "nullable")]
    pub description: String,
    #[serde(deserialize_with = "nullable")]
    pub price_per_hour: f64,
    pub available_capacity: Option<u32>,
    pub total_capacity: Option<u32>,
}

impl Spec {
    pub fn is_gpu(&self) -> bool {
        self.spec_type.eq_ignore_ascii_case("GPU")
    }

    /// e.g. `2x A100-40GB` for GPU specs, `16 vCPU` otherwise.
    pub fn compute(&self) -> String {
        match (&self.gpu_type, self.is_gpu()) {
            (Some(gpu), true) if !gpu.is_empty() => format!("{}x {}", self.gpu_count.max(1), gpu),
            _ => format!("{} vCPU", self.cpu_cores),
        }
    }
}

/// A catalog row as managed by admins (`GET /api/v1/admin/specs`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AdminSpec {
    #[serde(deserialize_with = "nullable")]
    pub id: i64,
    #[serde(deserialize_with = "nullable")]
    pub spec_name: String,
    #[serde(deserialize_with = "nullable")]
    pub spec_type: String,
    #[serde(deserialize_with = "nullable")]
    pub gpu_type: String,
    #[serde(deserialize_with = "nullable")]
    pub gpu_count: u32,
    #[serde(deserialize_with = "nullable")]
    pub cpu_cores: u32,
    #[serde(deserialize_with = "nullable")]
    pub ram_gb: u32,
    #[serde(deserialize_with = "nullable")]
    pub disk_gb: u32,
    /// USD.
    #[serde(deserialize_with = "nullable")]
    pub price_per_hour: f64,
    #[serde(deserialize_with = "nullable")]
    pub description: String,
    #[serde(deserialize_with = "nullable")]
    pub is_available: bool,
}

/// Body of `POST /api/v1/admin/specs`, and of `PUT` when `id` is set.
///
/// The backend skips zero and empty fields on update, so a spec cannot be
/// cleared to zero from here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub spec_name: String,
    pub spec_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub gpu_type: String,
    pub gpu_count: u32,
    pub cpu_cores: u32,
    pub ram_gb: u32,
    pub disk_gb: u32,
    pub price_per_hour: f64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub is_available: bool,
}

impl Default for SpecPayload {
    /// What a new spec starts from.
    fn default() -> Self {
        Self {
            id: None,
            spec_name: String::new(),
            spec_type: "GPU".to_string(),
            gpu_type: String::new(),
            gpu_count: 1,
            cpu_cores: 8,
            ram_gb: 32,
            disk_gb: 100,
            price_per_hour: 0.0,
            description: String::new(),
            is_available: true,
        }
    }
}

impl From<&AdminSpec> for SpecPayload {
    fn from(spec: &AdminSpec) -> Self {
        Self {
            id: Some(spec.id),
            spec_name: spec.spec_name.clone(),
            spec_type: spec.spec_type.clone(),
            gpu_type: spec.gpu_type.clone(),
            gpu_count: spec.gpu_count,
            cpu_cores: spec.cpu_cores,
            ram_gb: spec.ram_gb,
            disk_gb: spec.disk_gb,
            price_per_hour: spec.price_per_hour,
            description: spec.description.clone(),
            is_available: spec.is_available,
        }
    }
}

impl SpecPayload {
    /// Checks what the backend would otherwise reject or store broken.
    pub fn validate(&self) -> Result<(), String> {
        if self.spec_name.trim().is_empty() {
            return Err("Spec name is required".to_string());
        }
        let gpu = match self.spec_type.as_str() {
            "GPU" => true,
            "CPU" => false,
            other => return Err(format!("Type must be GPU or CPU, not {:?}", other)),
        };
        if gpu && (self.gpu_type.trim().is_empty() || self.gpu_count == 0) {
            return Err("GPU specs need a GPU type and count".to_string());
        }
        if self.cpu_cores == 0 || self.ram_gb == 0 {
            return Err("CPU cores and RAM must be greater than 0".to_string());
        }
        if !self.price_per_hour.is_finite() || self.price_per_hour <= 0.0 {
            return Err("Price must be greater than 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_compute() {
        let gpu: Spec = serde_json::from_str(
            r#"{"spec_name": "GPU-A100-40GB", "spec_type": "GPU", "gpu_type": "A100-40GB",
                "gpu_count": 2, "cpu_cores": 16, "ram_gb": 128, "price_per_hour": 2.4}"#,
        )
        .unwrap();
        assert_eq!(gpu.compute(), "2x A100-40GB");

        let cpu: Spec = serde_json::from_str(
            r#"{"spec_name": "CPU-4C-8G", "spec_type": "CPU", "gpu_type": null, "cpu_cores": 4}"#,
        )
        .unwrap();
        assert!(!cpu.is_gpu());
        assert_eq!(cpu.compute(), "4 vCPU");
    }

    #[test]
    fn test_spec_payload() {
        let spec: AdminSpec = serde_json::from_str(
            r#"{"id": 4, "spec_name": "CPU-4C-8G", "spec_type": "CPU", "gpu_type": "",
                "gpu_count": 0, "cpu_cores": 4, "ram_gb": 8, "disk_gb": null,
                "price_per_hour": 0.12, "description": null, "is_available": true}"#,
        )
        .unwrap();
        let mut payload = SpecPayload::from(&spec);
        assert!(payload.validate().is_ok());
        let body = serde_json::to_value(&payload).unwrap();
        assert_eq!(body["id"], 4);
        assert!(body.get("gpu_type").is_none());

        payload.spec_type = "GPU".to_string();
        assert!(payload.validate().is_err());
        payload.spec_type = "TPU".to_string();
        assert!(payload.validate().is_err());

        let new = SpecPayload {
            spec_name: "GPU-L4".to_string(),
            gpu_type: "L4".to_string(),
            price_per_hour: 0.8,
            ..Default::default()
        };
        assert!(new.validate().is_ok());
        assert!(!serde_json::to_string(&new).unwrap().contains("\"id\""));
    }
}
