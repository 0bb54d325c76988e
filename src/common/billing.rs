use super::nullable;
use serde::Deserialize;

/// Usage summary of `GET /api/v1/billing/usage`, amounts in USD.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Usage {
    #[serde(deserialize_with = "nullable")]
    pub total_amount: f64,
    #[serde(deserialize_with = "nullable")]
    pub total_seconds: f64,
}

impl Usage {
    pub fn total_hours(&self) -> f64 {
        self.total_seconds / 3600.0
    }
}

/// A billed worker run.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BillingRecord {
    #[serde(deserialize_with = "nullable")]
    pub id: i64,
    #[serde(deserialize_with = "nullable")]
    pub worker_id: String,
    #[serde(deserialize_with = "nullable")]
    pub endpoint_name: String,
    #[serde(deserialize_with = "nullable")]
    pub spec_name: String,
    #[serde(deserialize_with = "nullable")]
    pub duration_seconds: f64,
    #[serde(deserialize_with = "nullable")]
    pub amount: f64,
    #[serde(deserialize_with = "nullable")]
    pub status: String,
    pub created_at: Option<String>,
}

/// One page of `GET /api/v1/billing/workers`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BillingPage {
    #[serde(deserialize_with = "nullable")]
    pub records: Vec<BillingRecord>,
    #[serde(deserialize_with = "nullable")]
    pub total: u64,
}
