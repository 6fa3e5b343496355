use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// A catalog entry bound to an endpoint.
///
/// Uniqueness: `(endpoint_id, name)`. Invariants: re-discovery of the same
/// `(endpoint, name)` upserts description/schema/category/tags/risk, never
/// changes `id`; disabled tools reject invocation; `usage_count` is
/// monotonically non-decreasing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub id: Uuid,
    pub endpoint_id: Uuid,
    pub endpoint_url: String,
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
    pub category: String,
    pub tags: Vec<String>,
    pub risk_level: RiskLevel,
    pub enabled: bool,
    pub usage_count: u64,
    pub last_used: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Tool {
    pub fn record_usage(&mut self, at: DateTime<Utc>) {
        self.usage_count += 1;
        self.last_used = Some(at);
    }
}
