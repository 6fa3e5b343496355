use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::capability::CapabilitySet;

/// Current reachability state of a registered endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointStatus {
    Unknown,
    Online,
    Offline,
}

/// A registered MCP server addressed by an absolute URL and owned by a tenant.
///
/// Invariants: URL is unique within tenant; `status`,
/// `last_checked`, and `last_response_time_ms` always move forward together
/// in a single write; soft-deleted endpoints never appear in listings but
/// their history remains readable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub url: String,
    pub endpoint_type: String,
    pub status: EndpointStatus,
    pub last_checked: Option<DateTime<Utc>>,
    pub last_response_time_ms: Option<u64>,
    pub protocol_version: Option<String>,
    pub capabilities: Option<CapabilitySet>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Endpoint {
    pub fn new(tenant_id: Uuid, name: impl Into<String>, url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.into(),
            url: url.into(),
            endpoint_type: "mcp".to_string(),
            status: EndpointStatus::Unknown,
            last_checked: None,
            last_response_time_ms: None,
            protocol_version: None,
            capabilities: None,
            deleted_at: None,
            created_at: now,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Apply a probe outcome: status, `last_checked`, and response time move
    /// forward together in one write.
    pub fn apply_probe(
        &mut self,
        status: EndpointStatus,
        checked_at: DateTime<Utc>,
        response_time_ms: Option<u64>,
    ) {
        self.status = status;
        self.last_checked = Some(checked_at);
        self.last_response_time_ms = response_time_ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_endpoint_starts_unknown() {
        let ep = Endpoint::new(Uuid::new_v4(), "test", "http://localhost:3000");
        assert_eq!(ep.status, EndpointStatus::Unknown);
        assert!(ep.last_checked.is_none());
        assert!(!ep.is_deleted());
    }

    #[test]
    fn apply_probe_moves_fields_together() {
        let mut ep = Endpoint::new(Uuid::new_v4(), "test", "http://localhost:3000");
        let now = Utc::now();
        ep.apply_probe(EndpointStatus::Online, now, Some(42));
        assert_eq!(ep.status, EndpointStatus::Online);
        assert_eq!(ep.last_checked, Some(now));
        assert_eq!(ep.last_response_time_ms, Some(42));
    }
}
