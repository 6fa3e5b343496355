//! The persistence port: a typed boundary the rest of the core depends on,
//! with one `SQLite`-backed implementation and one in-memory implementation
//! for tests. Callers never know which backend they're on.

mod memory;
mod sqlite;

pub use memory::InMemoryPersistence;
pub use sqlite::SqlitePersistence;

use crate::domain::{Alert, Endpoint, Execution, ProbeOutcome, StatusHistoryEntry, Tool};
use crate::errors::SentinelResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Pagination {
    pub fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }
}

/// Optional filters for `Tool` listing.
#[derive(Debug, Clone, Default)]
pub struct ToolFilters {
    pub endpoint_id: Option<Uuid>,
    pub category: Option<String>,
    pub risk_level: Option<crate::domain::RiskLevel>,
    pub enabled: Option<bool>,
}

/// Aggregated usage statistics over one tool's `Execution` history.
#[derive(Debug, Clone)]
pub struct ToolUsageStats {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub mean_duration_ms: f64,
    pub last_execution_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait PersistencePort: Send + Sync {
    async fn create_endpoint(&self, endpoint: Endpoint) -> SentinelResult<Endpoint>;
    async fn get_endpoint(&self, id: Uuid) -> SentinelResult<Option<Endpoint>>;
    async fn list_endpoints_by_tenant(
        &self,
        tenant_id: Uuid,
        page: Pagination,
    ) -> SentinelResult<Vec<Endpoint>>;
    async fn soft_delete_endpoint(&self, id: Uuid, at: DateTime<Utc>) -> SentinelResult<()>;

    /// Writes one `StatusHistoryEntry` and updates the endpoint's current
    /// status fields in a single logical step. Ordering guarantee: the
    /// history row is durable before the status update is visible to
    /// readers.
    async fn record_probe(
        &self,
        endpoint_id: Uuid,
        outcome: ProbeOutcome,
        response_time_ms: Option<u64>,
        error: Option<String>,
        at: DateTime<Utc>,
    ) -> SentinelResult<StatusHistoryEntry>;

    async fn list_status_history(
        &self,
        endpoint_id: Uuid,
        page: Pagination,
    ) -> SentinelResult<Vec<StatusHistoryEntry>>;

    async fn append_alert(&self, alert: Alert) -> SentinelResult<Alert>;
    async fn list_alerts_by_tenant(
        &self,
        tenant_id: Uuid,
        page: Pagination,
    ) -> SentinelResult<Vec<Alert>>;
    async fn resolve_alert(
        &self,
        id: Uuid,
        resolver: &str,
        at: DateTime<Utc>,
    ) -> SentinelResult<()>;

    /// Upsert on `(endpoint_id, name)`: preserves `id`, `enabled`, and
    /// `usage_count` across re-discovery.
    async fn upsert_tool(&self, tool: Tool) -> SentinelResult<Tool>;
    async fn get_tool(&self, id: Uuid) -> SentinelResult<Option<Tool>>;
    async fn list_tools(&self, filters: ToolFilters) -> SentinelResult<Vec<Tool>>;
    async fn record_tool_usage(&self, id: Uuid, at: DateTime<Utc>) -> SentinelResult<()>;

    async fn append_execution(&self, execution: Execution) -> SentinelResult<Execution>;
    async fn tool_usage_stats(&self, tool_id: Uuid) -> SentinelResult<ToolUsageStats>;
}
