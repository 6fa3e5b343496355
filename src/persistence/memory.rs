use super::{Pagination, PersistencePort, ToolFilters, ToolUsageStats};
use crate::domain::{
    Alert, Endpoint, Execution, ExecutionStatus, ProbeOutcome, StatusHistoryEntry, Tool,
};
use crate::errors::{SentinelError, SentinelResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Pure in-memory implementation for unit tests that don't need durability.
/// `Vec`/`HashMap` behind a mutex, same connection-guard shape as the
/// `SQLite` backend but without the disk.
#[derive(Default)]
pub struct InMemoryPersistence {
    endpoints: Mutex<HashMap<Uuid, Endpoint>>,
    history: Mutex<Vec<StatusHistoryEntry>>,
    alerts: Mutex<HashMap<Uuid, Alert>>,
    tools: Mutex<HashMap<Uuid, Tool>>,
    executions: Mutex<Vec<Execution>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistencePort for InMemoryPersistence {
    async fn create_endpoint(&self, endpoint: Endpoint) -> SentinelResult<Endpoint> {
        let mut endpoints = self.endpoints.lock().unwrap();
        endpoints.insert(endpoint.id, endpoint.clone());
        Ok(endpoint)
    }

    async fn get_endpoint(&self, id: Uuid) -> SentinelResult<Option<Endpoint>> {
        Ok(self.endpoints.lock().unwrap().get(&id).cloned())
    }

    async fn list_endpoints_by_tenant(
        &self,
        tenant_id: Uuid,
        page: Pagination,
    ) -> SentinelResult<Vec<Endpoint>> {
        let endpoints = self.endpoints.lock().unwrap();
        let mut matched: Vec<Endpoint> = endpoints
            .values()
            .filter(|e| e.tenant_id == tenant_id && !e.is_deleted())
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(paginate(matched, page))
    }

    async fn soft_delete_endpoint(&self, id: Uuid, at: DateTime<Utc>) -> SentinelResult<()> {
        let mut endpoints = self.endpoints.lock().unwrap();
        let endpoint = endpoints
            .get_mut(&id)
            .ok_or_else(|| SentinelError::NotFound(format!("endpoint {id}")))?;
        endpoint.deleted_at = Some(at);
        Ok(())
    }

    async fn record_probe(
        &self,
        endpoint_id: Uuid,
        outcome: ProbeOutcome,
        response_time_ms: Option<u64>,
        error: Option<String>,
        at: DateTime<Utc>,
    ) -> SentinelResult<StatusHistoryEntry> {
        let entry = StatusHistoryEntry {
            id: Uuid::new_v4(),
            endpoint_id,
            outcome,
            response_time_ms,
            error,
            timestamp: at,
        };
        self.history.lock().unwrap().push(entry.clone());

        let mut endpoints = self.endpoints.lock().unwrap();
        if let Some(endpoint) = endpoints.get_mut(&endpoint_id) {
            endpoint.apply_probe(outcome.into(), at, response_time_ms);
        }
        Ok(entry)
    }

    async fn list_status_history(
        &self,
        endpoint_id: Uuid,
        page: Pagination,
    ) -> SentinelResult<Vec<StatusHistoryEntry>> {
        let history = self.history.lock().unwrap();
        let matched: Vec<StatusHistoryEntry> = history
            .iter()
            .filter(|e| e.endpoint_id == endpoint_id)
            .cloned()
            .collect();
        Ok(paginate(matched, page))
    }

    async fn append_alert(&self, alert: Alert) -> SentinelResult<Alert> {
        self.alerts.lock().unwrap().insert(alert.id, alert.clone());
        Ok(alert)
    }

    async fn list_alerts_by_tenant(
        &self,
        tenant_id: Uuid,
        page: Pagination,
    ) -> SentinelResult<Vec<Alert>> {
        let alerts = self.alerts.lock().unwrap();
        let mut matched: Vec<Alert> = alerts
            .values()
            .filter(|a| a.tenant_id == tenant_id)
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(paginate(matched, page))
    }

    async fn resolve_alert(
        &self,
        id: Uuid,
        resolver: &str,
        at: DateTime<Utc>,
    ) -> SentinelResult<()> {
        let mut alerts = self.alerts.lock().unwrap();
        let alert = alerts
            .get_mut(&id)
            .ok_or_else(|| SentinelError::NotFound(format!("alert {id}")))?;
        alert.resolve(resolver, at);
        Ok(())
    }

    async fn upsert_tool(&self, tool: Tool) -> SentinelResult<Tool> {
        let mut tools = self.tools.lock().unwrap();
        let existing = tools
            .values()
            .find(|t| t.endpoint_id == tool.endpoint_id && t.name == tool.name)
            .cloned();

        let merged = match existing {
            Some(existing) => Tool {
                id: existing.id,
                enabled: existing.enabled,
                usage_count: existing.usage_count,
                last_used: existing.last_used,
                ..tool
            },
            None => tool,
        };
        tools.insert(merged.id, merged.clone());
        Ok(merged)
    }

    async fn get_tool(&self, id: Uuid) -> SentinelResult<Option<Tool>> {
        Ok(self.tools.lock().unwrap().get(&id).cloned())
    }

    async fn list_tools(&self, filters: ToolFilters) -> SentinelResult<Vec<Tool>> {
        let tools = self.tools.lock().unwrap();
        let mut matched: Vec<Tool> = tools
            .values()
            .filter(|t| {
                filters.endpoint_id.is_none_or(|id| t.endpoint_id == id)
                    && filters
                        .category
                        .as_deref()
                        .is_none_or(|c| t.category == c)
                    && filters.risk_level.is_none_or(|r| t.risk_level == r)
                    && filters.enabled.is_none_or(|e| t.enabled == e)
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.usage_count.cmp(&a.usage_count).then_with(|| a.name.cmp(&b.name)));
        Ok(matched)
    }

    async fn record_tool_usage(&self, id: Uuid, at: DateTime<Utc>) -> SentinelResult<()> {
        let mut tools = self.tools.lock().unwrap();
        let tool = tools
            .get_mut(&id)
            .ok_or_else(|| SentinelError::NotFound(format!("tool {id}")))?;
        tool.record_usage(at);
        Ok(())
    }

    async fn append_execution(&self, execution: Execution) -> SentinelResult<Execution> {
        self.executions.lock().unwrap().push(execution.clone());
        Ok(execution)
    }

    async fn tool_usage_stats(&self, tool_id: Uuid) -> SentinelResult<ToolUsageStats> {
        let executions = self.executions.lock().unwrap();
        let matched: Vec<&Execution> = executions.iter().filter(|e| e.tool_id == tool_id).collect();

        let total = matched.len() as u64;
        let successful = matched
            .iter()
            .filter(|e| e.status == ExecutionStatus::Completed)
            .count() as u64;
        let failed = matched
            .iter()
            .filter(|e| e.status == ExecutionStatus::Failed)
            .count() as u64;
        let durations: Vec<u64> = matched.iter().filter_map(|e| e.duration_ms).collect();
        let mean_duration_ms = if durations.is_empty() {
            0.0
        } else {
            durations.iter().sum::<u64>() as f64 / durations.len() as f64
        };
        let last_execution_at = matched.iter().map(|e| e.started_at).max();

        Ok(ToolUsageStats {
            total,
            successful,
            failed,
            mean_duration_ms,
            last_execution_at,
        })
    }
}

fn paginate<T>(items: Vec<T>, page: Pagination) -> Vec<T> {
    if page.limit == 0 {
        return items;
    }
    items
        .into_iter()
        .skip(page.offset as usize)
        .take(page.limit as usize)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AlertSeverity, EndpointStatus};

    fn sample_endpoint() -> Endpoint {
        Endpoint::new(Uuid::new_v4(), "test", "http://localhost:3000")
    }

    #[tokio::test]
    async fn record_probe_writes_history_and_updates_status() {
        let store = InMemoryPersistence::new();
        let endpoint = sample_endpoint();
        let id = endpoint.id;
        store.create_endpoint(endpoint).await.unwrap();

        store
            .record_probe(id, ProbeOutcome::Online, Some(12), None, Utc::now())
            .await
            .unwrap();

        let stored = store.get_endpoint(id).await.unwrap().unwrap();
        assert_eq!(stored.status, EndpointStatus::Online);

        let history = store
            .list_status_history(id, Pagination::default())
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].outcome, ProbeOutcome::Online);
    }

    #[tokio::test]
    async fn upsert_tool_preserves_id_enabled_and_usage() {
        let store = InMemoryPersistence::new();
        let endpoint_id = Uuid::new_v4();
        let first = Tool {
            id: Uuid::new_v4(),
            endpoint_id,
            endpoint_url: "http://x".into(),
            name: "read_file".into(),
            description: "reads a file".into(),
            input_schema: serde_json::json!({}),
            category: "filesystem".into(),
            tags: vec![],
            risk_level: crate::domain::RiskLevel::Low,
            enabled: true,
            usage_count: 0,
            last_used: None,
            updated_at: Utc::now(),
        };
        let stored_first = store.upsert_tool(first.clone()).await.unwrap();
        store.record_tool_usage(stored_first.id, Utc::now()).await.unwrap();
        store.record_tool_usage(stored_first.id, Utc::now()).await.unwrap();

        let mut rediscovered = first.clone();
        rediscovered.id = Uuid::new_v4(); // discovery never knows the stored id
        rediscovered.description = "reads a file, updated".into();
        rediscovered.enabled = false; // caller's fresh discovery always enables by default
        let merged = store.upsert_tool(rediscovered).await.unwrap();

        assert_eq!(merged.id, stored_first.id);
        assert_eq!(merged.usage_count, 2);
        assert!(merged.enabled);
        assert_eq!(merged.description, "reads a file, updated");
    }

    #[tokio::test]
    async fn resolve_alert_is_idempotent() {
        let store = InMemoryPersistence::new();
        let alert = Alert::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            AlertSeverity::Critical,
            "Server offline",
            "ping failed",
            serde_json::json!({}),
        );
        let id = alert.id;
        store.append_alert(alert).await.unwrap();

        store.resolve_alert(id, "op-a", Utc::now()).await.unwrap();
        store.resolve_alert(id, "op-b", Utc::now()).await.unwrap();

        let alerts = store
            .list_alerts_by_tenant(Uuid::nil(), Pagination::default())
            .await
            .unwrap();
        assert!(alerts.is_empty()); // different random tenant id, sanity check isolation
    }
}
