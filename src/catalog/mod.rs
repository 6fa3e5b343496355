//! Tool Catalog: discovery, filtered listing, validated invocation, and
//! usage accounting over the tools advertised by registered endpoints.

mod classify;

use crate::domain::{Endpoint, Execution, Tool};
use crate::errors::{SentinelError, SentinelResult};
use crate::persistence::{PersistencePort, ToolFilters, ToolUsageStats};
use crate::protocol::{ProtocolClient, TOOL_CALL_TIMEOUT};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// `getToolUsageStats` plus the derived popularity score.
#[derive(Debug, Clone)]
pub struct ToolPopularity {
    pub stats: ToolUsageStats,
    pub popularity: f64,
}

pub struct ToolCatalog {
    client: Arc<ProtocolClient>,
    persistence: Arc<dyn PersistencePort>,
}

impl ToolCatalog {
    pub fn new(client: Arc<ProtocolClient>, persistence: Arc<dyn PersistencePort>) -> Self {
        Self { client, persistence }
    }

    /// `initialize` then `tools/list`; upsert each advertised tool on
    /// `(endpoint_id, name)`. Returns the upserted rows in listing order.
    pub async fn discover_tools(&self, endpoint: &Endpoint) -> SentinelResult<Vec<Tool>> {
        self.client
            .initialize(&endpoint.url, crate::protocol::DEFAULT_CALL_TIMEOUT)
            .await?;
        let listed = self
            .client
            .list_tools(&endpoint.url, crate::protocol::DEFAULT_CALL_TIMEOUT)
            .await?;

        let now = Utc::now();
        let mut tools = Vec::with_capacity(listed.tools.len());
        for info in listed.tools {
            let description = info.description.unwrap_or_default();
            let input_schema = info.input_schema.unwrap_or_else(|| serde_json::json!({}));
            let category = classify::derive_category(&info.name, &description);
            let tags = classify::derive_tags(&info.name, &description);
            let risk_level = classify::derive_risk_level(&info.name, &input_schema);

            let candidate = Tool {
                id: Uuid::new_v4(),
                endpoint_id: endpoint.id,
                endpoint_url: endpoint.url.clone(),
                name: info.name,
                description,
                input_schema,
                category,
                tags,
                risk_level,
                enabled: true,
                usage_count: 0,
                last_used: None,
                updated_at: now,
            };
            tools.push(self.persistence.upsert_tool(candidate).await?);
        }
        Ok(tools)
    }

    pub async fn list_tools(&self, filters: ToolFilters) -> SentinelResult<Vec<Tool>> {
        self.persistence.list_tools(filters).await
    }

    /// Validate, invoke, record. Always writes a terminal `Execution` and
    /// bumps usage accounting, whether the call succeeded or failed —
    /// only a precondition failure (not found / disabled / invalid
    /// arguments) skips the remote call and the usage bump entirely.
    pub async fn execute_tool(
        &self,
        tool_id: Uuid,
        arguments: Value,
        user_id: Option<String>,
    ) -> SentinelResult<Execution> {
        let tool = self
            .persistence
            .get_tool(tool_id)
            .await?
            .ok_or_else(|| SentinelError::NotFound(format!("tool {tool_id}")))?;
        if !tool.enabled {
            return Err(SentinelError::Disabled(tool.name));
        }
        validate_arguments(&tool.input_schema, &arguments)?;

        let mut execution = Execution::start(tool.id, tool.endpoint_id, user_id, arguments.clone());
        let started = std::time::Instant::now();
        let result = self
            .client
            .call_tool(&tool.endpoint_url, &tool.name, arguments, TOOL_CALL_TIMEOUT)
            .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(value) => execution.complete(value, duration_ms),
            Err(e) => execution.fail(e.to_string(), duration_ms),
        }

        let now = Utc::now();
        self.persistence.record_tool_usage(tool.id, now).await?;
        self.persistence.append_execution(execution).await
    }

    pub async fn tool_usage_stats(&self, tool_id: Uuid) -> SentinelResult<ToolPopularity> {
        let stats = self.persistence.tool_usage_stats(tool_id).await?;
        let popularity = popularity_score(&stats, Utc::now());
        Ok(ToolPopularity { stats, popularity })
    }
}

fn popularity_score(stats: &ToolUsageStats, now: chrono::DateTime<Utc>) -> f64 {
    if stats.total == 0 {
        return 0.0;
    }
    let success_rate = stats.successful as f64 / stats.total as f64;
    let recency_factor = match stats.last_execution_at {
        Some(last) => {
            let days_since = (now - last).num_seconds() as f64 / 86_400.0;
            1.0 / (1.0 + days_since.max(0.0) / 30.0)
        }
        None => 0.0,
    };
    stats.total as f64 * success_rate * recency_factor
}

/// Minimal JSON-Schema-shaped validation: required properties present,
/// no properties outside the declared set. Anything deeper (type
/// checking, nested schemas) is explicitly out of scope.
fn validate_arguments(schema: &Value, arguments: &Value) -> SentinelResult<()> {
    let Some(schema_obj) = schema.as_object() else {
        return Ok(());
    };
    let properties = schema_obj.get("properties").and_then(Value::as_object);
    let required = schema_obj
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect::<Vec<_>>())
        .unwrap_or_default();

    let args_obj = arguments.as_object();

    for name in &required {
        let present = args_obj.is_some_and(|obj| obj.contains_key(*name));
        if !present {
            return Err(SentinelError::Validation(format!(
                "missing required property '{name}'"
            )));
        }
    }

    if let (Some(properties), Some(args_obj)) = (properties, args_obj) {
        for key in args_obj.keys() {
            if !properties.contains_key(key) {
                return Err(SentinelError::Validation(format!(
                    "property '{key}' is not declared in the tool's input schema"
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RiskLevel;
    use crate::persistence::InMemoryPersistence;
    use crate::utils::http::default_http_client;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn discover_tools_classifies_and_upserts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "initialize"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {"name": "demo", "capabilities": {"tools": {}}}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "notifications/initialized"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jsonrpc": "2.0", "id": null, "result": {}})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "tools/list"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 2,
                "result": {"tools": [
                    {"name": "delete_file", "description": "deletes a file", "inputSchema": {"properties": {"path": {"type": "string"}}, "required": ["path"]}}
                ]}
            })))
            .mount(&server)
            .await;

        let endpoint = Endpoint::new(Uuid::new_v4(), "test", server.uri());
        let persistence: Arc<dyn PersistencePort> = Arc::new(InMemoryPersistence::new());
        let catalog = ToolCatalog::new(
            Arc::new(ProtocolClient::new(default_http_client())),
            persistence,
        );

        let tools = catalog.discover_tools(&endpoint).await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].category, "filesystem");
        assert_eq!(tools[0].risk_level, RiskLevel::High);
    }

    #[test]
    fn validate_arguments_rejects_unknown_property() {
        let schema = json!({"properties": {"path": {"type": "string"}}, "required": ["path"]});
        let args = json!({"path": "/tmp", "extra": true});
        assert!(validate_arguments(&schema, &args).is_err());
    }

    #[test]
    fn validate_arguments_rejects_missing_required() {
        let schema = json!({"properties": {"path": {"type": "string"}}, "required": ["path"]});
        assert!(validate_arguments(&schema, &json!({})).is_err());
    }

    #[test]
    fn validate_arguments_accepts_conforming_input() {
        let schema = json!({"properties": {"path": {"type": "string"}}, "required": ["path"]});
        assert!(validate_arguments(&schema, &json!({"path": "/tmp"})).is_ok());
    }

    #[test]
    fn popularity_is_zero_with_no_executions() {
        let stats = ToolUsageStats {
            total: 0,
            successful: 0,
            failed: 0,
            mean_duration_ms: 0.0,
            last_execution_at: None,
        };
        assert_eq!(popularity_score(&stats, Utc::now()), 0.0);
    }

    #[test]
    fn popularity_decays_with_recency() {
        let now = Utc::now();
        let stats = ToolUsageStats {
            total: 10,
            successful: 10,
            failed: 0,
            mean_duration_ms: 5.0,
            last_execution_at: Some(now - chrono::Duration::days(30)),
        };
        let popularity = popularity_score(&stats, now);
        assert!(popularity > 0.0 && popularity < 10.0);
    }
}
