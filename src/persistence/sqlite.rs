use super::{Pagination, PersistencePort, ToolFilters, ToolUsageStats};
use crate::domain::{
    Alert, AlertSeverity, Endpoint, EndpointStatus, Execution, ExecutionStatus, ProbeOutcome,
    RiskLevel, StatusHistoryEntry, Tool,
};
use crate::errors::{SentinelError, SentinelResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// `SQLite`-backed persistence. The connection lives behind an
/// `Arc<Mutex<Connection>>` — `SQLite` serializes writers internally, the
/// mutex exists purely so one connection can be shared across async tasks.
/// WAL mode keeps concurrent readers unblocked. Every call dispatches its
/// blocking work through `spawn_blocking` so no async task stalls on disk
/// I/O.
pub struct SqlitePersistence {
    conn: Arc<Mutex<Connection>>,
    db_path: String,
}

/// Opens a fresh connection to the same file rather than sharing the
/// `Arc`. Panics on failure: callers depend on the clone being backed by the
/// same database, and a silent in-memory fallback would just lose writes.
/// An in-memory store (`db_path == ":memory:"`) panics unconditionally on
/// clone — a fresh `:memory:` connection is a different, empty database.
impl Clone for SqlitePersistence {
    fn clone(&self) -> Self {
        if self.db_path == ":memory:" {
            panic!("SqlitePersistence backed by an in-memory database cannot be cloned");
        }
        let conn = Connection::open(&self.db_path)
            .unwrap_or_else(|e| panic!("failed to re-open {} for clone: {e}", self.db_path));
        if let Err(e) = conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA busy_timeout=3000;
             PRAGMA foreign_keys=ON;",
        ) {
            tracing::warn!("failed to set pragmas on cloned connection: {e}");
        }
        Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: self.db_path.clone(),
        }
    }
}

/// Runs a blocking closure over the locked connection on the blocking thread
/// pool. `f` takes `&Connection` rather than owning it, since the connection
/// stays pinned behind the `Arc<Mutex<_>>` for the life of the store.
async fn blocking<T, F>(conn: Arc<Mutex<Connection>>, f: F) -> SentinelResult<T>
where
    F: FnOnce(&Connection) -> SentinelResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let conn = conn.lock().unwrap();
        f(&conn)
    })
    .await
    .map_err(|e| SentinelError::Persistence(format!("blocking task panicked: {e}")))?
}

impl SqlitePersistence {
    pub fn open(path: impl AsRef<Path>) -> SentinelResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SentinelError::Persistence(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        let conn = Connection::open(path).map_err(|e| {
            SentinelError::Persistence(format!("failed to open {}: {e}", path.display()))
        })?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA busy_timeout=3000;
             PRAGMA foreign_keys=ON;",
        )
        .map_err(|e| SentinelError::Persistence(format!("failed to set pragmas: {e}")))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.to_string_lossy().to_string(),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> SentinelResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SentinelError::Persistence(format!("failed to open in-memory db: {e}")))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| SentinelError::Persistence(e.to_string()))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: ":memory:".to_string(),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&self) -> SentinelResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS endpoints (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                name TEXT NOT NULL,
                url TEXT NOT NULL,
                endpoint_type TEXT NOT NULL,
                status TEXT NOT NULL,
                last_checked TEXT,
                last_response_time_ms INTEGER,
                protocol_version TEXT,
                capabilities TEXT,
                deleted_at TEXT,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS status_history (
                id TEXT PRIMARY KEY,
                endpoint_id TEXT NOT NULL REFERENCES endpoints(id),
                outcome TEXT NOT NULL,
                response_time_ms INTEGER,
                error TEXT,
                timestamp TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS alerts (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                endpoint_id TEXT NOT NULL REFERENCES endpoints(id),
                severity TEXT NOT NULL,
                title TEXT NOT NULL,
                message TEXT NOT NULL,
                details TEXT NOT NULL,
                resolved_at TEXT,
                resolved_by TEXT,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS tools (
                id TEXT PRIMARY KEY,
                endpoint_id TEXT NOT NULL REFERENCES endpoints(id),
                endpoint_url TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                input_schema TEXT NOT NULL,
                category TEXT NOT NULL,
                tags TEXT NOT NULL,
                risk_level TEXT NOT NULL,
                enabled INTEGER NOT NULL,
                usage_count INTEGER NOT NULL,
                last_used TEXT,
                updated_at TEXT NOT NULL,
                UNIQUE(endpoint_id, name)
            );
            CREATE TABLE IF NOT EXISTS executions (
                id TEXT PRIMARY KEY,
                tool_id TEXT NOT NULL REFERENCES tools(id),
                endpoint_id TEXT NOT NULL,
                user_id TEXT,
                arguments TEXT NOT NULL,
                result TEXT,
                error TEXT,
                duration_ms INTEGER,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL
            );",
        )
        .map_err(|e| SentinelError::Persistence(format!("failed to create schema: {e}")))
    }
}

fn pg_err(context: &str, e: rusqlite::Error) -> SentinelError {
    SentinelError::Persistence(format!("{context}: {e}"))
}

fn status_to_str(status: EndpointStatus) -> &'static str {
    match status {
        EndpointStatus::Unknown => "unknown",
        EndpointStatus::Online => "online",
        EndpointStatus::Offline => "offline",
    }
}

fn status_from_str(s: &str) -> EndpointStatus {
    match s {
        "online" => EndpointStatus::Online,
        "offline" => EndpointStatus::Offline,
        _ => EndpointStatus::Unknown,
    }
}

fn outcome_to_str(outcome: ProbeOutcome) -> &'static str {
    match outcome {
        ProbeOutcome::Online => "online",
        ProbeOutcome::Offline => "offline",
    }
}

fn outcome_from_str(s: &str) -> ProbeOutcome {
    if s == "offline" {
        ProbeOutcome::Offline
    } else {
        ProbeOutcome::Online
    }
}

fn severity_to_str(severity: AlertSeverity) -> &'static str {
    match severity {
        AlertSeverity::Info => "info",
        AlertSeverity::Warning => "warning",
        AlertSeverity::Critical => "critical",
    }
}

fn severity_from_str(s: &str) -> AlertSeverity {
    match s {
        "warning" => AlertSeverity::Warning,
        "critical" => AlertSeverity::Critical,
        _ => AlertSeverity::Info,
    }
}

fn risk_to_str(risk: RiskLevel) -> &'static str {
    match risk {
        RiskLevel::Low => "low",
        RiskLevel::Medium => "medium",
        RiskLevel::High => "high",
    }
}

fn risk_from_str(s: &str) -> RiskLevel {
    match s {
        "medium" => RiskLevel::Medium,
        "high" => RiskLevel::High,
        _ => RiskLevel::Low,
    }
}

fn status_to_str_exec(status: ExecutionStatus) -> &'static str {
    match status {
        ExecutionStatus::Running => "running",
        ExecutionStatus::Completed => "completed",
        ExecutionStatus::Failed => "failed",
    }
}

fn status_from_str_exec(s: &str) -> ExecutionStatus {
    match s {
        "completed" => ExecutionStatus::Completed,
        "failed" => ExecutionStatus::Failed,
        _ => ExecutionStatus::Running,
    }
}

fn row_to_endpoint(row: &rusqlite::Row) -> rusqlite::Result<Endpoint> {
    let capabilities_json: Option<String> = row.get("capabilities")?;
    Ok(Endpoint {
        id: row.get::<_, String>("id")?.parse().unwrap_or_default(),
        tenant_id: row.get::<_, String>("tenant_id")?.parse().unwrap_or_default(),
        name: row.get("name")?,
        url: row.get("url")?,
        endpoint_type: row.get("endpoint_type")?,
        status: status_from_str(&row.get::<_, String>("status")?),
        last_checked: row
            .get::<_, Option<String>>("last_checked")?
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
        last_response_time_ms: row
            .get::<_, Option<i64>>("last_response_time_ms")?
            .map(|v| v as u64),
        protocol_version: row.get("protocol_version")?,
        capabilities: capabilities_json.and_then(|s| serde_json::from_str(&s).ok()),
        deleted_at: row
            .get::<_, Option<String>>("deleted_at")?
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
        created_at: DateTime::parse_from_rfc3339(&row.get::<_, String>("created_at")?)
            .unwrap_or_default()
            .with_timezone(&Utc),
    })
}

fn row_to_tool(row: &rusqlite::Row) -> rusqlite::Result<Tool> {
    Ok(Tool {
        id: row.get::<_, String>("id")?.parse().unwrap_or_default(),
        endpoint_id: row.get::<_, String>("endpoint_id")?.parse().unwrap_or_default(),
        endpoint_url: row.get("endpoint_url")?,
        name: row.get("name")?,
        description: row.get("description")?,
        input_schema: serde_json::from_str(&row.get::<_, String>("input_schema")?)
            .unwrap_or(serde_json::Value::Null),
        category: row.get("category")?,
        tags: serde_json::from_str(&row.get::<_, String>("tags")?).unwrap_or_default(),
        risk_level: risk_from_str(&row.get::<_, String>("risk_level")?),
        enabled: row.get("enabled")?,
        usage_count: row.get::<_, i64>("usage_count")? as u64,
        last_used: row
            .get::<_, Option<String>>("last_used")?
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
        updated_at: DateTime::parse_from_rfc3339(&row.get::<_, String>("updated_at")?)
            .unwrap_or_default()
            .with_timezone(&Utc),
    })
}

fn get_tool_locked(conn: &Connection, id: Uuid) -> SentinelResult<Option<Tool>> {
    conn.query_row("SELECT * FROM tools WHERE id = ?1", params![id.to_string()], row_to_tool)
        .optional()
        .map_err(|e| pg_err("get tool", e))
}

#[async_trait]
impl PersistencePort for SqlitePersistence {
    async fn create_endpoint(&self, endpoint: Endpoint) -> SentinelResult<Endpoint> {
        blocking(self.conn.clone(), move |conn| {
            conn.execute(
                "INSERT INTO endpoints (id, tenant_id, name, url, endpoint_type, status, last_checked,
                    last_response_time_ms, protocol_version, capabilities, deleted_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    endpoint.id.to_string(),
                    endpoint.tenant_id.to_string(),
                    endpoint.name.clone(),
                    endpoint.url.clone(),
                    endpoint.endpoint_type.clone(),
                    status_to_str(endpoint.status),
                    endpoint.last_checked.map(|t| t.to_rfc3339()),
                    endpoint.last_response_time_ms.map(|v| v as i64),
                    endpoint.protocol_version.clone(),
                    endpoint
                        .capabilities
                        .as_ref()
                        .map(|c| serde_json::to_string(c).unwrap_or_default()),
                    endpoint.deleted_at.map(|t| t.to_rfc3339()),
                    endpoint.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| pg_err("insert endpoint", e))?;
            Ok(endpoint)
        })
        .await
    }

    async fn get_endpoint(&self, id: Uuid) -> SentinelResult<Option<Endpoint>> {
        blocking(self.conn.clone(), move |conn| {
            conn.query_row(
                "SELECT * FROM endpoints WHERE id = ?1",
                params![id.to_string()],
                row_to_endpoint,
            )
            .optional()
            .map_err(|e| pg_err("get endpoint", e))
        })
        .await
    }

    async fn list_endpoints_by_tenant(
        &self,
        tenant_id: Uuid,
        page: Pagination,
    ) -> SentinelResult<Vec<Endpoint>> {
        blocking(self.conn.clone(), move |conn| {
            let limit = if page.limit == 0 { i64::MAX } else { page.limit as i64 };
            let mut stmt = conn
                .prepare(
                    "SELECT * FROM endpoints WHERE tenant_id = ?1 AND deleted_at IS NULL
                     ORDER BY created_at ASC LIMIT ?2 OFFSET ?3",
                )
                .map_err(|e| pg_err("prepare list endpoints", e))?;
            let rows = stmt
                .query_map(
                    params![tenant_id.to_string(), limit, page.offset as i64],
                    row_to_endpoint,
                )
                .map_err(|e| pg_err("query list endpoints", e))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| pg_err("collect endpoints", e))
        })
        .await
    }

    async fn soft_delete_endpoint(&self, id: Uuid, at: DateTime<Utc>) -> SentinelResult<()> {
        blocking(self.conn.clone(), move |conn| {
            let changed = conn
                .execute(
                    "UPDATE endpoints SET deleted_at = ?1 WHERE id = ?2",
                    params![at.to_rfc3339(), id.to_string()],
                )
                .map_err(|e| pg_err("soft delete endpoint", e))?;
            if changed == 0 {
                return Err(SentinelError::NotFound(format!("endpoint {id}")));
            }
            Ok(())
        })
        .await
    }

    async fn record_probe(
        &self,
        endpoint_id: Uuid,
        outcome: ProbeOutcome,
        response_time_ms: Option<u64>,
        error: Option<String>,
        at: DateTime<Utc>,
    ) -> SentinelResult<StatusHistoryEntry> {
        blocking(self.conn.clone(), move |conn| {
            let entry_id = Uuid::new_v4();
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| pg_err("begin record_probe transaction", e))?;
            tx.execute(
                "INSERT INTO status_history (id, endpoint_id, outcome, response_time_ms, error, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    entry_id.to_string(),
                    endpoint_id.to_string(),
                    outcome_to_str(outcome),
                    response_time_ms.map(|v| v as i64),
                    error.clone(),
                    at.to_rfc3339(),
                ],
            )
            .map_err(|e| pg_err("insert status history", e))?;
            tx.execute(
                "UPDATE endpoints SET status = ?1, last_checked = ?2, last_response_time_ms = ?3 WHERE id = ?4",
                params![
                    status_to_str(outcome.into()),
                    at.to_rfc3339(),
                    response_time_ms.map(|v| v as i64),
                    endpoint_id.to_string(),
                ],
            )
            .map_err(|e| pg_err("update endpoint status", e))?;
            tx.commit().map_err(|e| pg_err("commit record_probe", e))?;

            Ok(StatusHistoryEntry {
                id: entry_id,
                endpoint_id,
                outcome,
                response_time_ms,
                error,
                timestamp: at,
            })
        })
        .await
    }

    async fn list_status_history(
        &self,
        endpoint_id: Uuid,
        page: Pagination,
    ) -> SentinelResult<Vec<StatusHistoryEntry>> {
        blocking(self.conn.clone(), move |conn| {
            let limit = if page.limit == 0 { i64::MAX } else { page.limit as i64 };
            let mut stmt = conn
                .prepare(
                    "SELECT * FROM status_history WHERE endpoint_id = ?1
                     ORDER BY timestamp ASC LIMIT ?2 OFFSET ?3",
                )
                .map_err(|e| pg_err("prepare status history", e))?;
            let rows = stmt
                .query_map(params![endpoint_id.to_string(), limit, page.offset as i64], |row| {
                    Ok(StatusHistoryEntry {
                        id: row.get::<_, String>("id")?.parse().unwrap_or_default(),
                        endpoint_id: row.get::<_, String>("endpoint_id")?.parse().unwrap_or_default(),
                        outcome: outcome_from_str(&row.get::<_, String>("outcome")?),
                        response_time_ms: row.get::<_, Option<i64>>("response_time_ms")?.map(|v| v as u64),
                        error: row.get("error")?,
                        timestamp: DateTime::parse_from_rfc3339(&row.get::<_, String>("timestamp")?)
                            .unwrap_or_default()
                            .with_timezone(&Utc),
                    })
                })
                .map_err(|e| pg_err("query status history", e))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| pg_err("collect status history", e))
        })
        .await
    }

    async fn append_alert(&self, alert: Alert) -> SentinelResult<Alert> {
        blocking(self.conn.clone(), move |conn| {
            conn.execute(
                "INSERT INTO alerts (id, tenant_id, endpoint_id, severity, title, message, details,
                    resolved_at, resolved_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    alert.id.to_string(),
                    alert.tenant_id.to_string(),
                    alert.endpoint_id.to_string(),
                    severity_to_str(alert.severity),
                    alert.title.clone(),
                    alert.message.clone(),
                    serde_json::to_string(&alert.details).unwrap_or_default(),
                    alert.resolved_at.map(|t| t.to_rfc3339()),
                    alert.resolved_by.clone(),
                    alert.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| pg_err("insert alert", e))?;
            Ok(alert)
        })
        .await
    }

    async fn list_alerts_by_tenant(
        &self,
        tenant_id: Uuid,
        page: Pagination,
    ) -> SentinelResult<Vec<Alert>> {
        blocking(self.conn.clone(), move |conn| {
            let limit = if page.limit == 0 { i64::MAX } else { page.limit as i64 };
            let mut stmt = conn
                .prepare(
                    "SELECT * FROM alerts WHERE tenant_id = ?1 ORDER BY created_at ASC LIMIT ?2 OFFSET ?3",
                )
                .map_err(|e| pg_err("prepare list alerts", e))?;
            let rows = stmt
                .query_map(params![tenant_id.to_string(), limit, page.offset as i64], |row| {
                    Ok(Alert {
                        id: row.get::<_, String>("id")?.parse().unwrap_or_default(),
                        tenant_id: row.get::<_, String>("tenant_id")?.parse().unwrap_or_default(),
                        endpoint_id: row.get::<_, String>("endpoint_id")?.parse().unwrap_or_default(),
                        severity: severity_from_str(&row.get::<_, String>("severity")?),
                        title: row.get("title")?,
                        message: row.get("message")?,
                        details: serde_json::from_str(&row.get::<_, String>("details")?)
                            .unwrap_or(serde_json::Value::Null),
                        resolved_at: row
                            .get::<_, Option<String>>("resolved_at")?
                            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                            .map(|dt| dt.with_timezone(&Utc)),
                        resolved_by: row.get("resolved_by")?,
                        created_at: DateTime::parse_from_rfc3339(&row.get::<_, String>("created_at")?)
                            .unwrap_or_default()
                            .with_timezone(&Utc),
                    })
                })
                .map_err(|e| pg_err("query list alerts", e))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| pg_err("collect alerts", e))
        })
        .await
    }

    async fn resolve_alert(&self, id: Uuid, resolver: &str, at: DateTime<Utc>) -> SentinelResult<()> {
        let resolver = resolver.to_string();
        blocking(self.conn.clone(), move |conn| {
            // Idempotent at the SQL level: only touches rows still unresolved.
            conn.execute(
                "UPDATE alerts SET resolved_at = ?1, resolved_by = ?2
                 WHERE id = ?3 AND resolved_at IS NULL",
                params![at.to_rfc3339(), resolver, id.to_string()],
            )
            .map_err(|e| pg_err("resolve alert", e))?;
            Ok(())
        })
        .await
    }

    async fn upsert_tool(&self, tool: Tool) -> SentinelResult<Tool> {
        blocking(self.conn.clone(), move |conn| {
            let existing_id: Option<String> = conn
                .query_row(
                    "SELECT id FROM tools WHERE endpoint_id = ?1 AND name = ?2",
                    params![tool.endpoint_id.to_string(), tool.name.clone()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| pg_err("lookup existing tool", e))?;

            let id = existing_id.as_deref().and_then(|s| s.parse().ok()).unwrap_or(tool.id);

            conn.execute(
                "INSERT INTO tools (id, endpoint_id, endpoint_url, name, description, input_schema,
                    category, tags, risk_level, enabled, usage_count, last_used, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT(endpoint_id, name) DO UPDATE SET
                    description = excluded.description,
                    input_schema = excluded.input_schema,
                    category = excluded.category,
                    tags = excluded.tags,
                    risk_level = excluded.risk_level,
                    updated_at = excluded.updated_at",
                params![
                    id.to_string(),
                    tool.endpoint_id.to_string(),
                    tool.endpoint_url,
                    tool.name,
                    tool.description,
                    serde_json::to_string(&tool.input_schema).unwrap_or_default(),
                    tool.category,
                    serde_json::to_string(&tool.tags).unwrap_or_default(),
                    risk_to_str(tool.risk_level),
                    tool.enabled,
                    tool.usage_count as i64,
                    tool.last_used.map(|t| t.to_rfc3339()),
                    tool.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| pg_err("upsert tool", e))?;

            get_tool_locked(conn, id)?
                .ok_or_else(|| SentinelError::Internal(anyhow::anyhow!("tool vanished after upsert")))
        })
        .await
    }

    async fn get_tool(&self, id: Uuid) -> SentinelResult<Option<Tool>> {
        blocking(self.conn.clone(), move |conn| get_tool_locked(conn, id)).await
    }

    async fn list_tools(&self, filters: ToolFilters) -> SentinelResult<Vec<Tool>> {
        blocking(self.conn.clone(), move |conn| {
            let mut stmt = conn
                .prepare("SELECT * FROM tools ORDER BY usage_count DESC, name ASC")
                .map_err(|e| pg_err("prepare list tools", e))?;
            let rows = stmt.query_map([], row_to_tool).map_err(|e| pg_err("query list tools", e))?;
            let tools: Vec<Tool> =
                rows.collect::<Result<Vec<_>, _>>().map_err(|e| pg_err("collect tools", e))?;

            Ok(tools
                .into_iter()
                .filter(|t| filters.endpoint_id.is_none_or(|id| t.endpoint_id == id))
                .filter(|t| filters.category.as_deref().is_none_or(|c| t.category == c))
                .filter(|t| filters.risk_level.is_none_or(|r| t.risk_level == r))
                .filter(|t| filters.enabled.is_none_or(|e| t.enabled == e))
                .collect())
        })
        .await
    }

    async fn record_tool_usage(&self, id: Uuid, at: DateTime<Utc>) -> SentinelResult<()> {
        blocking(self.conn.clone(), move |conn| {
            let changed = conn
                .execute(
                    "UPDATE tools SET usage_count = usage_count + 1, last_used = ?1 WHERE id = ?2",
                    params![at.to_rfc3339(), id.to_string()],
                )
                .map_err(|e| pg_err("record tool usage", e))?;
            if changed == 0 {
                return Err(SentinelError::NotFound(format!("tool {id}")));
            }
            Ok(())
        })
        .await
    }

    async fn append_execution(&self, execution: Execution) -> SentinelResult<Execution> {
        blocking(self.conn.clone(), move |conn| {
            conn.execute(
                "INSERT INTO executions (id, tool_id, endpoint_id, user_id, arguments, result, error,
                    duration_ms, status, started_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    execution.id.to_string(),
                    execution.tool_id.to_string(),
                    execution.endpoint_id.to_string(),
                    execution.user_id.clone(),
                    serde_json::to_string(&execution.arguments).unwrap_or_default(),
                    execution
                        .result
                        .as_ref()
                        .map(|r| serde_json::to_string(r).unwrap_or_default()),
                    execution.error.clone(),
                    execution.duration_ms.map(|v| v as i64),
                    status_to_str_exec(execution.status),
                    execution.started_at.to_rfc3339(),
                ],
            )
            .map_err(|e| pg_err("insert execution", e))?;
            Ok(execution)
        })
        .await
    }

    async fn tool_usage_stats(&self, tool_id: Uuid) -> SentinelResult<ToolUsageStats> {
        blocking(self.conn.clone(), move |conn| {
            let mut stmt = conn
                .prepare("SELECT status, duration_ms, started_at FROM executions WHERE tool_id = ?1")
                .map_err(|e| pg_err("prepare tool usage stats", e))?;
            let rows = stmt
                .query_map(params![tool_id.to_string()], |row| {
                    let status: String = row.get(0)?;
                    let duration_ms: Option<i64> = row.get(1)?;
                    let started_at: String = row.get(2)?;
                    Ok((status_from_str_exec(&status), duration_ms, started_at))
                })
                .map_err(|e| pg_err("query tool usage stats", e))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| pg_err("collect tool usage stats", e))?;

            let total = rows.len() as u64;
            let successful = rows
                .iter()
                .filter(|(status, ..)| *status == ExecutionStatus::Completed)
                .count() as u64;
            let failed = rows
                .iter()
                .filter(|(status, ..)| *status == ExecutionStatus::Failed)
                .count() as u64;
            let durations: Vec<i64> = rows.iter().filter_map(|(_, d, _)| *d).collect();
            let mean_duration_ms = if durations.is_empty() {
                0.0
            } else {
                durations.iter().sum::<i64>() as f64 / durations.len() as f64
            };
            let last_execution_at = rows
                .iter()
                .filter_map(|(_, _, t)| DateTime::parse_from_rfc3339(t).ok())
                .map(|dt| dt.with_timezone(&Utc))
                .max();

            Ok(ToolUsageStats {
                total,
                successful,
                failed,
                mean_duration_ms,
                last_execution_at,
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_endpoint() -> Endpoint {
        Endpoint::new(Uuid::new_v4(), "test", "http://localhost:3000")
    }

    #[tokio::test]
    async fn create_and_get_endpoint_round_trips() {
        let store = SqlitePersistence::open_in_memory().unwrap();
        let endpoint = sample_endpoint();
        let id = endpoint.id;
        store.create_endpoint(endpoint.clone()).await.unwrap();

        let fetched = store.get_endpoint(id).await.unwrap().unwrap();
        assert_eq!(fetched.url, endpoint.url);
        assert_eq!(fetched.status, EndpointStatus::Unknown);
    }

    #[tokio::test]
    async fn record_probe_writes_history_before_status_is_readable() {
        let store = SqlitePersistence::open_in_memory().unwrap();
        let endpoint = sample_endpoint();
        let id = endpoint.id;
        store.create_endpoint(endpoint).await.unwrap();

        store
            .record_probe(id, ProbeOutcome::Offline, None, Some("timeout".into()), Utc::now())
            .await
            .unwrap();

        let updated = store.get_endpoint(id).await.unwrap().unwrap();
        assert_eq!(updated.status, EndpointStatus::Offline);
        let history = store.list_status_history(id, Pagination::default()).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].error.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn soft_delete_excludes_from_listing() {
        let store = SqlitePersistence::open_in_memory().unwrap();
        let tenant_id = Uuid::new_v4();
        let endpoint = Endpoint::new(tenant_id, "test", "http://localhost:3000");
        let id = endpoint.id;
        store.create_endpoint(endpoint).await.unwrap();
        store.soft_delete_endpoint(id, Utc::now()).await.unwrap();

        let listed = store
            .list_endpoints_by_tenant(tenant_id, Pagination::default())
            .await
            .unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn resolve_alert_twice_keeps_first_resolver() {
        let store = SqlitePersistence::open_in_memory().unwrap();
        let endpoint = sample_endpoint();
        store.create_endpoint(endpoint.clone()).await.unwrap();
        let alert = Alert::new(
            endpoint.tenant_id,
            endpoint.id,
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
            .list_alerts_by_tenant(endpoint.tenant_id, Pagination::default())
            .await
            .unwrap();
        assert_eq!(alerts[0].resolved_by.as_deref(), Some("op-a"));
    }
}
