use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
}

/// One invocation of a tool.
///
/// Invariants: immutable after terminal status; exactly one terminal status
/// per invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: Uuid,
    pub tool_id: Uuid,
    pub endpoint_id: Uuid,
    pub user_id: Option<String>,
    pub arguments: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub duration_ms: Option<u64>,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
}

impl Execution {
    pub fn start(
        tool_id: Uuid,
        endpoint_id: Uuid,
        user_id: Option<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tool_id,
            endpoint_id,
            user_id,
            arguments,
            result: None,
            error: None,
            duration_ms: None,
            status: ExecutionStatus::Running,
            started_at: Utc::now(),
        }
    }

    pub fn complete(&mut self, result: serde_json::Value, duration_ms: u64) {
        self.result = Some(result);
        self.duration_ms = Some(duration_ms);
        self.status = ExecutionStatus::Completed;
    }

    pub fn fail(&mut self, error: impl Into<String>, duration_ms: u64) {
        self.error = Some(error.into());
        self.duration_ms = Some(duration_ms);
        self.status = ExecutionStatus::Failed;
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.status, ExecutionStatus::Running)
    }
}
