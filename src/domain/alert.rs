use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// A tenant-scoped event attached to an endpoint.
///
/// Invariant: created alerts are never mutated except via the `resolve`
/// transition (unresolved → resolved, once).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub endpoint_id: Uuid,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub details: serde_json::Value,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(
        tenant_id: Uuid,
        endpoint_id: Uuid,
        severity: AlertSeverity,
        title: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            endpoint_id,
            severity,
            title: title.into(),
            message: message.into(),
            details,
            resolved_at: None,
            resolved_by: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }

    /// Resolve the alert. Idempotent: resolving an already-resolved alert is
    /// a no-op that does not change the resolver.
    pub fn resolve(&mut self, resolver: impl Into<String>, at: DateTime<Utc>) {
        if self.is_resolved() {
            return;
        }
        self.resolved_at = Some(at);
        self.resolved_by = Some(resolver.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Alert {
        Alert::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            AlertSeverity::Critical,
            "Server offline",
            "ping failed",
            serde_json::json!({}),
        )
    }

    #[test]
    fn resolve_sets_fields() {
        let mut alert = sample();
        let at = Utc::now();
        alert.resolve("operator", at);
        assert!(alert.is_resolved());
        assert_eq!(alert.resolved_by.as_deref(), Some("operator"));
        assert_eq!(alert.resolved_at, Some(at));
    }

    #[test]
    fn resolve_twice_is_noop() {
        let mut alert = sample();
        let first = Utc::now();
        alert.resolve("operator-a", first);
        let second = first + chrono::Duration::seconds(5);
        alert.resolve("operator-b", second);
        assert_eq!(alert.resolved_at, Some(first));
        assert_eq!(alert.resolved_by.as_deref(), Some("operator-a"));
    }

    #[test]
    fn severity_orders_info_below_critical() {
        assert!(AlertSeverity::Info < AlertSeverity::Warning);
        assert!(AlertSeverity::Warning < AlertSeverity::Critical);
    }
}
