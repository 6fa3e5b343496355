use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalySeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// Anomaly detector categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    UnusualToolAccess,
    RapidRequestRate,
    PrivilegeEscalation,
    DataExfiltration,
    ToolChainAbuse,
}

/// Attached to an `AgentProfile`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub anomaly_type: AnomalyType,
    pub severity: AnomalySeverity,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub score: u32,
}

/// Per-agent behavioral state maintained in memory.
///
/// Invariants: `trust` is clamped to `[0, 100]`; updates are atomic per
/// agent (the behavioral analyzer holds the write lock for the whole
/// analysis of one request).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub agent_id: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub request_count: u64,
    pub tool_usage: HashMap<String, u64>,
    pub trust_score: i32,
    pub anomalies: Vec<Anomaly>,
}

impl AgentProfile {
    pub fn new(agent_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            agent_id: agent_id.into(),
            first_seen: now,
            last_seen: now,
            request_count: 0,
            tool_usage: HashMap::new(),
            trust_score: 100,
            anomalies: Vec::new(),
        }
    }

    /// Record one request against `tool_name` at `now`.
    pub fn record_request(&mut self, tool_name: &str, now: DateTime<Utc>) {
        self.last_seen = now;
        self.request_count += 1;
        *self.tool_usage.entry(tool_name.to_string()).or_insert(0) += 1;
    }

    /// Decrement trust by `score`, clamped at 0.
    pub fn decrement_trust(&mut self, score: u32) {
        self.trust_score = (self.trust_score - score as i32).max(0);
    }

    pub fn push_anomaly(&mut self, anomaly: Anomaly) {
        self.decrement_trust(anomaly.score);
        self.anomalies.push(anomaly);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trust_clamps_at_zero() {
        let mut profile = AgentProfile::new("agent-1", Utc::now());
        profile.decrement_trust(150);
        assert_eq!(profile.trust_score, 0);
    }

    #[test]
    fn record_request_updates_histogram() {
        let mut profile = AgentProfile::new("agent-1", Utc::now());
        profile.record_request("read_file", Utc::now());
        profile.record_request("read_file", Utc::now());
        assert_eq!(profile.request_count, 2);
        assert_eq!(profile.tool_usage.get("read_file"), Some(&2));
    }
}
