//! Behavioral Analyzer: per-agent anomaly detection over tool invocation
//! patterns. State lives entirely in memory, guarded by one reader/writer
//! lock; one request's analysis is a single write-locked critical section
//! with no I/O.

use crate::domain::{AgentProfile, Anomaly, AnomalySeverity, AnomalyType};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

const UNUSUAL_ACCESS_KEYWORDS: &[&str] = &["database", "file_system", "execute", "admin"];
const PRIVILEGE_KEYWORDS: &[&str] = &["admin", "root", "sudo", "elevate", "privilege"];
const EXFILTRATION_KEYWORDS: &[&str] = &["dump", "export", "download", "extract", "backup"];

const RAPID_REQUEST_WINDOW_SECS: i64 = 60;
const RAPID_REQUEST_COUNT_THRESHOLD: u64 = 20;
const RAPID_REQUEST_RATE_THRESHOLD: f64 = 5.0;
const UNUSUAL_ACCESS_MIN_TOTAL_REQUESTS: u64 = 10;
const TOOL_CHAIN_DISTINCT_THRESHOLD: usize = 5;
const TOOL_CHAIN_MAX_TOTAL_REQUESTS: u64 = 20;

/// Result of one `analyze` call. `severity` is `None` when no
/// anomaly fired this request.
#[derive(Debug, Clone)]
pub struct BehaviorVerdict {
    pub is_anomalous: bool,
    pub severity: Option<AnomalySeverity>,
    pub trust_score: i32,
    pub recommendations: Vec<&'static str>,
    pub anomalies: Vec<Anomaly>,
}

pub struct BehavioralAnalyzer {
    profiles: RwLock<HashMap<String, AgentProfile>>,
}

impl BehavioralAnalyzer {
    pub fn new() -> Self {
        Self { profiles: RwLock::new(HashMap::new()) }
    }

    /// Analyze one request from `agent_id` invoking `tool_name` with
    /// `parameters`. Creates the agent's profile on first sight, updates its
    /// histogram, runs the five detectors, and returns a snapshot consistent
    /// with the profile mutation.
    pub async fn analyze(
        &self,
        agent_id: &str,
        tool_name: &str,
        parameters: &Value,
    ) -> BehaviorVerdict {
        let now = Utc::now();
        let mut profiles = self.profiles.write().await;
        let profile = profiles
            .entry(agent_id.to_string())
            .or_insert_with(|| AgentProfile::new(agent_id, now));

        profile.record_request(tool_name, now);

        let anomalies = detect_anomalies(profile, tool_name, parameters, now);
        for anomaly in anomalies.clone() {
            profile.push_anomaly(anomaly);
        }

        let is_anomalous = !anomalies.is_empty();
        let severity = anomalies.iter().map(|a| a.severity).max();
        let recommendations = severity.map(recommendations_for).unwrap_or_default();

        BehaviorVerdict {
            is_anomalous,
            severity,
            trust_score: profile.trust_score,
            recommendations,
            anomalies,
        }
    }
}

impl Default for BehavioralAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn detect_anomalies(
    profile: &AgentProfile,
    tool_name: &str,
    parameters: &Value,
    now: DateTime<Utc>,
) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();
    let name_lower = tool_name.to_lowercase();

    if profile.request_count >= UNUSUAL_ACCESS_MIN_TOTAL_REQUESTS
        && profile.tool_usage.get(tool_name).copied().unwrap_or(0) < 2
        && UNUSUAL_ACCESS_KEYWORDS.iter().any(|kw| name_lower.contains(kw))
    {
        anomalies.push(Anomaly {
            anomaly_type: AnomalyType::UnusualToolAccess,
            severity: AnomalySeverity::Medium,
            description: format!("agent accessed an unfamiliar sensitive tool '{tool_name}'"),
            timestamp: now,
            score: 15,
        });
    }

    let elapsed_secs = (now - profile.first_seen).num_milliseconds() as f64 / 1000.0;
    let within_first_minute = now - profile.first_seen <= chrono::Duration::seconds(RAPID_REQUEST_WINDOW_SECS);
    let overall_rate = profile.request_count as f64 / elapsed_secs.max(1.0);
    if (within_first_minute && profile.request_count > RAPID_REQUEST_COUNT_THRESHOLD)
        || overall_rate > RAPID_REQUEST_RATE_THRESHOLD
    {
        anomalies.push(Anomaly {
            anomaly_type: AnomalyType::RapidRequestRate,
            severity: AnomalySeverity::High,
            description: format!("agent request rate {overall_rate:.1}/s exceeds threshold"),
            timestamp: now,
            score: 25,
        });
    }

    let params_contain_privilege_keyword = parameters
        .as_object()
        .is_some_and(|obj| obj.values().filter_map(Value::as_str).any(|s| {
            let s = s.to_lowercase();
            PRIVILEGE_KEYWORDS.iter().any(|kw| s.contains(kw))
        }));
    if PRIVILEGE_KEYWORDS.iter().any(|kw| name_lower.contains(kw)) || params_contain_privilege_keyword {
        anomalies.push(Anomaly {
            anomaly_type: AnomalyType::PrivilegeEscalation,
            severity: AnomalySeverity::Critical,
            description: format!("tool '{tool_name}' or its parameters reference privileged access"),
            timestamp: now,
            score: 40,
        });
    }

    if EXFILTRATION_KEYWORDS.iter().any(|kw| name_lower.contains(kw)) {
        anomalies.push(Anomaly {
            anomaly_type: AnomalyType::DataExfiltration,
            severity: AnomalySeverity::Critical,
            description: format!("tool '{tool_name}' matches a data-exfiltration pattern"),
            timestamp: now,
            score: 35,
        });
    }

    if profile.tool_usage.len() > TOOL_CHAIN_DISTINCT_THRESHOLD
        && profile.request_count < TOOL_CHAIN_MAX_TOTAL_REQUESTS
    {
        anomalies.push(Anomaly {
            anomaly_type: AnomalyType::ToolChainAbuse,
            severity: AnomalySeverity::High,
            description: format!(
                "agent touched {} distinct tools in only {} requests",
                profile.tool_usage.len(),
                profile.request_count
            ),
            timestamp: now,
            score: 20,
        });
    }

    anomalies
}

fn recommendations_for(severity: AnomalySeverity) -> Vec<&'static str> {
    match severity {
        AnomalySeverity::Critical => vec!["BLOCK"],
        AnomalySeverity::High => vec!["WARN"],
        AnomalySeverity::Medium => vec!["CAUTION"],
        AnomalySeverity::Low => vec!["INFO"],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn first_request_creates_profile_with_no_anomalies() {
        let analyzer = BehavioralAnalyzer::new();
        let verdict = analyzer.analyze("agent-1", "read_file", &json!({})).await;
        assert!(!verdict.is_anomalous);
        assert_eq!(verdict.trust_score, 100);
    }

    #[tokio::test]
    async fn privilege_escalation_fires_on_tool_name() {
        let analyzer = BehavioralAnalyzer::new();
        let verdict = analyzer.analyze("agent-1", "sudo_exec", &json!({})).await;
        assert!(verdict.is_anomalous);
        assert_eq!(verdict.severity, Some(AnomalySeverity::Critical));
        assert_eq!(verdict.trust_score, 60);
        assert_eq!(verdict.recommendations, vec!["BLOCK"]);
    }

    #[tokio::test]
    async fn data_exfiltration_fires_on_tool_name() {
        let analyzer = BehavioralAnalyzer::new();
        let verdict = analyzer.analyze("agent-1", "export_database_dump", &json!({})).await;
        assert!(verdict.anomalies.iter().any(|a| a.anomaly_type == AnomalyType::DataExfiltration));
    }

    #[tokio::test]
    async fn tool_chain_abuse_fires_past_five_distinct_tools() {
        let analyzer = BehavioralAnalyzer::new();
        for i in 0..6 {
            let verdict = analyzer.analyze("agent-1", &format!("tool_{i}"), &json!({})).await;
            if i == 5 {
                assert!(verdict.anomalies.iter().any(|a| a.anomaly_type == AnomalyType::ToolChainAbuse));
            }
        }
    }

    #[tokio::test]
    async fn trust_score_never_goes_negative() {
        let analyzer = BehavioralAnalyzer::new();
        for _ in 0..5 {
            analyzer.analyze("agent-1", "sudo_dump_export", &json!({})).await;
        }
        let verdict = analyzer.analyze("agent-1", "sudo_dump_export", &json!({})).await;
        assert_eq!(verdict.trust_score, 0);
    }
}
