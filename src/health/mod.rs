//! Enhanced Health Checker: an on-demand, deeper assessment of one endpoint
//! beyond the continuous monitoring loop's `ping`. Invoked by a façade for
//! explicit health requests; holds no persistence dependency and keeps no
//! state between calls.

use crate::domain::{Alert, AlertSeverity, Endpoint};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};

const CONNECTIVITY_TIMEOUT: Duration = Duration::from_secs(15);
const PERFORMANCE_SAMPLES: usize = 3;

const HEALTH_SUFFIXES: &[&str] =
    &["/health", "/status", "/ping", "/api/health", "/api/v1/health", "/metrics", "/info"];
const MCP_SUFFIXES: &[&str] = &["/mcp", "/api/mcp", "/api/v1/mcp", "/mcp/info", "/mcp/capabilities"];

#[derive(Debug, Clone, Default)]
pub struct HealthMemory {
    pub used: Option<f64>,
    pub total: Option<f64>,
}

impl HealthMemory {
    fn percentage(&self) -> Option<f64> {
        match (self.used, self.total) {
            (Some(used), Some(total)) if total > 0.0 => Some(used / total * 100.0),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HealthCpu {
    pub percentage: Option<f64>,
    pub load_average: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct HealthNetwork {
    pub bytes_in: Option<u64>,
    pub bytes_out: Option<u64>,
    pub connections: Option<u64>,
}

/// What the health-endpoint probe managed to parse out of the response body.
/// Every field is optional — a server may report any subset.
#[derive(Debug, Clone, Default)]
pub struct HealthEndpointInfo {
    pub version: Option<String>,
    pub uptime_percentage: Option<f64>,
    pub memory: Option<HealthMemory>,
    pub cpu: Option<HealthCpu>,
    pub network: Option<HealthNetwork>,
    pub capabilities: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawHealthBody {
    version: Option<String>,
    uptime: Option<f64>,
    memory: Option<RawMemory>,
    cpu: Option<RawCpu>,
    network: Option<RawNetwork>,
    #[serde(default)]
    capabilities: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawMemory {
    used: Option<f64>,
    total: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawCpu {
    percentage: Option<f64>,
    load_average: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawNetwork {
    bytes_in: Option<u64>,
    bytes_out: Option<u64>,
    connections: Option<u64>,
}

impl From<RawHealthBody> for HealthEndpointInfo {
    fn from(raw: RawHealthBody) -> Self {
        Self {
            version: raw.version,
            // The body's own `uptime` field is duck-typed as a percentage:
            // a server reporting seconds-of-uptime rather than a percentage
            // will produce a value outside [0, 100] and is simply not used
            // in the health score — the unit is otherwise unspecified.
            uptime_percentage: raw.uptime.filter(|u| (0.0..=100.0).contains(u)),
            memory: raw.memory.map(|m| HealthMemory { used: m.used, total: m.total }),
            cpu: raw.cpu.map(|c| HealthCpu { percentage: c.percentage, load_average: c.load_average }),
            network: raw.network.map(|n| HealthNetwork {
                bytes_in: n.bytes_in,
                bytes_out: n.bytes_out,
                connections: n.connections,
            }),
            capabilities: raw.capabilities,
        }
    }
}

/// The full result of one `assess` call.
#[derive(Debug, Clone)]
pub struct HealthAssessment {
    pub offline: bool,
    pub connectivity_response_time_ms: u64,
    pub health_endpoint: Option<String>,
    pub health_info: Option<HealthEndpointInfo>,
    pub mcp_support: bool,
    pub mcp_endpoint: Option<String>,
    pub performance_mean_ms: f64,
    pub performance_variance_ms2: f64,
    pub error_rate: f64,
    pub score: u8,
}

pub struct EnhancedHealthChecker {
    http: Client,
}

impl EnhancedHealthChecker {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    /// Run the full six-step assessment against `endpoint` and derive the
    /// alerts its thresholds imply. Alerts are returned, not persisted —
    /// this checker has no persistence dependency.
    pub async fn assess(&self, endpoint: &Endpoint) -> (HealthAssessment, Vec<Alert>) {
        let mut sample_attempts = 0u32;
        let mut sample_failures = 0u32;

        let (connectivity_offline, connectivity_ms) = self.probe_connectivity(&endpoint.url).await;
        sample_attempts += 1;
        if connectivity_offline {
            sample_failures += 1;
        }

        let (health_endpoint, health_info) = self.probe_health_suffixes(&endpoint.url).await;
        let (mcp_support, mcp_endpoint) = self.probe_mcp_suffixes(&endpoint.url).await;

        let mut samples = Vec::with_capacity(PERFORMANCE_SAMPLES);
        for _ in 0..PERFORMANCE_SAMPLES {
            sample_attempts += 1;
            match self.timed_get(&endpoint.url).await {
                Some(ms) => samples.push(ms as f64),
                None => sample_failures += 1,
            }
        }
        let (mean, variance) = mean_and_variance(&samples);
        let error_rate = sample_failures as f64 / sample_attempts as f64 * 100.0;

        let uptime_percentage = health_info.as_ref().and_then(|h| h.uptime_percentage);
        let memory_percentage = health_info.as_ref().and_then(|h| h.memory.as_ref()).and_then(HealthMemory::percentage);
        let cpu_percentage = health_info.as_ref().and_then(|h| h.cpu.as_ref()).and_then(|c| c.percentage);

        let score = health_score(mean, uptime_percentage, error_rate, memory_percentage, cpu_percentage);

        let assessment = HealthAssessment {
            offline: connectivity_offline,
            connectivity_response_time_ms: connectivity_ms,
            health_endpoint,
            health_info,
            mcp_support,
            mcp_endpoint,
            performance_mean_ms: mean,
            performance_variance_ms2: variance,
            error_rate,
            score,
        };
        let alerts = derive_alerts(endpoint, &assessment);
        (assessment, alerts)
    }

    async fn probe_connectivity(&self, url: &str) -> (bool, u64) {
        let started = Instant::now();
        let result = tokio::time::timeout(CONNECTIVITY_TIMEOUT, self.http.get(url).send()).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let offline = match result {
            Ok(Ok(resp)) => resp.status().as_u16() >= 400,
            _ => true,
        };
        (offline, elapsed_ms)
    }

    async fn probe_health_suffixes(&self, base_url: &str) -> (Option<String>, Option<HealthEndpointInfo>) {
        for suffix in HEALTH_SUFFIXES {
            let url = join_suffix(base_url, suffix);
            if let Ok(Ok(resp)) = tokio::time::timeout(CONNECTIVITY_TIMEOUT, self.http.get(&url).send()).await
                && resp.status().as_u16() == 200
                && let Ok(body) = resp.json::<RawHealthBody>().await
            {
                return (Some((*suffix).to_string()), Some(body.into()));
            }
        }
        (None, None)
    }

    async fn probe_mcp_suffixes(&self, base_url: &str) -> (bool, Option<String>) {
        for suffix in MCP_SUFFIXES {
            let url = join_suffix(base_url, suffix);
            if let Ok(Ok(resp)) = tokio::time::timeout(CONNECTIVITY_TIMEOUT, self.http.get(&url).send()).await
                && resp.status().as_u16() == 200
            {
                return (true, Some((*suffix).to_string()));
            }
        }
        (false, None)
    }

    async fn timed_get(&self, url: &str) -> Option<u64> {
        let started = Instant::now();
        let result = tokio::time::timeout(CONNECTIVITY_TIMEOUT, self.http.get(url).send()).await;
        match result {
            Ok(Ok(resp)) if resp.status().is_success() => Some(started.elapsed().as_millis() as u64),
            _ => None,
        }
    }
}

fn join_suffix(base_url: &str, suffix: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), suffix)
}

fn mean_and_variance(samples: &[f64]) -> (f64, f64) {
    if samples.is_empty() {
        return (0.0, 0.0);
    }
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / samples.len() as f64;
    (mean, variance)
}

/// Fixed subtraction table over response time, uptime, error rate, memory,
/// and CPU, clamped to `[0, 100]`.
fn health_score(
    response_time_ms: f64,
    uptime_percentage: Option<f64>,
    error_rate: f64,
    memory_percentage: Option<f64>,
    cpu_percentage: Option<f64>,
) -> u8 {
    let mut score: i32 = 100;

    score -= if response_time_ms > 5000.0 {
        30
    } else if response_time_ms > 2000.0 {
        15
    } else if response_time_ms > 1000.0 {
        5
    } else {
        0
    };

    if let Some(uptime) = uptime_percentage {
        score -= if uptime < 95.0 {
            25
        } else if uptime < 99.0 {
            10
        } else {
            0
        };
    }

    score -= if error_rate > 10.0 {
        40
    } else if error_rate > 5.0 {
        20
    } else if error_rate > 1.0 {
        5
    } else {
        0
    };

    if let Some(memory) = memory_percentage {
        score -= if memory > 90.0 {
            20
        } else if memory > 80.0 {
            10
        } else {
            0
        };
    }

    if let Some(cpu) = cpu_percentage {
        score -= if cpu > 90.0 {
            20
        } else if cpu > 80.0 {
            10
        } else {
            0
        };
    }

    score.clamp(0, 100) as u8
}

/// Threshold-based alert derivation over the assessment's fixed table.
fn derive_alerts(endpoint: &Endpoint, assessment: &HealthAssessment) -> Vec<Alert> {
    let mut alerts = Vec::new();
    let push = |alerts: &mut Vec<Alert>, severity, title: &str, message: String| {
        alerts.push(Alert::new(
            endpoint.tenant_id,
            endpoint.id,
            severity,
            title,
            message,
            serde_json::json!({}),
        ));
    };

    if assessment.performance_mean_ms > 5000.0 {
        push(
            &mut alerts,
            AlertSeverity::Warning,
            "High response time",
            format!("mean response time {:.0}ms exceeds 5000ms", assessment.performance_mean_ms),
        );
    }
    if let Some(uptime) = assessment.health_info.as_ref().and_then(|h| h.uptime_percentage)
        && uptime < 95.0
    {
        push(&mut alerts, AlertSeverity::Critical, "Low uptime", format!("uptime {uptime:.1}%"));
    }
    if assessment.error_rate > 5.0 {
        push(
            &mut alerts,
            AlertSeverity::Warning,
            "High error rate",
            format!("error rate {:.1}% during health assessment", assessment.error_rate),
        );
    }
    if let Some(memory) = assessment
        .health_info
        .as_ref()
        .and_then(|h| h.memory.as_ref())
        .and_then(HealthMemory::percentage)
        && memory > 90.0
    {
        push(&mut alerts, AlertSeverity::Warning, "High memory usage", format!("memory {memory:.1}%"));
    }
    if let Some(cpu) = assessment.health_info.as_ref().and_then(|h| h.cpu.as_ref()).and_then(|c| c.percentage)
        && cpu > 90.0
    {
        push(&mut alerts, AlertSeverity::Warning, "High CPU usage", format!("cpu {cpu:.1}%"));
    }
    if assessment.score < 50 {
        push(
            &mut alerts,
            AlertSeverity::Critical,
            "Poor health score",
            format!("health score {} below 50", assessment.score),
        );
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::http::default_http_client;
    use serde_json::json;
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn endpoint(url: String) -> Endpoint {
        Endpoint::new(Uuid::new_v4(), "test", url)
    }

    #[tokio::test]
    async fn offline_on_5xx_connectivity() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(500)).mount(&server).await;

        let checker = EnhancedHealthChecker::new(default_http_client());
        let (assessment, _) = checker.assess(&endpoint(server.uri())).await;
        assert!(assessment.offline);
    }

    #[tokio::test]
    async fn parses_health_suffix_and_computes_score() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).and(path("/")).respond_with(ResponseTemplate::new(200)).mount(&server).await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "version": "1.2.3",
                "uptime": 99.9,
                "memory": {"used": 40.0, "total": 100.0},
                "cpu": {"percentage": 10.0}
            })))
            .mount(&server)
            .await;

        let checker = EnhancedHealthChecker::new(default_http_client());
        let (assessment, alerts) = checker.assess(&endpoint(server.uri())).await;
        assert!(!assessment.offline);
        assert_eq!(assessment.health_endpoint.as_deref(), Some("/health"));
        assert_eq!(assessment.score, 100);
        assert!(alerts.is_empty());
    }

    #[test]
    fn score_clamps_at_zero_with_every_penalty() {
        let score = health_score(6000.0, Some(50.0), 20.0, Some(95.0), Some(95.0));
        assert_eq!(score, 0);
    }

    #[test]
    fn mean_and_variance_of_constant_samples_is_zero_variance() {
        let (mean, variance) = mean_and_variance(&[10.0, 10.0, 10.0]);
        assert_eq!(mean, 10.0);
        assert_eq!(variance, 0.0);
    }
}
