//! Monitoring Supervisor: one independent probe loop per watched endpoint,
//! writing status history and emitting alerts at transitions and threshold
//! breaches.

use crate::domain::{Alert, AlertSeverity, Endpoint, EndpointStatus, ProbeOutcome};
use crate::persistence::PersistencePort;
use crate::protocol::ProtocolClient;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

const PING_DEADLINE: Duration = Duration::from_secs(30);
const HIGH_RESPONSE_TIME_MS: u64 = 5_000;
const LOW_UPTIME_THRESHOLD: f64 = 95.0;
const LOW_UPTIME_MIN_TOTAL: u64 = 10;
const HIGH_ERROR_RATE_THRESHOLD: f64 = 10.0;

/// Running aggregate over one endpoint's probe history.
#[derive(Debug, Clone, Default)]
pub struct EndpointMetrics {
    pub total_requests: u64,
    pub successful: u64,
    pub failed: u64,
    pub last_error: Option<String>,
    pub tools_count: usize,
    pub resources_count: usize,
    pub prompts_count: usize,
    pub uptime_percentage: f64,
    pub avg_response_time_ms: f64,
}

impl EndpointMetrics {
    fn record(&mut self, outcome: ProbeOutcome, response_time_ms: Option<u64>, error: Option<&str>) {
        self.total_requests += 1;
        match outcome {
            ProbeOutcome::Online => {
                self.successful += 1;
                if let Some(ms) = response_time_ms {
                    // Simple running mean over successful probes.
                    let n = self.successful as f64;
                    self.avg_response_time_ms += (ms as f64 - self.avg_response_time_ms) / n;
                }
            }
            ProbeOutcome::Offline => {
                self.failed += 1;
                self.last_error = error.map(str::to_string);
            }
        }
        self.uptime_percentage = if self.total_requests == 0 {
            0.0
        } else {
            self.successful as f64 / self.total_requests as f64 * 100.0
        };
    }

    fn error_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.failed as f64 / self.total_requests as f64 * 100.0
        }
    }
}

/// In-memory state for one watched endpoint. Owned exclusively by
/// its probe loop task for mutation; readers (e.g. a future status API) only
/// ever see a consistent snapshot since updates replace the whole struct
/// under the outer `Arc<StdMutex<_>>`.
#[derive(Debug, Clone)]
pub struct WatchState {
    pub endpoint_id: Uuid,
    pub tenant_id: Uuid,
    pub url: String,
    pub name: String,
    pub status: EndpointStatus,
    pub last_checked: Option<DateTime<Utc>>,
    pub last_response_time_ms: Option<u64>,
    pub consecutive_errors: u32,
    pub uptime_start: DateTime<Utc>,
    pub metrics: EndpointMetrics,
}

impl WatchState {
    fn new(endpoint: &Endpoint) -> Self {
        Self {
            endpoint_id: endpoint.id,
            tenant_id: endpoint.tenant_id,
            url: endpoint.url.clone(),
            name: endpoint.name.clone(),
            status: EndpointStatus::Unknown,
            last_checked: None,
            last_response_time_ms: None,
            consecutive_errors: 0,
            uptime_start: Utc::now(),
            metrics: EndpointMetrics::default(),
        }
    }
}

struct WatchHandle {
    cancel: oneshot::Sender<()>,
    state: Arc<StdMutex<WatchState>>,
    join: JoinHandle<()>,
}

/// Owns one probe-loop task per watched endpoint. Start/stop are the only
/// mutating operations on the handle map; loops own their state
/// slot exclusively between start and stop.
pub struct MonitoringSupervisor {
    client: Arc<ProtocolClient>,
    persistence: Arc<dyn PersistencePort>,
    watches: StdMutex<HashMap<String, WatchHandle>>,
}

impl MonitoringSupervisor {
    pub fn new(client: Arc<ProtocolClient>, persistence: Arc<dyn PersistencePort>) -> Self {
        Self {
            client,
            persistence,
            watches: StdMutex::new(HashMap::new()),
        }
    }

    /// Start watching `endpoint` at `interval`. Idempotent: watching an
    /// already-watched URL cancels and replaces the existing loop.
    pub fn watch(&self, endpoint: Endpoint, interval: Duration) {
        let url = endpoint.url.clone();
        let state = Arc::new(StdMutex::new(WatchState::new(&endpoint)));
        let (cancel_tx, cancel_rx) = oneshot::channel();

        let join = tokio::spawn(probe_loop(
            endpoint,
            interval,
            self.client.clone(),
            self.persistence.clone(),
            state.clone(),
            cancel_rx,
        ));

        let handle = WatchHandle {
            cancel: cancel_tx,
            state,
            join,
        };

        let previous = self.watches.lock().unwrap().insert(url, handle);
        if let Some(previous) = previous {
            let _ = previous.cancel.send(());
            previous.join.abort();
        }
    }

    /// Stop watching `url`. A no-op if `url` isn't currently watched.
    pub fn stop(&self, url: &str) {
        if let Some(handle) = self.watches.lock().unwrap().remove(url) {
            let _ = handle.cancel.send(());
        }
    }

    pub fn snapshot(&self, url: &str) -> Option<WatchState> {
        self.watches
            .lock()
            .unwrap()
            .get(url)
            .map(|h| h.state.lock().unwrap().clone())
    }

    pub fn watched_urls(&self) -> Vec<String> {
        self.watches.lock().unwrap().keys().cloned().collect()
    }
}

async fn probe_loop(
    endpoint: Endpoint,
    interval: Duration,
    client: Arc<ProtocolClient>,
    persistence: Arc<dyn PersistencePort>,
    state: Arc<StdMutex<WatchState>>,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = &mut cancel_rx => {
                info!(url = %endpoint.url, "monitoring loop cancelled");
                return;
            }
            _ = ticker.tick() => {
                if let Err(e) = probe_once(&endpoint, &client, &persistence, &state).await {
                    warn!(url = %endpoint.url, error = %e, "probe iteration failed");
                }
            }
        }
    }
}

async fn probe_once(
    endpoint: &Endpoint,
    client: &ProtocolClient,
    persistence: &Arc<dyn PersistencePort>,
    state: &Arc<StdMutex<WatchState>>,
) -> crate::errors::SentinelResult<()> {
    let started = std::time::Instant::now();
    let ping_result = client.ping(&endpoint.url, PING_DEADLINE).await;
    let response_time_ms = started.elapsed().as_millis() as u64;

    let (outcome, error) = match &ping_result {
        Ok(()) => (ProbeOutcome::Online, None),
        Err(e) => (ProbeOutcome::Offline, Some(e.to_string())),
    };

    let previous_status = state.lock().unwrap().status;
    let now = Utc::now();

    let entry = persistence
        .record_probe(endpoint.id, outcome, Some(response_time_ms), error.clone(), now)
        .await?;

    let mut deep_probe_counts = None;
    if outcome == ProbeOutcome::Online {
        deep_probe_counts = deep_probe(endpoint, client).await;
    }

    let mut state_guard = state.lock().unwrap();
    state_guard.status = entry.outcome.into();
    state_guard.last_checked = Some(now);
    state_guard.last_response_time_ms = Some(response_time_ms);
    match outcome {
        ProbeOutcome::Online => state_guard.consecutive_errors = 0,
        ProbeOutcome::Offline => state_guard.consecutive_errors += 1,
    }
    state_guard.metrics.record(outcome, Some(response_time_ms), error.as_deref());
    if let Some((tools, resources, prompts)) = deep_probe_counts {
        state_guard.metrics.tools_count = tools;
        state_guard.metrics.resources_count = resources;
        state_guard.metrics.prompts_count = prompts;
    }
    let metrics = state_guard.metrics.clone();
    drop(state_guard);

    emit_alerts(endpoint, previous_status, outcome, response_time_ms, error.as_deref(), &metrics, persistence)
        .await;

    Ok(())
}

/// `initialize` then capability-gated `tools/list`/`resources/list`/`prompts/list`.
/// Any failure here is swallowed — a deep-probe failure never downgrades an
/// otherwise-online status.
async fn deep_probe(endpoint: &Endpoint, client: &ProtocolClient) -> Option<(usize, usize, usize)> {
    let info = client
        .initialize(&endpoint.url, crate::protocol::DEFAULT_CALL_TIMEOUT)
        .await
        .ok()?;
    let capabilities = crate::domain::CapabilitySet::from_json(&info.capabilities);

    let tools = if capabilities.has_tools() {
        client
            .list_tools(&endpoint.url, crate::protocol::DEFAULT_CALL_TIMEOUT)
            .await
            .map(|r| r.tools.len())
            .unwrap_or(0)
    } else {
        0
    };
    let resources = if capabilities.has_resources() {
        client
            .list_resources(&endpoint.url, crate::protocol::DEFAULT_CALL_TIMEOUT)
            .await
            .map(|r| r.resources.len())
            .unwrap_or(0)
    } else {
        0
    };
    let prompts = if capabilities.has_prompts() {
        client
            .list_prompts(&endpoint.url, crate::protocol::DEFAULT_CALL_TIMEOUT)
            .await
            .map(|r| r.prompts.len())
            .unwrap_or(0)
    } else {
        0
    };

    Some((tools, resources, prompts))
}

#[allow(clippy::too_many_arguments)]
async fn emit_alerts(
    endpoint: &Endpoint,
    previous_status: EndpointStatus,
    outcome: ProbeOutcome,
    response_time_ms: u64,
    error: Option<&str>,
    metrics: &EndpointMetrics,
    persistence: &Arc<dyn PersistencePort>,
) {
    let mut alerts = Vec::new();
    let current_status: EndpointStatus = outcome.into();

    if previous_status == EndpointStatus::Online && current_status == EndpointStatus::Offline {
        alerts.push(Alert::new(
            endpoint.tenant_id,
            endpoint.id,
            AlertSeverity::Critical,
            "Server offline",
            error.unwrap_or("no error detail"),
            serde_json::json!({"error": error}),
        ));
    } else if previous_status == EndpointStatus::Offline && current_status == EndpointStatus::Online {
        alerts.push(Alert::new(
            endpoint.tenant_id,
            endpoint.id,
            AlertSeverity::Info,
            "Server recovered",
            "endpoint responded to ping after a prior failure",
            serde_json::json!({}),
        ));
    }

    if response_time_ms > HIGH_RESPONSE_TIME_MS {
        alerts.push(Alert::new(
            endpoint.tenant_id,
            endpoint.id,
            AlertSeverity::Warning,
            "High response time",
            format!("response time {response_time_ms}ms exceeds {HIGH_RESPONSE_TIME_MS}ms"),
            serde_json::json!({"response_time_ms": response_time_ms}),
        ));
    }

    if metrics.uptime_percentage < LOW_UPTIME_THRESHOLD && metrics.total_requests > LOW_UPTIME_MIN_TOTAL {
        alerts.push(Alert::new(
            endpoint.tenant_id,
            endpoint.id,
            AlertSeverity::Warning,
            "Low uptime",
            format!("uptime {:.1}% over {} requests", metrics.uptime_percentage, metrics.total_requests),
            serde_json::json!({"uptime_percentage": metrics.uptime_percentage}),
        ));
    }

    if metrics.error_rate() > HIGH_ERROR_RATE_THRESHOLD && metrics.total_requests > 0 {
        alerts.push(Alert::new(
            endpoint.tenant_id,
            endpoint.id,
            AlertSeverity::Critical,
            "High error rate",
            format!("error rate {:.1}% over {} requests", metrics.error_rate(), metrics.total_requests),
            serde_json::json!({"error_rate": metrics.error_rate()}),
        ));
    }

    // Alerts are never deduplicated here — collapsing consecutive
    // identical alerts is a consumer concern.
    for alert in alerts {
        if let Err(e) = persistence.append_alert(alert).await {
            warn!(url = %endpoint.url, error = %e, "failed to persist alert");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryPersistence;
    use crate::utils::http::default_http_client;
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup(server: &MockServer) -> (Endpoint, Arc<ProtocolClient>, Arc<dyn PersistencePort>) {
        let endpoint = Endpoint::new(Uuid::new_v4(), "test", server.uri());
        let persistence: Arc<dyn PersistencePort> = Arc::new(InMemoryPersistence::new());
        persistence.create_endpoint(endpoint.clone()).await.unwrap();
        (endpoint, Arc::new(ProtocolClient::new(default_http_client())), persistence)
    }

    #[tokio::test]
    async fn watch_writes_history_and_updates_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {}
            })))
            .mount(&server)
            .await;

        let (endpoint, client, persistence) = setup(&server).await;
        let supervisor = MonitoringSupervisor::new(client, persistence.clone());
        supervisor.watch(endpoint.clone(), Duration::from_millis(20));

        tokio::time::sleep(Duration::from_millis(80)).await;
        supervisor.stop(&endpoint.url);

        let history = persistence
            .list_status_history(endpoint.id, crate::persistence::Pagination::default())
            .await
            .unwrap();
        assert!(!history.is_empty());
        assert_eq!(history[0].outcome, ProbeOutcome::Online);

        let stored = persistence.get_endpoint(endpoint.id).await.unwrap().unwrap();
        assert_eq!(stored.status, EndpointStatus::Online);
    }

    #[tokio::test]
    async fn offline_endpoint_raises_critical_alert_on_transition() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (endpoint, client, persistence) = setup(&server).await;
        // Seed status as online so the first failing probe is a transition.
        persistence
            .record_probe(endpoint.id, ProbeOutcome::Online, Some(5), None, Utc::now())
            .await
            .unwrap();

        let state = Arc::new(StdMutex::new(WatchState {
            status: EndpointStatus::Online,
            ..WatchState::new(&endpoint)
        }));
        probe_once(&endpoint, &client, &persistence, &state).await.unwrap();

        let alerts = persistence
            .list_alerts_by_tenant(endpoint.tenant_id, crate::persistence::Pagination::default())
            .await
            .unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);
        assert_eq!(alerts[0].title, "Server offline");
    }

    #[test]
    fn stop_on_unwatched_url_is_noop() {
        let client = Arc::new(ProtocolClient::new(default_http_client()));
        let persistence: Arc<dyn PersistencePort> = Arc::new(InMemoryPersistence::new());
        let supervisor = MonitoringSupervisor::new(client, persistence);
        supervisor.stop("http://does-not-exist");
    }
}
