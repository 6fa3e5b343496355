//! Network discovery: enumerate candidate `{host, port}` tuples and keep the
//! ones that answer an MCP handshake.

mod cidr;
mod config;

pub use config::{DiscoveryConfig, PortRange};

use crate::protocol::{ProtocolClient, ServerInfo};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// One MCP server found during a scan. Not persisted directly —
/// promoting one to a registered `Endpoint` is an operator action outside
/// this crate's scope.
#[derive(Debug, Clone)]
pub struct DiscoveredServer {
    pub url: String,
    pub server_info: ServerInfo,
    pub measured_at: DateTime<Utc>,
}

pub struct DiscoveryScanner {
    client: Arc<ProtocolClient>,
    found: Arc<Mutex<HashSet<String>>>,
}

impl DiscoveryScanner {
    pub fn new(client: Arc<ProtocolClient>) -> Self {
        Self {
            client,
            found: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Run one scan to completion or until `config.scan_deadline()` elapses,
    /// whichever comes first. Returns whatever was collected at cutoff — the
    /// scan is never considered a failure.
    pub async fn scan(&self, config: &DiscoveryConfig) -> Vec<DiscoveredServer> {
        let candidates = self.candidates(config);
        info!(candidate_count = candidates.len(), "starting discovery scan");

        let collected = Arc::new(Mutex::new(Vec::new()));
        let deadline = config.scan_deadline();
        let outcome = tokio::time::timeout(
            deadline,
            self.probe_all(candidates, config, collected.clone()),
        )
        .await;

        if outcome.is_err() {
            warn!("discovery scan hit its outer deadline; returning partial results");
        }
        let results = std::mem::take(&mut *collected.lock().await);
        info!(found = results.len(), "discovery scan finished");
        results
    }

    fn candidates(&self, config: &DiscoveryConfig) -> Vec<String> {
        let mut hosts = Vec::new();
        for range in &config.network_ranges {
            hosts.extend(cidr::expand_cidr(range).into_iter().map(|ip| ip.to_string()));
        }
        if hosts.is_empty() {
            hosts.push("127.0.0.1".to_string());
        }

        let mut ports: Vec<u16> = config.known_ports.clone();
        for range in &config.port_ranges {
            ports.extend(range.ports());
        }

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for host in &hosts {
            for port in &ports {
                let url = format!("http://{host}:{port}/");
                if seen.insert(url.clone()) {
                    candidates.push(url);
                }
            }
        }
        candidates
    }

    /// Writes each successful probe into `collected` as soon as it completes,
    /// rather than only at the end, so a caller racing this future against an
    /// outer deadline can still read out everything gathered so far even if
    /// this future itself gets cancelled mid-flight.
    async fn probe_all(
        &self,
        candidates: Vec<String>,
        config: &DiscoveryConfig,
        collected: Arc<Mutex<Vec<DiscoveredServer>>>,
    ) {
        let semaphore = Arc::new(tokio::sync::Semaphore::new(config.max_concurrent));
        let timeout = config.timeout();
        let mut tasks = Vec::with_capacity(candidates.len());

        for url in candidates {
            let semaphore = semaphore.clone();
            let client = self.client.clone();
            let found = self.found.clone();
            let collected = collected.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                let server_info = client.initialize(&url, timeout).await.ok()?;
                let server = DiscoveredServer {
                    url,
                    server_info,
                    measured_at: Utc::now(),
                };
                let mut found = found.lock().await;
                if found.insert(server.url.clone()) {
                    drop(found);
                    collected.lock().await.push(server);
                }
                Some(())
            }));
        }

        for task in tasks {
            // A join failure (panic/cancellation) is itself a silent drop,
            // same as a probe failure — discovery never surfaces errors.
            let _ = task.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::config::PortRange;
    use crate::utils::http::default_http_client;
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn finds_one_server_among_dead_ports() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {"name": "demo", "capabilities": {}}
            })))
            .mount(&server)
            .await;

        let live_port = server.uri().rsplit(':').next().unwrap().parse::<u16>().unwrap();
        let client = Arc::new(ProtocolClient::new(default_http_client()));
        let scanner = DiscoveryScanner::new(client);

        let config = DiscoveryConfig {
            port_ranges: vec![],
            network_ranges: vec!["127.0.0.1/32".to_string()],
            known_ports: vec![live_port, 1],
            timeout_secs: 1,
            max_concurrent: 4,
            scan_deadline_secs: 5,
        };

        let found = scanner.scan(&config).await;
        assert_eq!(found.len(), 1);
        assert!(found[0].url.contains(&live_port.to_string()));
    }

    #[test]
    fn candidates_deduplicate_overlapping_ports() {
        let client = Arc::new(ProtocolClient::new(default_http_client()));
        let scanner = DiscoveryScanner::new(client);
        let config = DiscoveryConfig {
            port_ranges: vec![PortRange { from: 3000, to: 3001 }],
            network_ranges: vec!["127.0.0.1/32".to_string()],
            known_ports: vec![3000, 3001, 8080],
            ..DiscoveryConfig::default()
        };
        let candidates = scanner.candidates(&config);
        assert_eq!(candidates.len(), 3);
    }
}
