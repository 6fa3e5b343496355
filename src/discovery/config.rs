use serde::{Deserialize, Serialize};
use std::time::Duration;

/// An inclusive port range `{from, to}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PortRange {
    pub from: u16,
    pub to: u16,
}

impl PortRange {
    pub fn ports(&self) -> impl Iterator<Item = u16> + '_ {
        self.from..=self.to
    }
}

fn default_known_ports() -> Vec<u16> {
    vec![3000, 3001, 3002, 8000, 8080]
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_concurrent() -> usize {
    50
}

fn default_scan_deadline_secs() -> u64 {
    300
}

/// Discovery configuration. Deserializable so a caller can load
/// it from whatever format it chooses — the core takes the parsed struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default)]
    pub port_ranges: Vec<PortRange>,
    #[serde(default)]
    pub network_ranges: Vec<String>,
    #[serde(default = "default_known_ports")]
    pub known_ports: Vec<u16>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_scan_deadline_secs")]
    pub scan_deadline_secs: u64,
}

impl DiscoveryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn scan_deadline(&self) -> Duration {
        Duration::from_secs(self.scan_deadline_secs)
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            port_ranges: Vec::new(),
            network_ranges: Vec::new(),
            known_ports: default_known_ports(),
            timeout_secs: default_timeout_secs(),
            max_concurrent: default_max_concurrent(),
            scan_deadline_secs: default_scan_deadline_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = DiscoveryConfig::default();
        assert_eq!(config.known_ports, vec![3000, 3001, 3002, 8000, 8080]);
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.max_concurrent, 50);
        assert_eq!(config.scan_deadline(), Duration::from_secs(300));
    }

    #[test]
    fn port_range_is_inclusive() {
        let range = PortRange { from: 3000, to: 3002 };
        assert_eq!(range.ports().collect::<Vec<_>>(), vec![3000, 3001, 3002]);
    }
}
