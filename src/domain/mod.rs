//! Shared data model. Entities here are described by their essential
//! attributes and invariants, not by the schema of any particular store —
//! the persistence port maps these to and from SQLite rows.

mod agent_profile;
mod alert;
mod capability;
mod endpoint;
mod execution;
mod tool;

pub use agent_profile::{AgentProfile, Anomaly, AnomalySeverity, AnomalyType};
pub use alert::{Alert, AlertSeverity};
pub use capability::{AreaFlags, CapabilitySet};
pub use endpoint::{Endpoint, EndpointStatus};
pub use execution::{Execution, ExecutionStatus};
pub use tool::{RiskLevel, Tool};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The result of a single probe. Unlike `EndpointStatus`, a probe always
/// resolves to one of these two outcomes — there is no `unknown` variant
/// here, since every probe either succeeds or fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeOutcome {
    Online,
    Offline,
}

impl From<ProbeOutcome> for EndpointStatus {
    fn from(outcome: ProbeOutcome) -> Self {
        match outcome {
            ProbeOutcome::Online => EndpointStatus::Online,
            ProbeOutcome::Offline => EndpointStatus::Offline,
        }
    }
}

/// An append-only record of one probe outcome. Immutable once written,
/// one entry per probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub id: uuid::Uuid,
    pub endpoint_id: uuid::Uuid,
    pub outcome: ProbeOutcome,
    pub response_time_ms: Option<u64>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}
