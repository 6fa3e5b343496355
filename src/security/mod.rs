//! Ingress security analysis: three independent, composable checks run over
//! inbound tool traffic. The classifier and scanner are pure functions; the
//! behavioral analyzer is the one piece of shared, mutable state in this
//! module.

pub mod behavioral;
pub mod credential_scanner;
pub mod prompt_injection;

pub use behavioral::{BehavioralAnalyzer, BehaviorVerdict};
pub use credential_scanner::{CredentialExposure, ExposureSeverity, ScanResult};
pub use prompt_injection::{ClassificationResult, InjectionRiskBucket};
