#![allow(dead_code)]

use thiserror::Error;

/// Typed error hierarchy for the sentinel core.
///
/// Use at module boundaries (protocol client, monitoring supervisor, tool
/// catalog, persistence port) so callers can match on the taxonomy from the
/// design doc instead of parsing strings. Internal/leaf functions may still
/// use `anyhow::Result` — `Internal` converts seamlessly via `?`.
#[derive(Debug, Error)]
pub enum SentinelError {
    /// HTTP/TCP/DNS/TLS failure, or a timeout. Retryable at caller discretion.
    #[error("transport error calling {url}: {message}")]
    Transport { url: String, message: String },

    /// Non-200 response, malformed JSON, missing `jsonrpc`, or wrong version.
    /// Never retried silently.
    #[error("protocol error from {url}: {message}")]
    Protocol { url: String, message: String },

    /// A well-formed JSON-RPC `error` object came back from the remote server.
    #[error("remote error {code} from {url}: {message}")]
    Remote {
        url: String,
        code: i64,
        message: String,
    },

    /// The `initialize` handshake itself failed (transport, protocol, or
    /// remote error during the handshake specifically).
    #[error("handshake with {url} failed: {message}")]
    HandshakeFailed { url: String, message: String },

    /// `tools/call` returned an RPC error object.
    #[error("tool '{tool}' execution failed: {message}")]
    ToolExecutionFailed { tool: String, message: String },

    /// Pre-flight argument validation failure. Never reaches the endpoint.
    #[error("validation error: {0}")]
    Validation(String),

    /// Endpoint or tool id not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invocation attempted on a disabled tool.
    #[error("tool '{0}' is disabled")]
    Disabled(String),

    /// Persistence-layer failure. Surfaced to the caller, but non-fatal for
    /// supervisory write paths: a history-insert failure is logged and the
    /// monitoring loop continues.
    #[error("persistence error: {0}")]
    Persistence(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type SentinelResult<T> = std::result::Result<T, SentinelError>;

impl SentinelError {
    /// Whether this error is transient and safe to retry at the caller's
    /// discretion. Protocol/remote/validation errors are never retried
    /// silently.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SentinelError::Transport { .. })
    }

    pub fn transport(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn protocol(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol {
            url: url.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_is_retryable() {
        let err = SentinelError::transport("http://x", "connection refused");
        assert!(err.is_retryable());
    }

    #[test]
    fn protocol_error_is_not_retryable() {
        let err = SentinelError::protocol("http://x", "bad json");
        assert!(!err.is_retryable());
    }

    #[test]
    fn remote_error_is_not_retryable() {
        let err = SentinelError::Remote {
            url: "http://x".into(),
            code: -32000,
            message: "boom".into(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn validation_error_display() {
        let err = SentinelError::Validation("missing required property 'path'".into());
        assert_eq!(
            err.to_string(),
            "validation error: missing required property 'path'"
        );
    }

    #[test]
    fn internal_from_anyhow() {
        let anyhow_err = anyhow::anyhow!("something broke");
        let err: SentinelError = anyhow_err.into();
        assert!(matches!(err, SentinelError::Internal(_)));
        assert!(!err.is_retryable());
    }
}
