//! JSON-RPC 2.0 client speaking to one MCP endpoint over HTTP POST.
//!
//! One call, one HTTP transaction: the client never multiplexes in-flight
//! requests over a shared connection. Each method decodes `result` straight
//! into the shape the MCP spec promises for that method — no generic
//! intermediate value — except `read_resource`, which round-trips the raw
//! JSON for callers that re-decode it themselves.

mod types;
mod wire;

pub use types::{
    McpPromptArgument, McpPromptInfo, McpResourceInfo, McpToolInfo, PromptListResult,
    ReadResourceResult, ResourceListResult, ServerInfo, ToolListResult,
};
pub use wire::{JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION};

use crate::errors::{SentinelError, SentinelResult};
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};
use wire::RequestIdAllocator;

pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);
pub const TOOL_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Speaks JSON-RPC 2.0 to one MCP endpoint over HTTP POST.
pub struct ProtocolClient {
    http: Client,
    ids: RequestIdAllocator,
    client_name: String,
    client_version: String,
}

impl ProtocolClient {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            ids: RequestIdAllocator::new(),
            client_name: "mcp-sentinel".to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// `initialize` the MCP handshake, then fire the `notifications/initialized`
    /// notification. Any failure along the way is surfaced as
    /// `HandshakeFailed`.
    pub async fn initialize(&self, url: &str, timeout: Duration) -> SentinelResult<ServerInfo> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "roots": {"listChanged": true},
                "sampling": {}
            },
            "clientInfo": {
                "name": self.client_name,
                "version": self.client_version,
            }
        });

        let result = self
            .call_raw(url, "initialize", Some(params), timeout)
            .await
            .map_err(|e| handshake_error(url, e))?;

        let info: ServerInfo = serde_json::from_value(result).map_err(|e| {
            SentinelError::HandshakeFailed {
                url: url.to_string(),
                message: format!("malformed initialize result: {e}"),
            }
        })?;

        // Fire-and-forget: the server expects this notification but sends no
        // response to it, so a failure here is logged, not propagated.
        if let Err(e) = self.notify(url, "notifications/initialized", None, timeout).await {
            warn!(url, error = %e, "failed to send notifications/initialized");
        }

        Ok(info)
    }

    pub async fn list_tools(&self, url: &str, timeout: Duration) -> SentinelResult<ToolListResult> {
        self.call_typed(url, "tools/list", None, timeout).await
    }

    pub async fn list_resources(
        &self,
        url: &str,
        timeout: Duration,
    ) -> SentinelResult<ResourceListResult> {
        self.call_typed(url, "resources/list", None, timeout).await
    }

    pub async fn list_prompts(
        &self,
        url: &str,
        timeout: Duration,
    ) -> SentinelResult<PromptListResult> {
        self.call_typed(url, "prompts/list", None, timeout).await
    }

    /// `tools/call`. An RPC error object becomes `ToolExecutionFailed`
    /// carrying the server's message verbatim.
    pub async fn call_tool(
        &self,
        url: &str,
        name: &str,
        arguments: Value,
        timeout: Duration,
    ) -> SentinelResult<Value> {
        let params = json!({"name": name, "arguments": arguments});
        self.call_raw(url, "tools/call", Some(params), timeout)
            .await
            .map_err(|e| match e {
                SentinelError::Remote { message, .. } => SentinelError::ToolExecutionFailed {
                    tool: name.to_string(),
                    message,
                },
                other => other,
            })
    }

    pub async fn read_resource(
        &self,
        url: &str,
        uri: &str,
        timeout: Duration,
    ) -> SentinelResult<ReadResourceResult> {
        let params = json!({"uri": uri});
        let result = self
            .call_raw(url, "resources/read", Some(params), timeout)
            .await?;
        Ok(ReadResourceResult(result))
    }

    /// Lightweight liveness probe used by the monitoring loop.
    pub async fn ping(&self, url: &str, timeout: Duration) -> SentinelResult<()> {
        self.call_raw(url, "ping", None, timeout).await.map(|_| ())
    }

    async fn call_typed<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> SentinelResult<T> {
        let result = self.call_raw(url, method, params, timeout).await?;
        serde_json::from_value(result).map_err(|e| {
            SentinelError::protocol(url, format!("malformed {method} result: {e}"))
        })
    }

    async fn call_raw(
        &self,
        url: &str,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> SentinelResult<Value> {
        let id = self.ids.next();
        let request = JsonRpcRequest::call(id, method, params);
        debug!(url, method, id, "sending JSON-RPC request");

        let response = tokio::time::timeout(timeout, self.send(url, &request))
            .await
            .map_err(|_| SentinelError::transport(url, format!("{method} timed out")))??;

        if response.is_malformed() {
            return Err(SentinelError::protocol(
                url,
                "response missing jsonrpc 2.0 envelope",
            ));
        }
        if let Some(error) = response.error {
            return Err(SentinelError::Remote {
                url: url.to_string(),
                code: error.code,
                message: error.message,
            });
        }
        response
            .result
            .ok_or_else(|| SentinelError::protocol(url, "response had neither result nor error"))
    }

    async fn notify(
        &self,
        url: &str,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> SentinelResult<()> {
        let request = JsonRpcRequest::notification(method, params);
        tokio::time::timeout(timeout, self.send_notification(url, &request))
            .await
            .map_err(|_| SentinelError::transport(url, format!("{method} notification timed out")))?
    }

    async fn send(&self, url: &str, request: &JsonRpcRequest) -> SentinelResult<JsonRpcResponse> {
        let response = self
            .http
            .post(url)
            .header("content-type", "application/json")
            .header("user-agent", format!("{}/{}", self.client_name, self.client_version))
            .json(request)
            .send()
            .await
            .map_err(|e| SentinelError::transport(url, e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SentinelError::transport(url, e.to_string()))?;

        if !status.is_success() {
            return Err(SentinelError::protocol(
                url,
                format!("non-200 response: {status}"),
            ));
        }

        serde_json::from_str(&body)
            .map_err(|e| SentinelError::protocol(url, format!("invalid JSON-RPC response: {e}")))
    }

    async fn send_notification(&self, url: &str, request: &JsonRpcRequest) -> SentinelResult<()> {
        let response = self
            .http
            .post(url)
            .header("content-type", "application/json")
            .header("user-agent", format!("{}/{}", self.client_name, self.client_version))
            .json(request)
            .send()
            .await
            .map_err(|e| SentinelError::transport(url, e.to_string()))?;

        if !response.status().is_success() {
            return Err(SentinelError::protocol(
                url,
                format!("non-200 response to notification: {}", response.status()),
            ));
        }
        Ok(())
    }
}

fn handshake_error(url: &str, err: SentinelError) -> SentinelError {
    match err {
        SentinelError::HandshakeFailed { .. } => err,
        other => SentinelError::HandshakeFailed {
            url: url.to_string(),
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> ProtocolClient {
        ProtocolClient::new(crate::utils::http::default_http_client())
    }

    #[tokio::test]
    async fn initialize_succeeds_and_sends_notification() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {
                    "name": "demo",
                    "version": "1.0",
                    "capabilities": {"tools": {}}
                }
            })))
            .mount(&server)
            .await;

        let info = client()
            .initialize(&server.uri(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(info.name, "demo");
    }

    #[tokio::test]
    async fn remote_error_object_surfaces_as_remote_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": -32601, "message": "method not found"}
            })))
            .mount(&server)
            .await;

        let err = client().ping(&server.uri(), Duration::from_secs(1)).await;
        match err {
            Err(SentinelError::Remote { code, .. }) => assert_eq!(code, -32601),
            other => panic!("expected Remote error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_200_status_is_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client().ping(&server.uri(), Duration::from_secs(1)).await;
        assert!(matches!(err, Err(SentinelError::Protocol { .. })));
    }

    #[tokio::test]
    async fn malformed_envelope_is_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client().ping(&server.uri(), Duration::from_secs(1)).await;
        assert!(matches!(err, Err(SentinelError::Protocol { .. })));
    }

    #[tokio::test]
    async fn call_tool_rpc_error_becomes_tool_execution_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": -32000, "message": "file not found"}
            })))
            .mount(&server)
            .await;

        let err = client()
            .call_tool(&server.uri(), "read_file", json!({"path": "/x"}), Duration::from_secs(1))
            .await;
        match err {
            Err(SentinelError::ToolExecutionFailed { tool, message }) => {
                assert_eq!(tool, "read_file");
                assert_eq!(message, "file not found");
            }
            other => panic!("expected ToolExecutionFailed, got {other:?}"),
        }
    }
}
