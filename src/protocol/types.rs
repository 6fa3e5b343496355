use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The result of a successful `initialize` call.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub capabilities: Value,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// One entry returned by `tools/list`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct McpToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "inputSchema")]
    pub input_schema: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolListResult {
    #[serde(default)]
    pub tools: Vec<McpToolInfo>,
}

/// One entry returned by `resources/list`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct McpResourceInfo {
    pub uri: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "mimeType")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResourceListResult {
    #[serde(default)]
    pub resources: Vec<McpResourceInfo>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct McpPromptArgument {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
}

/// One entry returned by `prompts/list`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct McpPromptInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub arguments: Vec<McpPromptArgument>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PromptListResult {
    #[serde(default)]
    pub prompts: Vec<McpPromptInfo>,
}

/// Raw result of `resources/read`. The client does not impose a typed shape
/// on resource contents beyond the JSON-RPC `result` field — the `result`
/// may be any JSON value, round-tripped for fidelity.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReadResourceResult(pub Value);
