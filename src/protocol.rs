//! JSON-RPC 2.0 protocol types for MCP communication.
//!
//! Implements the envelope shapes the client speaks on the wire: requests,
//! notifications, responses and error responses, plus the MCP handshake and
//! tool types layered on top. Decoding of tool call results is deliberately
//! permissive; servers in the wild emit several historical shapes.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::McpError;

/// JSON-RPC protocol version constant.
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol version announced by this client.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Method names used by the client.
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const SHUTDOWN: &str = "shutdown";
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
    pub const RESOURCES_LIST: &str = "resources/list";
    pub const RESOURCES_READ: &str = "resources/read";
    pub const PROMPTS_LIST: &str = "prompts/list";
    pub const PROMPTS_GET: &str = "prompts/get";
}

/// Standard JSON-RPC error codes. Surfaced when a server uses them, never
/// produced locally; all other codes pass through unchanged.
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}

// ---------------------------------------------------------------------------
// JSON-RPC 2.0 envelopes
// ---------------------------------------------------------------------------

/// A JSON-RPC 2.0 request (has an `id`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 notification. No `id` field is serialized; no response is
/// expected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// A successful JSON-RPC 2.0 response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: u64,
    pub result: Value,
}

/// A JSON-RPC 2.0 error response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcErrorResponse {
    pub jsonrpc: String,
    pub id: u64,
    pub error: JsonRpcError,
}

/// A JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.data {
            Some(data) => write!(f, "{}: {}", self.message, data),
            None => write!(f, "{}", self.message),
        }
    }
}

/// One frame on the wire, as a discriminated union over the four envelope
/// shapes sharing `jsonrpc = "2.0"`.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcEnvelope {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
    Response(JsonRpcResponse),
    Error(JsonRpcErrorResponse),
}

impl RpcEnvelope {
    /// Serialize to compact single-line UTF-8 JSON. The output never
    /// contains a line terminator; framing appends exactly one `\n`.
    pub fn encode(&self) -> Result<String, McpError> {
        let line = match self {
            Self::Request(req) => serde_json::to_string(req)?,
            Self::Notification(notif) => serde_json::to_string(notif)?,
            Self::Response(resp) => serde_json::to_string(resp)?,
            Self::Error(err) => serde_json::to_string(err)?,
        };
        Ok(line)
    }

    /// Decode one frame.
    ///
    /// A message with a `method` is a notification when `id` is absent,
    /// `null`, or `0` (one observed implementation style emits `id: 0` for
    /// notifications; it is tolerated on input). A message without a
    /// `method` must carry an `id` and exactly one of `result`/`error`.
    pub fn decode(line: &str) -> Result<Self, McpError> {
        let raw: Value = serde_json::from_str(line)?;
        let obj = raw
            .as_object()
            .ok_or_else(|| McpError::ProtocolViolation("frame is not a JSON object".into()))?;

        match obj.get("jsonrpc").and_then(Value::as_str) {
            Some(JSONRPC_VERSION) => {}
            Some(other) => {
                return Err(McpError::ProtocolViolation(format!(
                    "unsupported jsonrpc version '{other}'"
                )))
            }
            None => return Err(McpError::ProtocolViolation("missing jsonrpc field".into())),
        }

        let id = obj.get("id");
        let params = obj.get("params").cloned();

        if let Some(method) = obj.get("method").and_then(Value::as_str) {
            let id_num = id.filter(|v| !v.is_null()).map(|v| {
                v.as_u64().ok_or_else(|| {
                    McpError::ProtocolViolation("request id must be a non-negative integer".into())
                })
            });
            return match id_num.transpose()? {
                None | Some(0) => Ok(Self::Notification(JsonRpcNotification {
                    jsonrpc: JSONRPC_VERSION.to_string(),
                    method: method.to_string(),
                    params,
                })),
                Some(id) => Ok(Self::Request(JsonRpcRequest {
                    jsonrpc: JSONRPC_VERSION.to_string(),
                    id,
                    method: method.to_string(),
                    params,
                })),
            };
        }

        let Some(id) = id else {
            return Err(McpError::ProtocolViolation(
                "message carries neither method nor id".into(),
            ));
        };
        let id = if id.is_null() {
            0
        } else {
            id.as_u64().ok_or_else(|| {
                McpError::ProtocolViolation("response id must be a non-negative integer".into())
            })?
        };

        match (obj.get("result"), obj.get("error")) {
            (Some(_), Some(_)) => Err(McpError::ProtocolViolation(
                "response carries both result and error".into(),
            )),
            (None, None) => Err(McpError::ProtocolViolation(
                "response carries neither result nor error".into(),
            )),
            (Some(result), None) => Ok(Self::Response(JsonRpcResponse {
                jsonrpc: JSONRPC_VERSION.to_string(),
                id,
                result: result.clone(),
            })),
            (None, Some(error)) => {
                let error: JsonRpcError = serde_json::from_value(error.clone())?;
                Ok(Self::Error(JsonRpcErrorResponse {
                    jsonrpc: JSONRPC_VERSION.to_string(),
                    id,
                    error,
                }))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Handshake types
// ---------------------------------------------------------------------------

/// Client info sent during initialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

/// Server info received during initialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// Client capabilities advertised during initialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientCapabilities {
    #[serde(default)]
    pub roots: RootsCapability,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootsCapability {
    #[serde(default)]
    pub list_changed: bool,
}

/// Server capabilities received during initialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts: Option<PromptsCapability>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapability {
    #[serde(default)]
    pub list_changed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesCapability {
    #[serde(default)]
    pub subscribe: bool,
    #[serde(default)]
    pub list_changed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptsCapability {
    #[serde(default)]
    pub list_changed: bool,
}

/// Parameters for the `initialize` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: String,
    pub capabilities: ClientCapabilities,
    pub client_info: ClientInfo,
}

/// Result of the `initialize` request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    #[serde(default)]
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: ServerCapabilities,
    #[serde(default)]
    pub server_info: ServerInfo,
}

// ---------------------------------------------------------------------------
// Tool types
// ---------------------------------------------------------------------------

/// A tool advertised by an MCP server via `tools/list`.
///
/// `input_schema` is an opaque JSON Schema produced by a third party and
/// consumed by an LLM; it is propagated verbatim, never modelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

/// Result of `tools/list`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolsListResult {
    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,
    #[serde(rename = "nextCursor", default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// One element of a tool call result's `content` array.
///
/// Unknown `type` tags are preserved as raw values rather than dropped, for
/// forward compatibility.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Image {
        data: String,
        mime_type: String,
    },
    Resource {
        uri: String,
        mime_type: Option<String>,
        text: Option<String>,
        blob: Option<String>,
    },
    Unknown(Value),
}

impl ContentBlock {
    fn from_value(raw: Value) -> Self {
        if let Some(obj) = raw.as_object() {
            match obj.get("type").and_then(Value::as_str) {
                Some("text") => {
                    if let Some(text) = obj.get("text").and_then(Value::as_str) {
                        return Self::Text {
                            text: text.to_string(),
                        };
                    }
                }
                Some("image") => {
                    let data = obj.get("data").and_then(Value::as_str);
                    let mime_type = obj.get("mimeType").and_then(Value::as_str);
                    if let (Some(data), Some(mime_type)) = (data, mime_type) {
                        return Self::Image {
                            data: data.to_string(),
                            mime_type: mime_type.to_string(),
                        };
                    }
                }
                Some("resource") => {
                    if let Some(uri) = obj.get("uri").and_then(Value::as_str) {
                        return Self::Resource {
                            uri: uri.to_string(),
                            mime_type: obj
                                .get("mimeType")
                                .and_then(Value::as_str)
                                .map(str::to_string),
                            text: obj.get("text").and_then(Value::as_str).map(str::to_string),
                            blob: obj.get("blob").and_then(Value::as_str).map(str::to_string),
                        };
                    }
                }
                _ => {}
            }
        }
        Self::Unknown(raw)
    }
}

impl<'de> Deserialize<'de> for ContentBlock {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Ok(Self::from_value(raw))
    }
}

/// Result of `tools/call`.
///
/// Decoding accepts the three historical shapes: a bare string, a bare array
/// of content blocks, or an object `{content: [...], isError?: bool}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCallResult {
    pub content: Vec<ContentBlock>,
    pub is_error: bool,
}

impl ToolCallResult {
    pub fn from_value(raw: Value) -> Self {
        match raw {
            Value::String(text) => Self {
                content: vec![ContentBlock::Text { text }],
                is_error: false,
            },
            Value::Array(items) => Self {
                content: items.into_iter().map(ContentBlock::from_value).collect(),
                is_error: false,
            },
            Value::Object(mut obj) => {
                let is_error = obj
                    .get("isError")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let content = match obj.remove("content") {
                    Some(Value::Array(items)) => {
                        items.into_iter().map(ContentBlock::from_value).collect()
                    }
                    _ => Vec::new(),
                };
                Self { content, is_error }
            }
            _ => Self::default(),
        }
    }

    /// Concatenate the text of all text-bearing blocks, in order. Non-text
    /// blocks contribute nothing; empty content yields the empty string.
    pub fn flatten_text(&self) -> String {
        let mut out = String::new();
        for block in &self.content {
            match block {
                ContentBlock::Text { text } => out.push_str(text),
                ContentBlock::Unknown(raw) => {
                    if raw.get("type").and_then(Value::as_str) == Some("text") {
                        if let Some(text) = raw.get("text").and_then(Value::as_str) {
                            out.push_str(text);
                        }
                    }
                }
                _ => {}
            }
        }
        out
    }
}

impl<'de> Deserialize<'de> for ToolCallResult {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Ok(Self::from_value(raw))
    }
}

// ---------------------------------------------------------------------------
// Resource / prompt discovery (shape-compatible, loosely typed)
// ---------------------------------------------------------------------------

/// Result of `resources/list`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResourcesListResult {
    #[serde(default)]
    pub resources: Vec<Value>,
    #[serde(rename = "nextCursor", default)]
    pub next_cursor: Option<String>,
}

/// Result of `resources/read`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResourceReadResult {
    #[serde(default)]
    pub contents: Vec<Value>,
}

/// Result of `prompts/list`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PromptsListResult {
    #[serde(default)]
    pub prompts: Vec<Value>,
    #[serde(rename = "nextCursor", default)]
    pub next_cursor: Option<String>,
}

/// Result of `prompts/get`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PromptGetResult {
    #[serde(default)]
    pub messages: Vec<Value>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
