//! MCP session client.
//!
//! One [`McpSession`] per server process. The session drives the transport
//! through connect → initialize → ready → shutdown, correlates requests with
//! responses, and caches the server's tool list for registration.
//!
//! Requests are strictly serialized: the session mutex is held for the
//! duration of send + receive, so at most one request is in flight per
//! server and responses arrive in request order. Server notifications that
//! arrive inside a round-trip are logged and dropped; a demultiplexer would
//! live here if a future revision wants to consume them.

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::ServerDescriptor;
use crate::error::McpError;
use crate::protocol::{
    methods, ClientCapabilities, ClientInfo, InitializeParams, InitializeResult,
    JsonRpcNotification, JsonRpcRequest, PromptGetResult, PromptsListResult, ResourceReadResult,
    ResourcesListResult, RpcEnvelope, ServerCapabilities, ServerInfo, ToolCallResult,
    ToolDescriptor, ToolsListResult, MCP_PROTOCOL_VERSION,
};
use crate::transport::StdioTransport;

/// Client name announced in the `initialize` handshake.
const CLIENT_NAME: &str = "wren";

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Started,
    Initialized,
    ShuttingDown,
    Closed,
}

struct SessionInner {
    state: SessionState,
    transport: StdioTransport,
    /// Monotone request id, incremented before each correlated send.
    request_id: u64,
    protocol_version: Option<String>,
    server_info: Option<ServerInfo>,
    capabilities: Option<ServerCapabilities>,
    tools: Vec<ToolDescriptor>,
}

/// A connection to a single MCP server.
pub struct McpSession {
    name: String,
    inner: Mutex<SessionInner>,
}

impl McpSession {
    pub fn new(descriptor: ServerDescriptor) -> Self {
        let transport = StdioTransport::new(&descriptor);
        Self {
            name: descriptor.name,
            inner: Mutex::new(SessionInner {
                state: SessionState::Disconnected,
                transport,
                request_id: 0,
                protocol_version: None,
                server_info: None,
                capabilities: None,
                tools: Vec::new(),
            }),
        }
    }

    /// The server name (tool namespace prefix).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    pub async fn is_initialized(&self) -> bool {
        self.inner.lock().await.state == SessionState::Initialized
    }

    /// The protocol version announced by the server. Recorded, never
    /// enforced.
    pub async fn negotiated_protocol_version(&self) -> Option<String> {
        self.inner.lock().await.protocol_version.clone()
    }

    pub async fn server_info(&self) -> Option<ServerInfo> {
        self.inner.lock().await.server_info.clone()
    }

    pub async fn capabilities(&self) -> Option<ServerCapabilities> {
        self.inner.lock().await.capabilities.clone()
    }

    /// Snapshot of the tools discovered by the last `tools/list`.
    pub async fn cached_tools(&self) -> Vec<ToolDescriptor> {
        self.inner.lock().await.tools.clone()
    }

    /// Launch the server process.
    pub async fn connect(&self, cancel: &CancellationToken) -> Result<(), McpError> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            SessionState::Disconnected => {}
            SessionState::Started | SessionState::Initialized => return Ok(()),
            SessionState::ShuttingDown | SessionState::Closed => {
                return Err(McpError::SessionClosed(self.name.clone()))
            }
        }
        if cancel.is_cancelled() {
            return Err(McpError::Cancelled);
        }

        tracing::info!(target: "mcp.client", server = %self.name, "connecting to MCP server");
        inner.transport.start()?;

        if cancel.is_cancelled() {
            inner.transport.close().await;
            inner.state = SessionState::Closed;
            return Err(McpError::Cancelled);
        }
        inner.state = SessionState::Started;
        Ok(())
    }

    /// Perform the `initialize` handshake. On success the session stores the
    /// server's capabilities, emits `notifications/initialized`, and becomes
    /// ready for requests. On failure the session stays in `Started`; the
    /// caller is expected to close it.
    pub async fn initialize(&self, cancel: &CancellationToken) -> Result<(), McpError> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            SessionState::Started | SessionState::Initialized => {}
            SessionState::Disconnected => return Err(McpError::NotConnected(self.name.clone())),
            SessionState::ShuttingDown | SessionState::Closed => {
                return Err(McpError::SessionClosed(self.name.clone()))
            }
        }

        tracing::info!(target: "mcp.client", server = %self.name, "initializing MCP server");

        let params = InitializeParams {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info: ClientInfo {
                name: CLIENT_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };
        let params = serde_json::to_value(&params)?;
        let result = round_trip(
            &mut inner,
            &self.name,
            methods::INITIALIZE,
            Some(params),
            cancel,
        )
        .await?;
        let init: InitializeResult = serde_json::from_value(result)?;

        if init.protocol_version != MCP_PROTOCOL_VERSION {
            tracing::debug!(
                target: "mcp.client",
                server = %self.name,
                announced = %init.protocol_version,
                supported = MCP_PROTOCOL_VERSION,
                "server announced a different protocol version"
            );
        }
        inner.protocol_version = Some(init.protocol_version);
        inner.capabilities = Some(init.capabilities);
        inner.server_info = Some(init.server_info.clone());

        // Completes the handshake; a failure here is not fatal.
        let notif = JsonRpcNotification::new(methods::INITIALIZED, None);
        if let Err(e) = inner.transport.send(&RpcEnvelope::Notification(notif)).await {
            tracing::warn!(
                target: "mcp.client",
                server = %self.name,
                error = %e,
                "failed to send initialized notification"
            );
        }

        inner.state = SessionState::Initialized;
        tracing::info!(
            target: "mcp.client",
            server = %self.name,
            server_name = %init.server_info.name,
            server_version = %init.server_info.version,
            "MCP server initialized"
        );
        Ok(())
    }

    /// Fetch the server's tool list and refresh the cache.
    pub async fn list_tools(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<ToolDescriptor>, McpError> {
        let mut inner = self.inner.lock().await;
        self.ensure_ready(&inner)?;

        tracing::debug!(target: "mcp.client", server = %self.name, "listing tools");
        let result = round_trip(&mut inner, &self.name, methods::TOOLS_LIST, None, cancel).await?;
        let list: ToolsListResult = serde_json::from_value(result)?;

        inner.tools = list.tools.clone();
        tracing::info!(
            target: "mcp.client",
            server = %self.name,
            count = list.tools.len(),
            "discovered tools"
        );
        Ok(list.tools)
    }

    /// Invoke a tool on the server.
    pub async fn call_tool(
        &self,
        tool: &str,
        arguments: serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<ToolCallResult, McpError> {
        let mut inner = self.inner.lock().await;
        self.ensure_ready(&inner)?;

        tracing::info!(target: "mcp.client", server = %self.name, tool = %tool, "calling tool");
        tracing::debug!(target: "mcp.client", server = %self.name, tool = %tool, args = %arguments, "tool arguments");

        let params = serde_json::json!({
            "name": tool,
            "arguments": arguments,
        });
        let result = round_trip(
            &mut inner,
            &self.name,
            methods::TOOLS_CALL,
            Some(params),
            cancel,
        )
        .await?;
        let call_result: ToolCallResult = serde_json::from_value(result)?;

        tracing::info!(
            target: "mcp.client",
            server = %self.name,
            tool = %tool,
            bytes = call_result.flatten_text().len(),
            "tool returned"
        );
        Ok(call_result)
    }

    /// List the server's resources (shape-compatible discovery only).
    pub async fn list_resources(
        &self,
        cancel: &CancellationToken,
    ) -> Result<ResourcesListResult, McpError> {
        let mut inner = self.inner.lock().await;
        self.ensure_ready(&inner)?;
        let result =
            round_trip(&mut inner, &self.name, methods::RESOURCES_LIST, None, cancel).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Read one resource by URI.
    pub async fn read_resource(
        &self,
        uri: &str,
        cancel: &CancellationToken,
    ) -> Result<ResourceReadResult, McpError> {
        let mut inner = self.inner.lock().await;
        self.ensure_ready(&inner)?;
        let params = serde_json::json!({ "uri": uri });
        let result = round_trip(
            &mut inner,
            &self.name,
            methods::RESOURCES_READ,
            Some(params),
            cancel,
        )
        .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// List the server's prompts (shape-compatible discovery only).
    pub async fn list_prompts(
        &self,
        cancel: &CancellationToken,
    ) -> Result<PromptsListResult, McpError> {
        let mut inner = self.inner.lock().await;
        self.ensure_ready(&inner)?;
        let result =
            round_trip(&mut inner, &self.name, methods::PROMPTS_LIST, None, cancel).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Fetch one prompt by name.
    pub async fn get_prompt(
        &self,
        prompt: &str,
        arguments: Option<serde_json::Value>,
        cancel: &CancellationToken,
    ) -> Result<PromptGetResult, McpError> {
        let mut inner = self.inner.lock().await;
        self.ensure_ready(&inner)?;
        let mut params = serde_json::json!({ "name": prompt });
        if let Some(arguments) = arguments {
            params["arguments"] = arguments;
        }
        let result = round_trip(
            &mut inner,
            &self.name,
            methods::PROMPTS_GET,
            Some(params),
            cancel,
        )
        .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Send a `shutdown` request, fire-and-forget. No response is awaited;
    /// the caller follows up with [`close`](Self::close).
    pub async fn shutdown(&self) -> Result<(), McpError> {
        let mut inner = self.inner.lock().await;
        if inner.state != SessionState::Initialized {
            return Ok(());
        }

        tracing::info!(target: "mcp.client", server = %self.name, "shutting down MCP server");
        inner.request_id += 1;
        let req = JsonRpcRequest::new(inner.request_id, methods::SHUTDOWN, None);
        if let Err(e) = inner.transport.send(&RpcEnvelope::Request(req)).await {
            tracing::warn!(
                target: "mcp.client",
                server = %self.name,
                error = %e,
                "failed to send shutdown request"
            );
        }
        inner.state = SessionState::ShuttingDown;
        Ok(())
    }

    /// Close the transport and clear cached state. Idempotent; the server
    /// process has been waited on when this returns.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state == SessionState::Closed {
            return;
        }

        tracing::info!(target: "mcp.client", server = %self.name, "closing MCP session");
        inner.transport.close().await;
        inner.tools.clear();
        inner.state = SessionState::Closed;
    }

    fn ensure_ready(&self, inner: &SessionInner) -> Result<(), McpError> {
        match inner.state {
            SessionState::Initialized => Ok(()),
            SessionState::Disconnected => Err(McpError::NotConnected(self.name.clone())),
            SessionState::Started => Err(McpError::NotInitialized(self.name.clone())),
            SessionState::ShuttingDown | SessionState::Closed => {
                Err(McpError::SessionClosed(self.name.clone()))
            }
        }
    }
}

/// One correlated request/response exchange. The caller holds the session
/// lock, which makes the exchange half-duplex: the next response frame on
/// the wire belongs to this request. Notifications that arrive in between
/// are dropped; a request from the server is a protocol violation.
async fn round_trip(
    inner: &mut SessionInner,
    server: &str,
    method: &str,
    params: Option<serde_json::Value>,
    cancel: &CancellationToken,
) -> Result<serde_json::Value, McpError> {
    inner.request_id += 1;
    let id = inner.request_id;

    let req = JsonRpcRequest::new(id, method, params);
    inner.transport.send(&RpcEnvelope::Request(req)).await?;

    loop {
        match inner.transport.receive(cancel).await? {
            RpcEnvelope::Response(resp) => {
                if resp.id != id {
                    tracing::debug!(
                        target: "mcp.client",
                        server = %server,
                        expected = id,
                        got = resp.id,
                        "response id does not match request id"
                    );
                }
                return Ok(resp.result);
            }
            RpcEnvelope::Error(err) => {
                if err.id != id {
                    tracing::debug!(
                        target: "mcp.client",
                        server = %server,
                        expected = id,
                        got = err.id,
                        "error response id does not match request id"
                    );
                }
                return Err(McpError::Rpc {
                    code: err.error.code,
                    message: err.error.message,
                    data: err.error.data,
                });
            }
            RpcEnvelope::Notification(notif) => {
                tracing::debug!(
                    target: "mcp.client",
                    server = %server,
                    method = %notif.method,
                    "dropping server notification"
                );
            }
            RpcEnvelope::Request(req) => {
                return Err(McpError::ProtocolViolation(format!(
                    "unexpected request '{}' from server",
                    req.method
                )));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
