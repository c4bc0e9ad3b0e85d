//! Adapts remote MCP tools to the host's `Tool` trait.
//!
//! Each tool discovered on a session is wrapped in one [`McpToolAdapter`]
//! and registered in the host tool registry. The agent invokes MCP tools
//! exactly like built-in tools; the adapter routes the call through its
//! session and flattens the result to text.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::client::McpSession;
use crate::protocol::ToolDescriptor;
use crate::tools::{Tool, ToolResult};

/// Wraps a single remote tool as a host tool.
///
/// Exposed names are `mcp_{server}_{tool}`, so tools from different servers
/// cannot collide as long as server names are unique within the fleet.
/// Adapters are stateless; all state lives on the session they reference,
/// and they must not be used after the fleet is stopped.
pub struct McpToolAdapter {
    namespaced_name: String,
    description: String,
    remote_name: String,
    input_schema: Value,
    session: Arc<McpSession>,
}

impl McpToolAdapter {
    pub fn new(session: Arc<McpSession>, tool: &ToolDescriptor) -> Self {
        Self {
            namespaced_name: Self::namespaced_name(session.name(), &tool.name),
            description: format!("[MCP:{}] {}", session.name(), tool.description),
            remote_name: tool.name.clone(),
            input_schema: tool.input_schema.clone(),
            session,
        }
    }

    /// Build the namespaced tool name from server and tool names.
    pub fn namespaced_name(server: &str, tool: &str) -> String {
        format!("mcp_{server}_{tool}")
    }
}

#[async_trait]
impl Tool for McpToolAdapter {
    fn name(&self) -> &str {
        &self.namespaced_name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.input_schema.clone()
    }

    async fn execute(&self, arguments: Value, cancel: &CancellationToken) -> ToolResult {
        match self
            .session
            .call_tool(&self.remote_name, arguments, cancel)
            .await
        {
            Ok(result) => {
                let text = result.flatten_text();
                if result.is_error {
                    ToolResult::error(text)
                } else {
                    ToolResult::success(text)
                }
            }
            Err(e) => ToolResult::error(format!("MCP tool {} error: {e}", self.remote_name)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
