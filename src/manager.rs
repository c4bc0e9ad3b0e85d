//! Fleet manager for MCP server sessions.
//!
//! Owns every session, keyed by server name. Enabled descriptors are started
//! concurrently; a server that fails to spawn or initialize is logged and
//! discarded without affecting its peers, and `start` itself never fails.
//! Discovered tools are wrapped in adapters and registered with the host
//! tool registry as part of startup.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::adapter::McpToolAdapter;
use crate::client::McpSession;
use crate::config::{FleetConfig, ServerDescriptor};
use crate::error::McpError;
use crate::tools::{Tool, ToolRegistry};

/// Bound on one server's connect + initialize + tool discovery, so a hung
/// server cannot stall fleet startup.
const START_TIMEOUT: Duration = Duration::from_secs(30);

/// Manages the fleet of MCP sessions.
pub struct McpManager {
    sessions: RwLock<HashMap<String, Arc<McpSession>>>,
}

impl McpManager {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Start every enabled server in the fleet, in parallel, and register
    /// the discovered tools. Returns once all attempts have completed;
    /// individual failures are quarantined and logged.
    pub async fn start(
        &self,
        fleet: &FleetConfig,
        registry: &Arc<ToolRegistry>,
        cancel: &CancellationToken,
    ) {
        tracing::info!(target: "mcp.manager", "starting MCP manager");

        let mut handles = Vec::new();
        let mut seen = HashSet::new();
        for descriptor in &fleet.servers {
            if !descriptor.enabled {
                tracing::debug!(
                    target: "mcp.manager",
                    server = %descriptor.name,
                    "skipping disabled MCP server"
                );
                continue;
            }
            if !seen.insert(descriptor.name.clone()) {
                tracing::warn!(
                    target: "mcp.manager",
                    server = %descriptor.name,
                    "skipping duplicate MCP server name"
                );
                continue;
            }

            let descriptor = descriptor.clone();
            let registry = Arc::clone(registry);
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                start_server(descriptor, &registry, &cancel).await
            }));
        }

        for handle in handles {
            match handle.await {
                Ok(Some((name, session))) => {
                    self.sessions.write().insert(name, session);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(
                        target: "mcp.manager",
                        error = %e,
                        "MCP server start task failed"
                    );
                }
            }
        }

        tracing::info!(
            target: "mcp.manager",
            count = self.sessions.read().len(),
            "MCP manager started"
        );
    }

    /// Look up a session by server name.
    pub fn get(&self, name: &str) -> Option<Arc<McpSession>> {
        self.sessions.read().get(name).cloned()
    }

    /// Snapshot of currently active server names.
    pub fn list_names(&self) -> Vec<String> {
        self.sessions.read().keys().cloned().collect()
    }

    /// Close all sessions concurrently and clear the fleet. Idempotent.
    pub async fn stop(&self) {
        let sessions: Vec<(String, Arc<McpSession>)> =
            self.sessions.write().drain().collect();
        if sessions.is_empty() {
            return;
        }

        tracing::info!(target: "mcp.manager", "stopping MCP manager");
        let handles: Vec<_> = sessions
            .into_iter()
            .map(|(name, session)| {
                tokio::spawn(async move {
                    session.close().await;
                    tracing::debug!(target: "mcp.manager", server = %name, "MCP session closed");
                })
            })
            .collect();
        for handle in handles {
            let _ = handle.await;
        }
    }
}

impl Default for McpManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Bring up one server and register its tools. Returns `None` on failure;
/// the error has already been logged and the session closed.
async fn start_server(
    descriptor: ServerDescriptor,
    registry: &ToolRegistry,
    cancel: &CancellationToken,
) -> Option<(String, Arc<McpSession>)> {
    let name = descriptor.name.clone();
    tracing::info!(
        target: "mcp.manager",
        server = %name,
        command = %descriptor.command,
        "connecting to MCP server"
    );

    let session = Arc::new(McpSession::new(descriptor));
    match tokio::time::timeout(START_TIMEOUT, bring_up(&session, cancel)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::error!(
                target: "mcp.manager",
                server = %name,
                error = %e,
                "failed to start MCP server"
            );
            session.close().await;
            return None;
        }
        Err(_) => {
            tracing::error!(
                target: "mcp.manager",
                server = %name,
                timeout = ?START_TIMEOUT,
                "MCP server start timed out"
            );
            session.close().await;
            return None;
        }
    }

    let tools = session.cached_tools().await;
    for tool in &tools {
        let adapter = Arc::new(McpToolAdapter::new(Arc::clone(&session), tool));
        tracing::info!(
            target: "mcp.manager",
            server = %name,
            tool = %adapter.name(),
            "registered MCP tool"
        );
        registry.register(adapter);
    }

    tracing::info!(
        target: "mcp.manager",
        server = %name,
        tools = tools.len(),
        "connected to MCP server"
    );
    Some((name, session))
}

async fn bring_up(session: &McpSession, cancel: &CancellationToken) -> Result<(), McpError> {
    session.connect(cancel).await?;
    session.initialize(cancel).await?;
    // Tool discovery is best-effort: a server without tools/list still gets
    // a live session.
    if let Err(e) = session.list_tools(cancel).await {
        tracing::warn!(
            target: "mcp.manager",
            server = %session.name(),
            error = %e,
            "failed to list tools"
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
