//! # wren-mcp
//!
//! MCP (Model Context Protocol) client subsystem for the wren agent.
//!
//! Spawns configured tool-provider processes, speaks JSON-RPC 2.0 over
//! their stdio, and exposes every discovered tool as a first-class entry in
//! the host's tool registry. Each server gets its own session; a failing
//! server never takes down its peers or the host.
//!
//! ## Architecture
//!
//! ```text
//! McpManager
//!   ├── McpSession("fs")      ← stdio subprocess
//!   │     └── tools: [read_file, write_file, ...]
//!   ├── McpSession("github")  ← stdio subprocess
//!   │     └── tools: [create_issue, get_pr, ...]
//!   └── ...
//!
//! Each tool → McpToolAdapter → registered in ToolRegistry
//! Agent calls mcp_fs_read_file → adapter → session → JSON-RPC → server
//! ```
//!
//! Sessions are half-duplex: one in-flight request per server, responses in
//! request order. Across servers everything runs in parallel.
//!
//! ## Usage
//!
//! ```ignore
//! let fleet = FleetConfig::load("servers.json")?;
//! let registry = Arc::new(ToolRegistry::new());
//! let manager = McpManager::new();
//!
//! let cancel = CancellationToken::new();
//! manager.start(&fleet, &registry, &cancel).await;
//! // ... the agent loop invokes registry tools ...
//! manager.stop().await;
//! ```

pub mod adapter;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod manager;
pub mod protocol;
pub mod tools;
pub mod transport;

#[cfg(test)]
pub(crate) mod testutil;

pub use adapter::McpToolAdapter;
pub use client::{McpSession, SessionState};
pub use config::{FleetConfig, ServerDescriptor};
pub use error::McpError;
pub use manager::McpManager;
pub use tools::{Tool, ToolRegistry, ToolResult};
