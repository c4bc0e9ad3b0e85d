//! The host agent's tool surface, as consumed by this subsystem.
//!
//! The agent's LLM loop queries and invokes tools through a registry; this
//! crate only needs the thin capability set below to register MCP-backed
//! adapters alongside the built-in tools.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Outcome of a tool invocation: success text, or an error marker with a
/// message for the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub text: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

/// A callable tool as the host registry sees it.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name presented to the model.
    fn name(&self) -> &str;

    /// Human/model-readable description.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's arguments.
    fn parameters(&self) -> Value;

    /// Invoke the tool. Implementations report failures through an
    /// error-tagged [`ToolResult`] rather than aborting the host iteration.
    async fn execute(&self, arguments: Value, cancel: &CancellationToken) -> ToolResult;
}

/// The host's tool registry. Registration is the only operation this
/// subsystem performs; lookup exists for the host and for tests.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any previous entry with the same name.
    pub fn register(&self, tool: Arc<dyn Tool>) {
        self.tools.write().insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.read().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
