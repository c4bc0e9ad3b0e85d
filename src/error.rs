//! Error types for MCP client operations.

use serde_json::Value;
use thiserror::Error;

/// Errors produced by the MCP client subsystem.
///
/// Session-level errors are quarantined by the fleet manager; they never
/// propagate past the failing server. Adapter-level errors surface to the
/// host as error-tagged tool results, never as failures of the host loop.
#[derive(Debug, Error)]
pub enum McpError {
    /// The server process could not be spawned.
    #[error("failed to spawn server '{server}': {source}")]
    SpawnFailed {
        server: String,
        #[source]
        source: std::io::Error,
    },

    /// The transport was closed, or the server closed its end (EOF).
    #[error("transport is closed")]
    TransportClosed,

    /// I/O error while writing a frame to the server's stdin.
    #[error("failed to write frame: {0}")]
    WriteFailed(#[source] std::io::Error),

    /// I/O error while reading a frame from the server's stdout.
    #[error("failed to read frame: {0}")]
    ReadFailed(#[source] std::io::Error),

    /// A frame was not valid JSON, or a result had an unexpected shape.
    #[error("invalid JSON: {0}")]
    DecodeFailed(#[from] serde_json::Error),

    /// Well-formed JSON that is not a valid JSON-RPC 2.0 message.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The server returned a JSON-RPC error response.
    #[error("server error [{code}]: {}", render_rpc_message(.message, .data))]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    /// An operation was invoked before the session connected.
    #[error("session '{0}' is not connected")]
    NotConnected(String),

    /// A request was issued before the initialize handshake completed.
    #[error("session '{0}' is not initialized")]
    NotInitialized(String),

    /// The session has been closed; no further requests succeed.
    #[error("session '{0}' is closed")]
    SessionClosed(String),

    /// The caller's cancellation signal fired during the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// Invalid fleet configuration.
    #[error("config error: {0}")]
    Config(String),
}

/// Render a JSON-RPC error as `{message}` or `{message}: {data}`.
fn render_rpc_message(message: &str, data: &Option<Value>) -> String {
    match data {
        Some(data) => format!("{message}: {data}"),
        None => message.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_error_display_without_data() {
        let err = McpError::Rpc {
            code: -32601,
            message: "Method not found".to_string(),
            data: None,
        };
        assert_eq!(err.to_string(), "server error [-32601]: Method not found");
    }

    #[test]
    fn test_rpc_error_display_renders_data() {
        let err = McpError::Rpc {
            code: -32602,
            message: "Invalid params".to_string(),
            data: Some(serde_json::json!({"field": "name"})),
        };
        let msg = err.to_string();
        assert!(msg.contains("Invalid params"));
        assert!(msg.contains("field"));
        assert!(msg.contains("name"));
    }

    #[test]
    fn test_state_error_displays_include_server_name() {
        assert!(McpError::NotConnected("fs".into()).to_string().contains("fs"));
        assert!(McpError::NotInitialized("fs".into()).to_string().contains("fs"));
        assert!(McpError::SessionClosed("fs".into()).to_string().contains("fs"));
    }

    #[test]
    fn test_spawn_failed_preserves_source() {
        use std::error::Error;
        let err = McpError::SpawnFailed {
            server: "fs".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert!(err.to_string().contains("fs"));
        assert!(err.source().is_some());
    }
}
