//! Fleet configuration: which MCP servers to run and how to spawn them.
//!
//! The host's configuration loader hands the fleet manager an ordered list
//! of [`ServerDescriptor`]s. The conventional on-disk format is JSON.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::McpError;

/// Immutable configuration for one external tool provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerDescriptor {
    /// Short identifier, unique within a fleet; used as the tool namespace
    /// prefix.
    pub name: String,

    /// Absolute or PATH-resolvable executable.
    pub command: String,

    /// Arguments to the command.
    #[serde(default)]
    pub args: Vec<String>,

    /// `KEY=VALUE` entries passed verbatim to the child. The parent
    /// environment is not inherited unless `inherit_env` is set, so
    /// credentials the server needs must be listed here explicitly.
    #[serde(default)]
    pub env: Vec<String>,

    /// Disabled descriptors are skipped at fleet start.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Opt-in: also pass the parent process environment to the child.
    #[serde(default)]
    pub inherit_env: bool,
}

fn default_true() -> bool {
    true
}

/// An ordered set of server descriptors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetConfig {
    #[serde(default)]
    pub servers: Vec<ServerDescriptor>,
}

impl FleetConfig {
    /// Parse a fleet config from a JSON string and validate it.
    pub fn from_json_str(data: &str) -> Result<Self, McpError> {
        let config: Self = serde_json::from_str(data)
            .map_err(|e| McpError::Config(format!("invalid fleet config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a fleet config from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, McpError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .map_err(|e| McpError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_json_str(&data)
    }

    /// Validate descriptor invariants: non-empty unique names, non-empty
    /// commands, well-formed env entries.
    pub fn validate(&self) -> Result<(), McpError> {
        let mut seen = HashSet::new();
        for server in &self.servers {
            if server.name.is_empty() {
                return Err(McpError::Config("server name must not be empty".into()));
            }
            if server.command.is_empty() {
                return Err(McpError::Config(format!(
                    "server '{}' has an empty command",
                    server.name
                )));
            }
            if !seen.insert(server.name.as_str()) {
                return Err(McpError::Config(format!(
                    "duplicate server name '{}'",
                    server.name
                )));
            }
            for entry in &server.env {
                if !entry.contains('=') {
                    return Err(McpError::Config(format!(
                        "server '{}' env entry '{}' is not KEY=VALUE",
                        server.name, entry
                    )));
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_defaults() {
        let config = FleetConfig::from_json_str(
            r#"{
                "servers": [
                    {"name": "fs", "command": "mcp-fs"},
                    {
                        "name": "github",
                        "command": "mcp-github",
                        "args": ["--readonly"],
                        "env": ["GITHUB_TOKEN=abc123"],
                        "enabled": false
                    }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.servers.len(), 2);

        let fs = &config.servers[0];
        assert!(fs.enabled);
        assert!(!fs.inherit_env);
        assert!(fs.args.is_empty());
        assert!(fs.env.is_empty());

        let github = &config.servers[1];
        assert!(!github.enabled);
        assert_eq!(github.args, vec!["--readonly"]);
        assert_eq!(github.env, vec!["GITHUB_TOKEN=abc123"]);
    }

    #[test]
    fn test_empty_config() {
        let config = FleetConfig::from_json_str("{}").unwrap();
        assert!(config.servers.is_empty());
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let err = FleetConfig::from_json_str("{nope").unwrap_err();
        assert!(matches!(err, McpError::Config(_)));
    }

    #[test]
    fn test_validation_rejects_bad_descriptors() {
        let cases = [
            r#"{"servers": [{"name": "", "command": "x"}]}"#,
            r#"{"servers": [{"name": "a", "command": ""}]}"#,
            r#"{"servers": [{"name": "a", "command": "x"}, {"name": "a", "command": "y"}]}"#,
            r#"{"servers": [{"name": "a", "command": "x", "env": ["NO_EQUALS_SIGN"]}]}"#,
        ];
        for data in cases {
            let err = FleetConfig::from_json_str(data).unwrap_err();
            assert!(
                matches!(err, McpError::Config(_)),
                "expected config error for {data}"
            );
        }
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let err = FleetConfig::load("/nonexistent/fleet.json").unwrap_err();
        assert!(matches!(err, McpError::Config(_)));
    }
}
