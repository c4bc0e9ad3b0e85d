//! Shared helpers for tests that drive a scripted MCP server.
//!
//! The mock server is a bash script backed by python3 for JSON handling; it
//! reads JSON-RPC frames from stdin, one per line, and answers on stdout.
//! Tests skip themselves when python3 is unavailable.

use std::path::{Path, PathBuf};

use crate::config::ServerDescriptor;

pub const MOCK_SERVER_SCRIPT: &str = r#"#!/bin/bash
# Scripted MCP server used by the test suite.
# Set RAW_LOG to record every received frame, FAIL_INIT=1 to reject the
# handshake, MARKER to give the getenv tool something to report.
while IFS= read -r line; do
    if [ -n "${RAW_LOG:-}" ]; then
        printf '%s\n' "$line" >> "$RAW_LOG"
    fi
    method=$(printf '%s' "$line" | python3 -c 'import sys,json; print(json.load(sys.stdin).get("method",""))' 2>/dev/null)
    id=$(printf '%s' "$line" | python3 -c 'import sys,json; print(json.load(sys.stdin).get("id","null"))' 2>/dev/null)
    case "$method" in
        initialize)
            if [ "${FAIL_INIT:-}" = "1" ]; then
                echo "{\"jsonrpc\":\"2.0\",\"id\":$id,\"error\":{\"code\":-32603,\"message\":\"init exploded\"}}"
            else
                echo "{\"jsonrpc\":\"2.0\",\"id\":$id,\"result\":{\"protocolVersion\":\"2024-11-05\",\"serverInfo\":{\"name\":\"mock-server\",\"version\":\"1.0\"},\"capabilities\":{\"tools\":{\"listChanged\":false},\"resources\":{\"subscribe\":false,\"listChanged\":false},\"prompts\":{\"listChanged\":false}}}}"
            fi
            ;;
        notifications/initialized) ;;
        shutdown) ;;
        tools/list)
            echo "{\"jsonrpc\":\"2.0\",\"id\":$id,\"result\":{\"tools\":[{\"name\":\"echo\",\"description\":\"Echo input\",\"inputSchema\":{\"type\":\"object\",\"properties\":{\"text\":{\"type\":\"string\"}},\"required\":[\"text\"]}},{\"name\":\"getenv\",\"description\":\"Report the MARKER variable\",\"inputSchema\":{\"type\":\"object\"}}]}}"
            ;;
        tools/call)
            tool=$(printf '%s' "$line" | python3 -c 'import sys,json; print(json.load(sys.stdin)["params"]["name"])' 2>/dev/null)
            case "$tool" in
                echo)
                    text=$(printf '%s' "$line" | python3 -c 'import sys,json; print(json.load(sys.stdin)["params"]["arguments"].get("text",""))' 2>/dev/null)
                    echo "{\"jsonrpc\":\"2.0\",\"id\":$id,\"result\":{\"content\":[{\"type\":\"text\",\"text\":\"echo: $text\"}],\"isError\":false}}"
                    ;;
                getenv)
                    echo "{\"jsonrpc\":\"2.0\",\"id\":$id,\"result\":{\"content\":[{\"type\":\"text\",\"text\":\"marker=${MARKER:-}\"}]}}"
                    ;;
                legacy)
                    echo "{\"jsonrpc\":\"2.0\",\"id\":$id,\"result\":\"hello\"}"
                    ;;
                boom)
                    echo "{\"jsonrpc\":\"2.0\",\"id\":$id,\"result\":{\"content\":[{\"type\":\"text\",\"text\":\"kaboom\"}],\"isError\":true}}"
                    ;;
                chatty)
                    echo "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/message\",\"params\":{\"level\":\"info\",\"data\":\"working\"}}"
                    echo "{\"jsonrpc\":\"2.0\",\"id\":$id,\"result\":{\"content\":[{\"type\":\"text\",\"text\":\"done\"}]}}"
                    ;;
                *)
                    echo "{\"jsonrpc\":\"2.0\",\"id\":$id,\"error\":{\"code\":-32602,\"message\":\"Invalid params\",\"data\":{\"field\":\"name\"}}}"
                    ;;
            esac
            ;;
        resources/list)
            echo "{\"jsonrpc\":\"2.0\",\"id\":$id,\"result\":{\"resources\":[{\"uri\":\"file:///tmp/demo.txt\",\"name\":\"demo\"}]}}"
            ;;
        resources/read)
            echo "{\"jsonrpc\":\"2.0\",\"id\":$id,\"result\":{\"contents\":[{\"uri\":\"file:///tmp/demo.txt\",\"text\":\"demo contents\"}]}}"
            ;;
        prompts/list)
            echo "{\"jsonrpc\":\"2.0\",\"id\":$id,\"result\":{\"prompts\":[{\"name\":\"greet\"}]}}"
            ;;
        prompts/get)
            echo "{\"jsonrpc\":\"2.0\",\"id\":$id,\"result\":{\"messages\":[{\"role\":\"user\",\"content\":{\"type\":\"text\",\"text\":\"hi\"}}]}}"
            ;;
        *)
            echo "{\"jsonrpc\":\"2.0\",\"id\":$id,\"error\":{\"code\":-32601,\"message\":\"Method not found\"}}"
            ;;
    esac
done
"#;

/// Check whether python3 is available; tests that need the mock server skip
/// themselves when it is not.
pub async fn python3_available() -> bool {
    matches!(
        tokio::process::Command::new("python3")
            .arg("--version")
            .output()
            .await,
        Ok(out) if out.status.success()
    )
}

/// Write the mock server script into `dir` and make it executable.
pub fn write_mock_server(dir: &Path) -> PathBuf {
    let path = dir.join("mock_mcp_server.sh");
    std::fs::write(&path, MOCK_SERVER_SCRIPT).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    path
}

/// A `PATH=...` env entry mirroring the parent's PATH, so the child can find
/// bash and python3 despite the cleared environment.
pub fn path_env() -> String {
    format!("PATH={}", std::env::var("PATH").unwrap_or_default())
}

/// Descriptor running the mock server script under `name`, with `extra_env`
/// appended to the minimal PATH entry.
pub fn mock_descriptor(name: &str, script: &Path, extra_env: &[String]) -> ServerDescriptor {
    let mut env = vec![path_env()];
    env.extend_from_slice(extra_env);
    ServerDescriptor {
        name: name.to_string(),
        command: "bash".to_string(),
        args: vec![script.to_string_lossy().to_string()],
        env,
        enabled: true,
        inherit_env: false,
    }
}
