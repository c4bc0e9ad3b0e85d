//! Stdio transport for MCP servers.
//!
//! Owns one child process and frames JSON-RPC messages over its stdin and
//! stdout: one JSON value per line, UTF-8, terminated by a single `\n`.
//! Stderr is drained line-by-line into the log sink by a background task.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio_util::sync::CancellationToken;

use crate::config::ServerDescriptor;
use crate::error::McpError;
use crate::protocol::RpcEnvelope;

/// Grace period for the child to exit after stdin is closed; after this the
/// child is force-terminated.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Transport over a child process's stdio.
///
/// Not internally multi-reader: frames are delivered in order to the single
/// consumer holding the transport. The session client serializes access, so
/// sends never interleave.
pub struct StdioTransport {
    server_name: String,
    command: String,
    args: Vec<String>,
    env: Vec<String>,
    inherit_env: bool,
    child: Option<Child>,
    stdin: Option<BufWriter<ChildStdin>>,
    stdout: Option<BufReader<ChildStdout>>,
    closed: bool,
}

impl StdioTransport {
    /// Create a transport for the given descriptor. The child process is not
    /// launched until [`start`](Self::start).
    pub fn new(descriptor: &ServerDescriptor) -> Self {
        Self {
            server_name: descriptor.name.clone(),
            command: descriptor.command.clone(),
            args: descriptor.args.clone(),
            env: descriptor.env.clone(),
            inherit_env: descriptor.inherit_env,
            child: None,
            stdin: None,
            stdout: None,
            closed: false,
        }
    }

    /// Launch the server process and the stderr drain task.
    pub fn start(&mut self) -> Result<(), McpError> {
        if self.closed {
            return Err(McpError::TransportClosed);
        }
        if self.child.is_some() {
            return Ok(());
        }

        tracing::info!(
            target: "mcp.transport",
            server = %self.server_name,
            command = %self.command,
            "starting MCP server process"
        );

        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args);

        // The parent environment is not passed on unless the descriptor
        // opts in; credentials must be listed explicitly.
        if !self.inherit_env {
            cmd.env_clear();
        }
        for entry in &self.env {
            match entry.split_once('=') {
                Some((key, value)) => {
                    cmd.env(key, value);
                }
                None => {
                    tracing::warn!(
                        target: "mcp.transport",
                        server = %self.server_name,
                        entry = %entry,
                        "skipping env entry without '='"
                    );
                }
            }
        }

        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        // Detach from our process group so terminal signals don't reach the
        // server directly; shutdown goes through close().
        #[cfg(unix)]
        unsafe {
            cmd.pre_exec(|| {
                libc::setsid();
                Ok(())
            });
        }

        let mut child = cmd.spawn().map_err(|e| McpError::SpawnFailed {
            server: self.server_name.clone(),
            source: e,
        })?;

        let stdin = child.stdin.take().ok_or_else(|| McpError::SpawnFailed {
            server: self.server_name.clone(),
            source: std::io::Error::other("failed to capture stdin"),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| McpError::SpawnFailed {
            server: self.server_name.clone(),
            source: std::io::Error::other("failed to capture stdout"),
        })?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(drain_stderr(self.server_name.clone(), stderr));
        }

        self.stdin = Some(BufWriter::new(stdin));
        self.stdout = Some(BufReader::new(stdout));
        self.child = Some(child);

        Ok(())
    }

    /// Serialize one envelope and write it as a single frame.
    pub async fn send(&mut self, envelope: &RpcEnvelope) -> Result<(), McpError> {
        if self.closed {
            return Err(McpError::TransportClosed);
        }
        let writer = self.stdin.as_mut().ok_or(McpError::TransportClosed)?;

        let line = envelope.encode()?;
        tracing::debug!(
            target: "mcp.transport",
            server = %self.server_name,
            frame = %line,
            "sending frame"
        );

        writer
            .write_all(line.as_bytes())
            .await
            .map_err(McpError::WriteFailed)?;
        writer.write_all(b"\n").await.map_err(McpError::WriteFailed)?;
        writer.flush().await.map_err(McpError::WriteFailed)?;
        Ok(())
    }

    /// Read and decode the next frame. Blank lines are skipped. Returns
    /// [`McpError::Cancelled`] when the caller's token fires, and
    /// [`McpError::TransportClosed`] when the server closes its stdout.
    pub async fn receive(&mut self, cancel: &CancellationToken) -> Result<RpcEnvelope, McpError> {
        if self.closed {
            return Err(McpError::TransportClosed);
        }
        let reader = self.stdout.as_mut().ok_or(McpError::TransportClosed)?;

        let mut line = String::new();
        loop {
            line.clear();
            let read = tokio::select! {
                _ = cancel.cancelled() => return Err(McpError::Cancelled),
                read = reader.read_line(&mut line) => read.map_err(McpError::ReadFailed)?,
            };
            if read == 0 {
                return Err(McpError::TransportClosed);
            }

            let frame = line.trim_end();
            if frame.is_empty() {
                continue;
            }

            tracing::debug!(
                target: "mcp.transport",
                server = %self.server_name,
                frame = %frame,
                "received frame"
            );
            return RpcEnvelope::decode(frame);
        }
    }

    /// Close the transport and reap the server process. Idempotent.
    ///
    /// Stdin is closed first, signalling orderly shutdown to the child; the
    /// child then gets [`CLOSE_GRACE`] to exit before being killed. The exit
    /// status is logged, never surfaced.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        tracing::info!(
            target: "mcp.transport",
            server = %self.server_name,
            "closing transport"
        );

        if let Some(mut stdin) = self.stdin.take() {
            let _ = stdin.shutdown().await;
        }
        self.stdout.take();

        if let Some(mut child) = self.child.take() {
            match tokio::time::timeout(CLOSE_GRACE, child.wait()).await {
                Ok(Ok(status)) if status.success() => {
                    tracing::info!(
                        target: "mcp.transport",
                        server = %self.server_name,
                        "server exited cleanly"
                    );
                }
                Ok(Ok(status)) => {
                    tracing::warn!(
                        target: "mcp.transport",
                        server = %self.server_name,
                        status = %status,
                        "server exited with nonzero status"
                    );
                }
                Ok(Err(e)) => {
                    tracing::warn!(
                        target: "mcp.transport",
                        server = %self.server_name,
                        error = %e,
                        "failed waiting for server exit"
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        target: "mcp.transport",
                        server = %self.server_name,
                        grace = ?CLOSE_GRACE,
                        "server did not exit within grace period, killing"
                    );
                    let _ = child.kill().await;
                }
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Forward the child's stderr to the log sink, one line at a time, until EOF.
async fn drain_stderr(server_name: String, stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                tracing::debug!(
                    target: "mcp.transport",
                    server = %server_name,
                    "server stderr: {line}"
                );
            }
            Ok(None) => break,
            Err(e) => {
                tracing::error!(
                    target: "mcp.transport",
                    server = %server_name,
                    error = %e,
                    "error reading server stderr"
                );
                break;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(command: &str, args: &[&str]) -> ServerDescriptor {
        ServerDescriptor {
            name: "test".to_string(),
            command: command.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            env: vec![format!(
                "PATH={}",
                std::env::var("PATH").unwrap_or_default()
            )],
            enabled: true,
            inherit_env: false,
        }
    }

    #[tokio::test]
    async fn test_send_before_start_fails() {
        let mut transport = StdioTransport::new(&descriptor("true", &[]));
        let req = RpcEnvelope::Request(crate::protocol::JsonRpcRequest::new(1, "ping", None));
        let err = transport.send(&req).await.unwrap_err();
        assert!(matches!(err, McpError::TransportClosed));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let mut transport =
            StdioTransport::new(&descriptor("__nonexistent_mcp_server_binary_12345__", &[]));
        let err = transport.start().unwrap_err();
        match err {
            McpError::SpawnFailed { server, .. } => assert_eq!(server, "test"),
            other => panic!("expected SpawnFailed, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_close_is_idempotent() {
        // cat exits when its stdin reaches EOF, so close() reaps it quickly.
        let mut transport = StdioTransport::new(&descriptor("cat", &[]));
        transport.start().unwrap();
        assert!(!transport.is_closed());

        transport.close().await;
        assert!(transport.is_closed());
        transport.close().await;
        assert!(transport.is_closed());

        let req = RpcEnvelope::Request(crate::protocol::JsonRpcRequest::new(1, "ping", None));
        let err = transport.send(&req).await.unwrap_err();
        assert!(matches!(err, McpError::TransportClosed));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_receive_eof_is_transport_closed() {
        let mut transport = StdioTransport::new(&descriptor("sh", &["-c", "exit 0"]));
        transport.start().unwrap();

        let cancel = CancellationToken::new();
        let err = transport.receive(&cancel).await.unwrap_err();
        assert!(matches!(err, McpError::TransportClosed));
        transport.close().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_receive_malformed_frame_is_decode_failed() {
        let mut transport = StdioTransport::new(&descriptor(
            "sh",
            &["-c", "echo 'not json'; cat >/dev/null"],
        ));
        transport.start().unwrap();

        let cancel = CancellationToken::new();
        let err = transport.receive(&cancel).await.unwrap_err();
        assert!(matches!(err, McpError::DecodeFailed(_)));
        transport.close().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_receive_skips_blank_lines() {
        let mut transport = StdioTransport::new(&descriptor(
            "sh",
            &[
                "-c",
                r#"printf '\n\n{"jsonrpc":"2.0","id":1,"result":null}\n'; cat >/dev/null"#,
            ],
        ));
        transport.start().unwrap();

        let cancel = CancellationToken::new();
        let envelope = transport.receive(&cancel).await.unwrap();
        assert!(matches!(envelope, RpcEnvelope::Response(_)));
        transport.close().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_receive_cancelled() {
        // The server reads stdin and never writes, so only cancellation can
        // end the receive; it exits promptly once close() drops stdin.
        let mut transport =
            StdioTransport::new(&descriptor("sh", &["-c", "while read line; do :; done"]));
        transport.start().unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = transport.receive(&cancel).await.unwrap_err();
        assert!(matches!(err, McpError::Cancelled));
        transport.close().await;
    }
}
