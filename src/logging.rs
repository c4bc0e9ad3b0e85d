//! Tracing setup for hosts embedding the MCP subsystem.
//!
//! Sets up logging to stderr (stdout may be piped to whatever the host
//! does with it) with environment-based filtering via `RUST_LOG`. Set
//! `LOG_FORMAT=json` for structured JSON output.
//!
//! The subsystem itself only emits `tracing` events under the
//! `mcp.transport`, `mcp.client` and `mcp.manager` targets; hosts with
//! their own subscriber can skip this entirely.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a stderr subscriber. Defaults to `info` when `RUST_LOG` is unset.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);

    if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .init();
    }
}
