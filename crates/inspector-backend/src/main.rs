//! inspector-client: a one-shot protocol client.
//!
//! Loads a protocol description, connects to a remote end over WebSocket,
//! sends one command and prints its result.  Optionally keeps the session
//! open for a while and logs every event the remote end sends.
//!
//! # Usage
//!
//! ```text
//! inspector-client [OPTIONS]
//!
//! Options:
//!   --ws-url      <URL>    Remote end WebSocket URL [default: ws://127.0.0.1:9222]
//!   --protocol    <FILE>   Protocol description (JSON)
//!   --config      <FILE>   Options file (TOML) [default: inspector.toml]
//!   --method      <NAME>   Command to send, e.g. Runtime.evaluate
//!   --params      <JSON>   Parameter object for the command
//!   --listen-secs <SECS>   Log events for this long before exiting [default: 0]
//!   --dump-messages        Log every message sent and received
//!   --time-stats           Log response and event dispatch timings
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable                | Default               | Description             |
//! |-------------------------|-----------------------|-------------------------|
//! | `INSPECTOR_WS_URL`      | `ws://127.0.0.1:9222` | Remote end URL          |
//! | `INSPECTOR_PROTOCOL`    | (none)                | Protocol description    |
//! | `INSPECTOR_CONFIG`      | `inspector.toml`      | Options file            |
//! | `INSPECTOR_LISTEN_SECS` | `0`                   | Event logging window    |
//!
//! Flags given on the command line switch the matching option on even when
//! the options file leaves it off.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use inspector_core::{split_method, EventArgs, SchemaRegistry};
use serde_json::{Map, Value};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use inspector_backend::application::{EventHandler, Target};
use inspector_backend::domain::{BackendOptions, ProtocolResponse};
use inspector_backend::infrastructure::WebSocketConnection;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// One-shot client for the inspector remote protocol.
#[derive(Debug, Parser)]
#[command(
    name = "inspector-client",
    about = "Sends one command to a remote-debugging endpoint and prints the result",
    version
)]
struct Cli {
    /// WebSocket URL of the remote end.
    #[arg(long, default_value = "ws://127.0.0.1:9222", env = "INSPECTOR_WS_URL")]
    ws_url: String,

    /// Protocol description to load before connecting.
    ///
    /// Without one, no command is validated and no event can be routed.
    #[arg(long, env = "INSPECTOR_PROTOCOL")]
    protocol: Option<PathBuf>,

    /// Options file.  A missing file means default options.
    #[arg(long, default_value = "inspector.toml", env = "INSPECTOR_CONFIG")]
    config: PathBuf,

    /// Fully-qualified command to send (`Domain.method`).
    #[arg(long, env = "INSPECTOR_METHOD")]
    method: Option<String>,

    /// JSON object with the command's parameters.
    #[arg(long, env = "INSPECTOR_PARAMS")]
    params: Option<String>,

    /// Seconds to keep the session open and log events.
    #[arg(long, default_value_t = 0, env = "INSPECTOR_LISTEN_SECS")]
    listen_secs: u64,

    /// Log every message sent and received.
    #[arg(long)]
    dump_messages: bool,

    /// Log response and event dispatch timings.
    #[arg(long)]
    time_stats: bool,
}

/// Everything the client needs, resolved from flags and files.
#[derive(Debug)]
struct ClientConfig {
    ws_url: String,
    registry: SchemaRegistry,
    options: BackendOptions,
    method: Option<String>,
    params: Option<Map<String, Value>>,
    listen: Duration,
}

impl Cli {
    /// Resolves the parsed arguments into a [`ClientConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the options file or protocol description cannot
    /// be read or parsed, if `--params` is not a JSON object, or if
    /// `--method` is not of the form `Domain.method`.
    fn into_client_config(self) -> anyhow::Result<ClientConfig> {
        let mut options = BackendOptions::load(&self.config)
            .with_context(|| format!("failed to load options from {}", self.config.display()))?;
        options.dump_protocol_messages |= self.dump_messages;
        options.dump_time_stats |= self.time_stats;

        let mut registry = SchemaRegistry::new();
        if let Some(path) = &self.protocol {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read protocol description {}", path.display()))?;
            registry
                .load_protocol_json(&text)
                .with_context(|| format!("invalid protocol description {}", path.display()))?;
        }

        if let Some(method) = &self.method {
            let (domain, name) = split_method(method);
            if domain.is_empty() || name.is_empty() {
                bail!("--method must look like Domain.method, got '{method}'");
            }
        }

        let params = match &self.params {
            None => None,
            Some(text) => {
                let value: Value = serde_json::from_str(text)
                    .with_context(|| format!("--params is not valid JSON: {text}"))?;
                match value {
                    Value::Object(object) => Some(object),
                    other => bail!("--params must be a JSON object, got {other}"),
                }
            }
        };

        Ok(ClientConfig {
            ws_url: self.ws_url,
            registry,
            options,
            method: self.method,
            params,
            listen: Duration::from_secs(self.listen_secs),
        })
    }
}

// ── Event logging ─────────────────────────────────────────────────────────────

/// Logs every event of one domain.
struct EventLogger {
    domain: String,
}

impl EventHandler for EventLogger {
    fn responds_to(&self, _event: &str) -> bool {
        true
    }

    fn handle_event(&self, event: &str, args: &EventArgs) {
        let args = Value::Array(args.iter().map(|arg| arg.cloned().unwrap_or(Value::Null)).collect());
        info!(domain = %self.domain, "{event} {args}");
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// # What happens at startup
///
/// 1. CLI arguments are parsed and resolved into a [`ClientConfig`].
/// 2. `tracing_subscriber` is initialised; `RUST_LOG` wins over the options
///    file's `log_level`.
/// 3. A [`Target`] connects over WebSocket.
/// 4. The command is sent and its result printed as pretty JSON.
/// 5. With `--listen-secs`, events are logged until the window closes or
///    Ctrl+C is pressed.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_client_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.options.log_level)),
        )
        .init();

    let ClientConfig {
        ws_url,
        registry,
        options,
        method,
        params,
        listen,
    } = config;

    let registry = Arc::new(registry);
    let target = Target::connect(
        Arc::clone(&registry),
        options,
        false,
        WebSocketConnection::factory(ws_url.as_str()),
    )
    .await
    .with_context(|| format!("failed to connect to {ws_url}"))?;
    info!("connected to {ws_url}");

    if !listen.is_zero() {
        for domain in registry.dispatcher_domains() {
            target.register_dispatcher(
                domain,
                Arc::new(EventLogger {
                    domain: domain.to_string(),
                }),
            );
        }
    }

    if let Some(method) = method {
        match send_command(&target, &method, params).await {
            ProtocolResponse::Success(result) => {
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
            ProtocolResponse::Failure { message, data } => {
                error!("{method} failed: {message}");
                if let Some(data) = data {
                    error!("error data: {data}");
                }
            }
        }
    }

    if !listen.is_zero() {
        info!("listening for events for {}s", listen.as_secs());
        tokio::select! {
            _ = tokio::time::sleep(listen) => {}
            _ = tokio::signal::ctrl_c() => info!("received Ctrl+C, shutting down"),
        }
    }

    target.disconnect().await;
    info!("inspector-client stopped");
    Ok(())
}

/// Sends `method` through its agent when the protocol declares it, and
/// unchecked otherwise.
async fn send_command(
    target: &Target,
    method: &str,
    params: Option<Map<String, Value>>,
) -> ProtocolResponse {
    let (domain, name) = split_method(method);
    if let Some(agent) = target.agent(domain).filter(|agent| agent.has_command(name)) {
        return agent.invoke(name, params).await;
    }

    warn!("{method} is not declared by the protocol description, sending unchecked");
    match target.send_raw_message_for_testing(method, params).await {
        Ok(result) => ProtocolResponse::Success(result),
        Err(e) => {
            let wire = e.to_response_error();
            ProtocolResponse::Failure {
                message: wire.message,
                data: wire.data,
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
