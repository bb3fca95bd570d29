//! # mindrpc
//!
//! Command-line client for MindRPC/2 devices. Settings come from
//! `~/.mindrpc/settings.json` and `MINDRPC_*` variables; flags override both.

#![deny(unsafe_code)]

mod hls;
mod shows;

use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use mindrpc_client::MindRpc;
use mindrpc_core::ExtraHeaders;
use mindrpc_settings::{MindRpcSettings, load_settings};
use serde_json::Value;
use tracing::{debug, info};

use crate::hls::HlsSource;

const RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

/// MindRPC/2 command-line client.
#[derive(Parser, Debug)]
#[command(name = "mindrpc", about = "Talk to a MindRPC/2 device", version)]
struct Cli {
    /// Device host (overrides settings).
    #[arg(long, global = true)]
    host: Option<String>,

    /// Device port (overrides settings).
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Use wss:// instead of ws://.
    #[arg(long, global = true)]
    secure: bool,

    /// Default SchemaVersion header.
    #[arg(long, global = true)]
    schema_version: Option<u32>,

    /// Log level when `RUST_LOG` is not set.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one request and print its response.
    Request {
        /// JSON payload; must contain a string `type`.
        #[arg(long)]
        body: String,
        /// Value for the ApplicationFeatureArea header.
        #[arg(long)]
        feature_area: Option<String>,
    },
    /// Send a monitoring request and print responses until the final one.
    Monitor {
        /// JSON payload; must contain a string `type`.
        #[arg(long)]
        body: String,
    },
    /// List active recordings by title.
    Shows,
    /// Print the device's TSN.
    Tsn,
    /// Open an HLS streaming session and print its playlist URL.
    Hls {
        /// Recording to stream.
        #[arg(long, conflicts_with = "channel_id", required_unless_present = "channel_id")]
        recording_id: Option<String>,
        /// Live TV channel to stream.
        #[arg(long)]
        channel_id: Option<String>,
    },
}

impl Cli {
    fn apply_to(&self, settings: &mut MindRpcSettings) {
        if let Some(host) = &self.host {
            settings.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.port = port;
        }
        if self.secure {
            settings.secure = true;
        }
        if let Some(schema_version) = self.schema_version {
            settings.schema_version = schema_version;
        }
    }
}

fn parse_body(body: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(body).context("--body is not valid JSON")?;
    if value.get("type").and_then(Value::as_str).is_none() {
        bail!("--body must be a JSON object with a string `type`");
    }
    Ok(value)
}

async fn call(rpc: &MindRpc, payload: Value, extra: ExtraHeaders) -> Result<Value> {
    tokio::time::timeout(RESPONSE_TIMEOUT, rpc.call(payload, extra))
        .await
        .context("timed out waiting for response")?
        .context("request failed")
}

async fn run(cli: Cli, rpc: &MindRpc) -> Result<()> {
    match cli.command {
        Command::Request { body, feature_area } => {
            let extra = feature_area.map(ExtraHeaders::from).unwrap_or_default();
            let response = call(rpc, parse_body(&body)?, extra).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Monitor { body } => {
            let (rpc_id, mut responses) = rpc
                .monitor(parse_body(&body)?, ExtraHeaders::new())
                .context("request failed")?;
            debug!(rpc_id, "monitoring");
            loop {
                tokio::select! {
                    next = responses.recv() => {
                        let Some(response) = next else { break };
                        println!("{}", serde_json::to_string(&response)?);
                    }
                    _ = tokio::signal::ctrl_c() => {
                        rpc.cancel_request(rpc_id, ExtraHeaders::new());
                        break;
                    }
                }
            }
        }
        Command::Shows => {
            let response = call(rpc, shows::my_shows_request(), ExtraHeaders::new()).await?;
            for title in shows::show_titles(&response) {
                println!("{title}");
            }
        }
        Command::Tsn => {
            let response = call(rpc, shows::body_config_request(), ExtraHeaders::new()).await?;
            let tsn = shows::tsn(&response).context("response carries no bodyId")?;
            println!("{tsn}");
        }
        Command::Hls {
            recording_id,
            channel_id,
        } => {
            let source = HlsSource::from_ids(recording_id, channel_id)
                .context("one of --recording-id or --channel-id is required")?;
            hls_session(rpc, &source).await?;
        }
    }
    Ok(())
}

/// Wait on a streaming session request until its final response, then
/// print the playlist URL.
async fn hls_session(rpc: &MindRpc, source: &HlsSource) -> Result<()> {
    let (rpc_id, mut responses) = rpc
        .monitor(hls::session_request(source), ExtraHeaders::new())
        .context("request failed")?;
    debug!(rpc_id, ?source, "streaming session requested");

    let deadline = tokio::time::sleep(RESPONSE_TIMEOUT);
    tokio::pin!(deadline);
    let response = loop {
        tokio::select! {
            next = responses.recv() => {
                let Some(response) = next else {
                    bail!("connection lost before the streaming session was ready");
                };
                if response.is_final {
                    break response;
                }
                info!(rpc_id, body = ?response.body, "non-final session response");
            }
            () = &mut deadline => {
                rpc.cancel_request(rpc_id, ExtraHeaders::new());
                bail!("timed out waiting for the streaming session");
            }
            _ = tokio::signal::ctrl_c() => {
                rpc.cancel_request(rpc_id, ExtraHeaders::new());
                return Ok(());
            }
        }
    };

    let body = response.body.unwrap_or(Value::Null);
    let uri = hls::playlist_uri(&body)?;
    println!("{}", hls::playlist_url(&rpc.settings().host, uri));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    mindrpc_core::logging::init_subscriber(&cli.log_level);

    let mut settings = load_settings().context("failed to load settings")?;
    cli.apply_to(&mut settings);
    settings.validate().context("invalid settings")?;

    let rpc = MindRpc::new(settings);
    let rpc = rpc
        .start()
        .await
        .with_context(|| format!("failed to connect to {}", rpc.url()))?;

    let result = run(cli, &rpc).await;
    rpc.stop();
    result
}
