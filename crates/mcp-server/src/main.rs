//! Stdio entry point for the analytics tool server.
//!
//! Transport framing belongs to the embedding agent runtime; this binary
//! speaks newline-delimited JSON: one `{"tool": ..., "params": ...}`
//! request per stdin line, one `{"result": ...}` or `{"error": ...}`
//! response per stdout line. `{"tool": "list_tools"}` returns the tool
//! descriptors.

use anyhow::Result;
use clap::Parser;
use ivr_analytics_core::{AnalyticsConfig, AnalyticsEngine, EventStore};
use ivr_analytics_mcp_server::{ToolError, ToolRouter};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ivr-analytics-mcp-server")]
#[command(about = "Tool-call server exposing IVR call analytics to an agent")]
struct Args {
    /// sqlx database URL for the event store (falls back to ANALYTICS_DB,
    /// then to the default on-disk database)
    #[arg(long)]
    database_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    tool: String,
    #[serde(default)]
    params: Value,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let database_url = args
        .database_url
        .unwrap_or_else(|| AnalyticsConfig::from_env().database_url);

    let store = EventStore::connect(&database_url).await?;
    let router = ToolRouter::new(AnalyticsEngine::new(store));
    info!("analytics tool server ready ({} tools)", ToolRouter::tools().len());

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut lines = stdin.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let response = handle_line(&router, line).await;
        stdout.write_all(response.to_string().as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    Ok(())
}

async fn handle_line(router: &ToolRouter, line: &str) -> Value {
    let call: ToolCall = match serde_json::from_str(line) {
        Ok(call) => call,
        Err(err) => {
            return json!({
                "error": { "kind": "bad_request", "message": err.to_string() }
            })
        }
    };

    if call.tool == "list_tools" {
        return json!({ "result": ToolRouter::tools() });
    }

    match router.call(&call.tool, call.params).await {
        Ok(result) => json!({ "result": result }),
        Err(err) => error_response(&err),
    }
}

fn error_response(err: &ToolError) -> Value {
    json!({
        "error": { "kind": err.kind(), "message": err.to_string() }
    })
}
