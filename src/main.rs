use std::{env, net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use grafana_mcp_gateway::{api, config::Config, grafana::GrafanaClient, stdio, AppState};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TransportKind {
    Http,
    Stdio,
}

#[derive(Debug, Parser)]
#[command(name = "grafana-mcp-gateway", version, about = "MCP gateway for the Grafana HTTP API")]
struct Cli {
    /// Transport to serve on; overrides the MCP_TRANSPORT env var.
    #[arg(short = 't', long, value_enum)]
    transport: Option<TransportKind>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stderr keeps stdout free for the stdio transport.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "grafana_mcp_gateway=info,tower_http=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    let client = Arc::new(GrafanaClient::new(
        &config.grafana_host,
        &config.grafana_api_key,
        config.ssl_verify,
    )?);
    let state = AppState {
        config: config.clone(),
        client,
    };

    match resolve_transport(cli.transport) {
        TransportKind::Stdio => stdio::run(state).await,
        TransportKind::Http => {
            let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;
            info!("grafana-mcp-gateway listening on {addr}");
            axum::serve(listener, api::router(state)).await?;
            Ok(())
        }
    }
}

fn resolve_transport(flag: Option<TransportKind>) -> TransportKind {
    if let Some(kind) = flag {
        return kind;
    }
    match env::var("MCP_TRANSPORT").as_deref() {
        Ok("stdio") => TransportKind::Stdio,
        _ => TransportKind::Http,
    }
}
