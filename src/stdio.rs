//! Line-oriented stream transport: one JSON envelope per line on stdin, one
//! reply per line on stdout. Logs go to stderr so stdout stays clean.

use anyhow::Result;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

use crate::{mcp, models::parse_error_reply, AppState};

pub async fn run(state: AppState) -> Result<()> {
    info!("serving MCP over stdio");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<Value>(line) {
            Ok(raw) => mcp::dispatch(&state, raw).await,
            Err(_) => parse_error_reply(),
        };

        let mut out = serde_json::to_vec(&reply)?;
        out.push(b'\n');
        stdout.write_all(&out).await?;
        stdout.flush().await?;
    }

    info!("stdin closed, shutting down");
    Ok(())
}
