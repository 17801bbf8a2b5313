pub mod api;
pub mod catalog;
pub mod config;
pub mod grafana;
pub mod mcp;
pub mod models;
pub mod shaping;
pub mod stdio;
pub mod timerange;

use std::sync::Arc;

use config::Config;
use grafana::GrafanaClient;

/// Shared per-process state: the loaded configuration and the Grafana
/// client with its immutable connection identity. Read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub client: Arc<GrafanaClient>,
}
