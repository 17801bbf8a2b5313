use std::{env, fs, path::Path};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

const DEFAULT_CONFIG_PATH: &str = "gateway.toml";
const DEFAULT_PORT: u16 = 8000;

/// Process-wide settings. Built once at startup; environment variables take
/// precedence over the optional TOML file.
#[derive(Debug, Clone)]
pub struct Config {
    pub grafana_host: String,
    pub grafana_api_key: String,
    pub ssl_verify: bool,
    pub port: u16,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    grafana: GrafanaSection,
    #[serde(default)]
    server: ServerSection,
}

#[derive(Debug, Default, Deserialize)]
struct GrafanaSection {
    host: Option<String>,
    api_key: Option<String>,
    ssl_verify: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSection {
    port: Option<u16>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = env::var("GRAFANA_MCP_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        let file = load_file(Path::new(&path));
        Self::from_sources(file)
    }

    fn from_sources(file: FileConfig) -> Result<Self> {
        let grafana_host = env::var("GRAFANA_HOST")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or(file.grafana.host)
            .context("Grafana host is not configured; set GRAFANA_HOST or [grafana] host")?;
        let grafana_host = grafana_host.trim().trim_end_matches('/').to_string();

        let grafana_api_key = env::var("GRAFANA_API_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or(file.grafana.api_key)
            .context("Grafana API key is not configured; set GRAFANA_API_KEY or [grafana] api_key")?
            .trim()
            .to_string();

        let ssl_verify = env::var("GRAFANA_SSL_VERIFY")
            .ok()
            .or(file.grafana.ssl_verify)
            .map(|v| parse_bool(&v))
            .unwrap_or(true);

        let port = env::var("MCP_SERVER_PORT")
            .ok()
            .and_then(|v| v.trim().parse::<u16>().ok())
            .or(file.server.port)
            .unwrap_or(DEFAULT_PORT);

        info!(host = %grafana_host, ssl_verify, port, "loaded gateway configuration");

        Ok(Self {
            grafana_host,
            grafana_api_key,
            ssl_verify,
            port,
        })
    }
}

fn load_file(path: &Path) -> FileConfig {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(_) => return FileConfig::default(),
    };
    match toml::from_str(&raw) {
        Ok(parsed) => {
            info!(path = %path.display(), "loaded config file");
            parsed
        }
        Err(err) => {
            warn!(path = %path.display(), %err, "ignoring unparsable config file");
            FileConfig::default()
        }
    }
}

fn parse_bool(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

#[cfg(test)]
mod tests {
    use super::{parse_bool, FileConfig};

    #[test]
    fn bool_parsing_defaults_to_true() {
        assert!(parse_bool("true"));
        assert!(parse_bool("1"));
        assert!(parse_bool("anything"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("FALSE"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("no"));
        assert!(!parse_bool(" off "));
    }

    #[test]
    fn file_sections_are_optional() {
        let parsed: FileConfig = toml::from_str("").unwrap();
        assert!(parsed.grafana.host.is_none());
        assert!(parsed.server.port.is_none());

        let parsed: FileConfig = toml::from_str(
            r#"
            [grafana]
            host = "https://grafana.example.com/"
            api_key = "glsa_key"
            ssl_verify = "false"

            [server]
            port = 9000
            "#,
        )
        .unwrap();
        assert_eq!(
            parsed.grafana.host.as_deref(),
            Some("https://grafana.example.com/")
        );
        assert_eq!(parsed.server.port, Some(9000));
    }
}
