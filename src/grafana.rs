use std::{collections::HashMap, time::Duration};

use anyhow::Result;
use reqwest::{header, StatusCode};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::{shaping, timerange};

const READ_TIMEOUT: Duration = Duration::from_secs(20);
const QUERY_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_PANELS_PER_CALL: usize = 4;
const SECRET_MASK: &str = "***";

#[derive(Debug, Error)]
pub enum GrafanaError {
    #[error("{context}. Status: {status}, Response: {body}")]
    Status {
        context: String,
        status: u16,
        body: String,
    },
    #[error("{context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{0}")]
    Validation(String),
}

/// Grafana API client. Holds the immutable connection identity (host,
/// bearer credential, TLS policy) shared read-only across requests.
#[derive(Debug)]
pub struct GrafanaClient {
    host: String,
    api_key: String,
    http: reqwest::Client,
}

impl GrafanaClient {
    pub fn new(host: &str, api_key: &str, ssl_verify: bool) -> Result<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(!ssl_verify)
            .build()?;
        Ok(Self {
            host: host.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Probes `/api/datasources` to verify configuration and connectivity.
    pub async fn test_connection(&self) -> Result<Value, GrafanaError> {
        let url = format!("{}/api/datasources", self.host);
        info!(url = %url, "testing Grafana connection");
        self.get(&url, &[], "Failed to connect with Grafana").await?;
        Ok(json!({
            "status": "success",
            "message": "Successfully connected to Grafana API",
            "auth_method": "api_key",
            "host": self.host,
        }))
    }

    /// Executes one PromQL query over a resolved time range (default window
    /// 3h) and downsamples the returned series.
    pub async fn promql_query(
        &self,
        datasource_uid: &str,
        query: &str,
        start_time: Option<&str>,
        end_time: Option<&str>,
        duration: Option<&str>,
    ) -> Result<Value, GrafanaError> {
        let (start_dt, end_dt) = timerange::resolve_time_range(start_time, end_time, duration, 3);

        let payload = json!({
            "queries": [{
                "refId": "A",
                "expr": query,
                "editorMode": "code",
                "legendFormat": "__auto",
                "range": true,
                "exemplar": false,
                "requestId": "A",
                "utcOffsetSec": 0,
                "scopes": [],
                "adhocFilters": [],
                "interval": "",
                "datasource": {"type": "prometheus", "uid": datasource_uid},
                "intervalMs": 30000,
                "maxDataPoints": 1000,
            }],
            "from": start_dt.timestamp_millis().to_string(),
            "to": end_dt.timestamp_millis().to_string(),
        });

        let url = format!("{}/api/ds/query", self.host);
        info!(query, start = %start_dt.to_rfc3339(), end = %end_dt.to_rfc3339(), "executing PromQL query");

        let mut data = self.post(&url, &payload, "PromQL query failed").await?;
        shaping::downsample_time_series(&mut data);

        Ok(json!({
            "status": "success",
            "query": query,
            "start_time": start_dt.to_rfc3339(),
            "end_time": end_dt.to_rfc3339(),
            "duration": duration,
            "results": data,
        }))
    }

    /// Queries a Loki datasource for log lines (default window 1h). The
    /// backend payload is passed through unmodified.
    pub async fn loki_query(
        &self,
        datasource_uid: &str,
        query: &str,
        duration: Option<&str>,
        start_time: Option<&str>,
        end_time: Option<&str>,
        limit: u32,
    ) -> Result<Value, GrafanaError> {
        let (start_dt, end_dt) = timerange::resolve_time_range(start_time, end_time, duration, 1);

        let payload = json!({
            "queries": [{
                "refId": "A",
                "expr": query,
                "datasource": {"type": "loki", "uid": datasource_uid},
                "maxLines": limit,
            }],
            "from": start_dt.timestamp_millis().to_string(),
            "to": end_dt.timestamp_millis().to_string(),
        });

        let url = format!("{}/api/ds/query", self.host);
        info!(query, start = %start_dt.to_rfc3339(), end = %end_dt.to_rfc3339(), "executing Loki query");

        let data = self.post(&url, &payload, "Loki query failed").await?;

        Ok(json!({
            "status": "success",
            "query": query,
            "start_time": start_dt.to_rfc3339(),
            "end_time": end_dt.to_rfc3339(),
            "duration": duration,
            "limit": limit,
            "results": data,
        }))
    }

    /// Returns a dashboard's definition and metadata verbatim.
    pub async fn get_dashboard_config(&self, dashboard_uid: &str) -> Result<Value, GrafanaError> {
        let url = format!("{}/api/dashboards/uid/{}", self.host, dashboard_uid);
        info!(dashboard_uid, "fetching dashboard config");

        let payload = self
            .get(&url, &[], "Failed to fetch dashboard config")
            .await?;

        Ok(json!({
            "status": "success",
            "dashboard_uid": dashboard_uid,
            "dashboard": payload.get("dashboard").cloned().unwrap_or_else(|| json!({})),
            "meta": payload.get("meta").cloned().unwrap_or_else(|| json!({})),
        }))
    }

    /// Executes the first query target of up to 4 dashboard panels. The cap
    /// is enforced before any backend fetch; per-panel failures surface as
    /// error results inside the aggregate, not as a raised failure.
    pub async fn query_dashboard_panels(
        &self,
        dashboard_uid: &str,
        panel_ids: &[i64],
        template_variables: &HashMap<String, String>,
    ) -> Result<Value, GrafanaError> {
        if panel_ids.len() > MAX_PANELS_PER_CALL {
            return Err(GrafanaError::Validation(
                "Maximum 4 panels can be queried at once".to_string(),
            ));
        }

        info!(dashboard_uid, ?panel_ids, "querying dashboard panels");

        let url = format!("{}/api/dashboards/uid/{}", self.host, dashboard_uid);
        let payload = self.get(&url, &[], "Failed to fetch dashboard").await?;
        let dashboard = payload.get("dashboard").cloned().unwrap_or_else(|| json!({}));

        let panels = shaping::flatten_panels(&dashboard);
        info!(count = panels.len(), "found panels in dashboard");

        let matched: Vec<&Value> = panels
            .iter()
            .filter(|panel| {
                panel
                    .get("id")
                    .and_then(Value::as_i64)
                    .map(|id| panel_ids.contains(&id))
                    .unwrap_or(false)
            })
            .collect();

        if matched.is_empty() {
            warn!(?panel_ids, "no panels matched the requested ids");
            return Err(GrafanaError::Validation(format!(
                "No panels found with IDs: {panel_ids:?}"
            )));
        }

        let mut results = Vec::new();
        for panel in matched {
            let data = self.execute_panel_query(panel, template_variables).await;
            results.push(json!({
                "panel_id": panel.get("id"),
                "title": panel.get("title"),
                "type": panel.get("type"),
                "data": data,
            }));
        }

        Ok(json!({
            "status": "success",
            "dashboard_uid": dashboard_uid,
            "panel_ids": panel_ids,
            "template_variables": template_variables,
            "results": results,
        }))
    }

    async fn execute_panel_query(
        &self,
        panel: &Value,
        template_variables: &HashMap<String, String>,
    ) -> Value {
        let target = match shaping::resolve_panel_target(panel, template_variables) {
            Ok(target) => target,
            Err(message) => {
                warn!(title = ?panel.get("title"), %message, "panel target resolution failed");
                return json!({"status": "error", "message": message});
            }
        };

        match self
            .promql_query(&target.datasource_uid, &target.expr, None, None, Some("1h"))
            .await
        {
            Ok(result) => result,
            Err(err) => json!({"status": "error", "message": err.to_string()}),
        }
    }

    /// Fetches available values for one Prometheus label, with an optional
    /// `match[]` metric filter.
    pub async fn fetch_label_values(
        &self,
        datasource_uid: &str,
        label_name: &str,
        metric_match_filter: Option<&str>,
    ) -> Result<Value, GrafanaError> {
        let url = format!(
            "{}/api/datasources/proxy/uid/{}/api/v1/label/{}/values",
            self.host, datasource_uid, label_name
        );
        let mut params = Vec::new();
        if let Some(filter) = metric_match_filter {
            params.push(("match[]", filter.to_string()));
        }

        info!(label_name, "fetching label values");

        let payload = self
            .get(
                &url,
                &params,
                &format!("Failed to fetch label values for {label_name}"),
            )
            .await?;

        // Proxy responses carry a plain `data` array; query-shaped payloads
        // fall back to frame-schema label extraction.
        let values = match payload.get("data").and_then(Value::as_array) {
            Some(values) => values.clone(),
            None => shaping::extract_label_values(&payload, label_name)
                .into_iter()
                .map(Value::String)
                .collect(),
        };

        Ok(json!({
            "status": "success",
            "datasource_uid": datasource_uid,
            "label_name": label_name,
            "metric_match_filter": metric_match_filter,
            "values": values,
        }))
    }

    /// Projects a dashboard's templating variables.
    pub async fn fetch_dashboard_variables(
        &self,
        dashboard_uid: &str,
    ) -> Result<Value, GrafanaError> {
        let url = format!("{}/api/dashboards/uid/{}", self.host, dashboard_uid);
        info!(dashboard_uid, "fetching dashboard variables");

        let payload = self
            .get(&url, &[], "Failed to fetch dashboard variables")
            .await?;

        let variables: Vec<Value> = payload
            .get("dashboard")
            .and_then(|dashboard| dashboard.get("templating"))
            .and_then(|templating| templating.get("list"))
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .map(|var| {
                        json!({
                            "name": var.get("name"),
                            "type": var.get("type"),
                            "current_value": var.get("current").and_then(|c| c.get("value")),
                            "options": var.get("options").cloned().unwrap_or_else(|| json!([])),
                            "query": var.get("query"),
                            "definition": var.get("definition"),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(json!({
            "status": "success",
            "dashboard_uid": dashboard_uid,
            "variables": variables,
        }))
    }

    /// Lists dashboards via the search endpoint.
    pub async fn fetch_all_dashboards(&self, limit: u32) -> Result<Value, GrafanaError> {
        let url = format!("{}/api/search", self.host);
        info!(limit, "fetching all dashboards");

        let payload = self
            .get(
                &url,
                &[("limit", limit.to_string())],
                "Failed to fetch dashboards",
            )
            .await?;

        let dashboards: Vec<Value> = payload
            .as_array()
            .map(|hits| {
                hits.iter()
                    .map(|hit| {
                        json!({
                            "uid": hit.get("uid"),
                            "title": hit.get("title"),
                            "type": hit.get("type"),
                            "url": hit.get("url"),
                            "folder_title": hit.get("folderTitle"),
                            "folder_uid": hit.get("folderUid"),
                            "tags": hit.get("tags").cloned().unwrap_or_else(|| json!([])),
                            "is_starred": hit.get("isStarred").and_then(Value::as_bool).unwrap_or(false),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(json!({
            "status": "success",
            "total_count": dashboards.len(),
            "limit": limit,
            "dashboards": dashboards,
        }))
    }

    /// Lists datasources. Secure-config values are never forwarded; only the
    /// key names survive, masked.
    pub async fn fetch_datasources(&self) -> Result<Value, GrafanaError> {
        let url = format!("{}/api/datasources", self.host);
        info!("fetching all datasources");

        let payload = self
            .get(&url, &[], "Failed to fetch datasources")
            .await?;

        let datasources: Vec<Value> = payload
            .as_array()
            .map(|list| {
                list.iter()
                    .map(|ds| {
                        let secure: Map<String, Value> = ds
                            .get("secureJsonData")
                            .and_then(Value::as_object)
                            .map(|fields| {
                                fields
                                    .keys()
                                    .map(|key| (key.clone(), Value::String(SECRET_MASK.into())))
                                    .collect()
                            })
                            .unwrap_or_default();

                        json!({
                            "id": ds.get("id"),
                            "uid": ds.get("uid"),
                            "name": ds.get("name"),
                            "type": ds.get("type"),
                            "url": ds.get("url"),
                            "access": ds.get("access"),
                            "database": ds.get("database"),
                            "is_default": ds.get("isDefault").and_then(Value::as_bool).unwrap_or(false),
                            "json_data": ds.get("jsonData").cloned().unwrap_or_else(|| json!({})),
                            "secure_json_data": secure,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(json!({
            "status": "success",
            "total_count": datasources.len(),
            "datasources": datasources,
        }))
    }

    /// Lists folders with their permission flags and audit fields.
    pub async fn fetch_folders(&self) -> Result<Value, GrafanaError> {
        let url = format!("{}/api/folders", self.host);
        info!("fetching all folders");

        let payload = self.get(&url, &[], "Failed to fetch folders").await?;

        let folders: Vec<Value> = payload
            .as_array()
            .map(|list| {
                list.iter()
                    .map(|folder| {
                        json!({
                            "id": folder.get("id"),
                            "uid": folder.get("uid"),
                            "title": folder.get("title"),
                            "url": folder.get("url"),
                            "has_acl": folder.get("hasAcl").and_then(Value::as_bool).unwrap_or(false),
                            "can_save": folder.get("canSave").and_then(Value::as_bool).unwrap_or(false),
                            "can_edit": folder.get("canEdit").and_then(Value::as_bool).unwrap_or(false),
                            "can_admin": folder.get("canAdmin").and_then(Value::as_bool).unwrap_or(false),
                            "created": folder.get("created"),
                            "updated": folder.get("updated"),
                            "created_by": folder.get("createdBy"),
                            "updated_by": folder.get("updatedBy"),
                            "version": folder.get("version"),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(json!({
            "status": "success",
            "total_count": folders.len(),
            "folders": folders,
        }))
    }

    async fn get(
        &self,
        url: &str,
        query: &[(&str, String)],
        context: &str,
    ) -> Result<Value, GrafanaError> {
        let response = self
            .http
            .get(url)
            .query(query)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(header::CONTENT_TYPE, "application/json")
            .timeout(READ_TIMEOUT)
            .send()
            .await
            .map_err(|source| GrafanaError::Transport {
                context: context.to_string(),
                source,
            })?;
        Self::decode(response, context).await
    }

    async fn post(&self, url: &str, body: &Value, context: &str) -> Result<Value, GrafanaError> {
        let response = self
            .http
            .post(url)
            .json(body)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .timeout(QUERY_TIMEOUT)
            .send()
            .await
            .map_err(|source| GrafanaError::Transport {
                context: context.to_string(),
                source,
            })?;
        Self::decode(response, context).await
    }

    async fn decode(response: reqwest::Response, context: &str) -> Result<Value, GrafanaError> {
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(GrafanaError::Status {
                context: context.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<Value>()
            .await
            .map_err(|source| GrafanaError::Transport {
                context: format!("{context}: invalid JSON response"),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::GrafanaClient;

    #[test]
    fn host_trailing_slash_is_trimmed() {
        let client = GrafanaClient::new("https://grafana.example.com/", "key", true).unwrap();
        assert_eq!(client.host(), "https://grafana.example.com");
    }
}
