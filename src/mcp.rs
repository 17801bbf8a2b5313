use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    catalog,
    grafana::GrafanaError,
    models::{error_reply, success_reply, JsonRpcRequest, ToolCallParams},
    AppState,
};

/// Protocol version this server always advertises, regardless of what
/// compatible version the caller requested.
pub const PROTOCOL_VERSION: &str = "2025-06-18";

const SERVER_NAME: &str = "grafana-mcp-gateway";

/// Dispatches one decoded call envelope to a reply envelope. Stateless per
/// call; both transports delegate here.
pub async fn dispatch(state: &AppState, raw: Value) -> Value {
    let request: JsonRpcRequest = match serde_json::from_value(raw) {
        Ok(request) => request,
        Err(_) => return error_reply(Value::Null, -32600, "Invalid Request"),
    };
    let request_id = request.id.unwrap_or(Value::Null);

    info!(method = %request.method, "handling JSON-RPC request");

    if request.method.starts_with("notifications/") {
        return success_reply(request_id, json!({}));
    }

    match request.method.as_str() {
        "initialize" => handle_initialize(request_id, &request.params),
        "tools/list" => success_reply(request_id, json!({"tools": catalog::tool_definitions()})),
        "tools/call" => handle_tool_call(state, request_id, request.params).await,
        other => error_reply(request_id, -32601, format!("Method not found: {other}")),
    }
}

fn handle_initialize(request_id: Value, params: &Value) -> Value {
    let requested = params.get("protocolVersion");
    let supported = requested
        .and_then(Value::as_str)
        .is_some_and(|version| version.starts_with("2025-"));

    if !supported {
        let shown = match requested {
            Some(Value::String(version)) => version.clone(),
            Some(other) => other.to_string(),
            None => "null".to_string(),
        };
        return error_reply(
            request_id,
            -32602,
            format!("Unsupported protocol version: {shown}"),
        );
    }

    success_reply(
        request_id,
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {"tools": {}},
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION"),
            },
        }),
    )
}

async fn handle_tool_call(state: &AppState, request_id: Value, params: Value) -> Value {
    let params: ToolCallParams = match serde_json::from_value(params) {
        Ok(params) => params,
        Err(_) => return error_reply(request_id, -32602, "Invalid tool call parameters"),
    };

    let trace_id = Uuid::new_v4().to_string();
    info!(tool = %params.name, trace_id = %trace_id, "invoking tool");

    match run_tool(state, &params.name, params.arguments).await {
        Ok(result) => {
            let text = serde_json::to_string_pretty(&result)
                .unwrap_or_else(|_| result.to_string());
            success_reply(
                request_id,
                json!({
                    "content": [{"type": "text", "text": text}],
                    "isError": false,
                }),
            )
        }
        Err(ToolFailure::UnknownTool(name)) => {
            warn!(tool = %name, trace_id = %trace_id, "unknown tool requested");
            error_reply(request_id, -32601, format!("Unknown tool: {name}"))
        }
        Err(ToolFailure::Execution(message)) => {
            warn!(trace_id = %trace_id, %message, "tool execution failed");
            error_reply(
                request_id,
                -32603,
                format!("Tool execution failed: {message}"),
            )
        }
    }
}

enum ToolFailure {
    UnknownTool(String),
    Execution(String),
}

impl From<GrafanaError> for ToolFailure {
    fn from(err: GrafanaError) -> Self {
        ToolFailure::Execution(err.to_string())
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PromqlArgs {
    datasource_uid: String,
    query: String,
    start_time: Option<String>,
    end_time: Option<String>,
    duration: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct LokiArgs {
    datasource_uid: String,
    query: String,
    duration: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
    #[serde(default = "default_log_limit")]
    limit: u32,
}

fn default_log_limit() -> u32 {
    100
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DashboardArgs {
    dashboard_uid: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PanelQueryArgs {
    dashboard_uid: String,
    panel_ids: Vec<i64>,
    #[serde(default)]
    template_variables: HashMap<String, String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct LabelValuesArgs {
    datasource_uid: String,
    label_name: String,
    metric_match_filter: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchArgs {
    #[serde(default = "default_search_limit")]
    limit: u32,
}

fn default_search_limit() -> u32 {
    100
}

fn bind<T: serde::de::DeserializeOwned>(name: &str, arguments: Value) -> Result<T, ToolFailure> {
    serde_json::from_value(arguments)
        .map_err(|err| ToolFailure::Execution(format!("Invalid arguments for {name}: {err}")))
}

async fn run_tool(state: &AppState, name: &str, arguments: Value) -> Result<Value, ToolFailure> {
    let client = &state.client;
    match name {
        "test_connection" => Ok(client.test_connection().await?),
        "grafana_promql_query" => {
            let args: PromqlArgs = bind(name, arguments)?;
            Ok(client
                .promql_query(
                    &args.datasource_uid,
                    &args.query,
                    args.start_time.as_deref(),
                    args.end_time.as_deref(),
                    args.duration.as_deref(),
                )
                .await?)
        }
        "grafana_loki_query" => {
            let args: LokiArgs = bind(name, arguments)?;
            Ok(client
                .loki_query(
                    &args.datasource_uid,
                    &args.query,
                    args.duration.as_deref(),
                    args.start_time.as_deref(),
                    args.end_time.as_deref(),
                    args.limit,
                )
                .await?)
        }
        "grafana_get_dashboard_config" => {
            let args: DashboardArgs = bind(name, arguments)?;
            Ok(client.get_dashboard_config(&args.dashboard_uid).await?)
        }
        "grafana_query_dashboard_panels" => {
            let args: PanelQueryArgs = bind(name, arguments)?;
            Ok(client
                .query_dashboard_panels(
                    &args.dashboard_uid,
                    &args.panel_ids,
                    &args.template_variables,
                )
                .await?)
        }
        "grafana_fetch_label_values" => {
            let args: LabelValuesArgs = bind(name, arguments)?;
            Ok(client
                .fetch_label_values(
                    &args.datasource_uid,
                    &args.label_name,
                    args.metric_match_filter.as_deref(),
                )
                .await?)
        }
        "grafana_fetch_dashboard_variables" => {
            let args: DashboardArgs = bind(name, arguments)?;
            Ok(client.fetch_dashboard_variables(&args.dashboard_uid).await?)
        }
        "grafana_fetch_all_dashboards" => {
            let args: SearchArgs = bind(name, arguments)?;
            Ok(client.fetch_all_dashboards(args.limit).await?)
        }
        "grafana_fetch_datasources" => Ok(client.fetch_datasources().await?),
        "grafana_fetch_folders" => Ok(client.fetch_folders().await?),
        unknown => Err(ToolFailure::UnknownTool(unknown.to_string())),
    }
}
