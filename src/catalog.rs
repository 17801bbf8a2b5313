use serde_json::{json, Value};

/// Static tool catalog: one schema-described descriptor per backend
/// operation. Read-only data for `tools/list` and argument binding; actual
/// enforcement (e.g. the 4-panel cap) lives in the Grafana client.
pub fn tool_definitions() -> Vec<Value> {
    vec![
        tool_def(
            "test_connection",
            "Test connection to Grafana API to verify configuration and connectivity.",
            json!({"type": "object", "properties": {}, "required": []}),
        ),
        tool_def(
            "grafana_promql_query",
            "Executes PromQL queries against Grafana's Prometheus datasource and downsamples oversized time series responses.",
            json!({
                "type": "object",
                "properties": {
                    "datasource_uid": {"type": "string", "description": "Prometheus datasource UID"},
                    "query": {"type": "string", "description": "PromQL query string"},
                    "start_time": {"type": "string", "description": "Start time in RFC3339 or relative string (e.g., 'now-2h', '2023-01-01T00:00:00Z')"},
                    "end_time": {"type": "string", "description": "End time in RFC3339 or relative string (e.g., 'now-2h', '2023-01-01T00:00:00Z')"},
                    "duration": {"type": "string", "description": "Duration string for the time window (e.g., '2h', '90m')"}
                },
                "required": ["datasource_uid", "query"]
            }),
        ),
        tool_def(
            "grafana_loki_query",
            "Queries Grafana Loki for log data over a resolved time window.",
            json!({
                "type": "object",
                "properties": {
                    "datasource_uid": {"type": "string", "description": "Loki datasource UID"},
                    "query": {"type": "string", "description": "Loki query string"},
                    "duration": {"type": "string", "description": "Time duration (e.g., '5m', '1h', '2d') - overrides start_time/end_time if provided"},
                    "start_time": {"type": "string", "description": "Start time in RFC3339 or relative string (e.g., 'now-2h', '2023-01-01T00:00:00Z')"},
                    "end_time": {"type": "string", "description": "End time in RFC3339 or relative string (e.g., 'now-2h', '2023-01-01T00:00:00Z')"},
                    "limit": {"type": "integer", "description": "Maximum number of log entries to return", "default": 100}
                },
                "required": ["datasource_uid", "query"]
            }),
        ),
        tool_def(
            "grafana_get_dashboard_config",
            "Retrieves a dashboard's full definition and metadata by UID.",
            json!({
                "type": "object",
                "properties": {
                    "dashboard_uid": {"type": "string", "description": "Dashboard UID"}
                },
                "required": ["dashboard_uid"]
            }),
        ),
        tool_def(
            "grafana_query_dashboard_panels",
            "Executes queries for specific dashboard panels. Can query up to 4 panels at once, supports template variables.",
            json!({
                "type": "object",
                "properties": {
                    "dashboard_uid": {"type": "string", "description": "Dashboard UID"},
                    "panel_ids": {"type": "array", "items": {"type": "integer"}, "description": "List of panel IDs to query (max 4)"},
                    "template_variables": {"type": "object", "description": "Template variables for the dashboard"}
                },
                "required": ["dashboard_uid", "panel_ids"]
            }),
        ),
        tool_def(
            "grafana_fetch_label_values",
            "Fetches available values for a Prometheus label (e.g., 'instance', 'job'), optionally filtered by metric.",
            json!({
                "type": "object",
                "properties": {
                    "datasource_uid": {"type": "string", "description": "Prometheus datasource UID"},
                    "label_name": {"type": "string", "description": "Label name to fetch values for (e.g., 'instance', 'job')"},
                    "metric_match_filter": {"type": "string", "description": "Optional metric name filter (e.g., 'up', 'node_cpu_seconds_total')"}
                },
                "required": ["datasource_uid", "label_name"]
            }),
        ),
        tool_def(
            "grafana_fetch_dashboard_variables",
            "Fetches all template variables and their current values from a Grafana dashboard.",
            json!({
                "type": "object",
                "properties": {
                    "dashboard_uid": {"type": "string", "description": "Dashboard UID"}
                },
                "required": ["dashboard_uid"]
            }),
        ),
        tool_def(
            "grafana_fetch_all_dashboards",
            "Fetches all dashboards from Grafana with basic information like title, UID, folder, tags.",
            json!({
                "type": "object",
                "properties": {
                    "limit": {"type": "integer", "description": "Maximum number of dashboards to return", "default": 100}
                },
                "required": []
            }),
        ),
        tool_def(
            "grafana_fetch_datasources",
            "Fetches all datasources from Grafana with their configuration details. Secure settings are masked.",
            json!({"type": "object", "properties": {}, "required": []}),
        ),
        tool_def(
            "grafana_fetch_folders",
            "Fetches all folders from Grafana with their metadata and permissions.",
            json!({"type": "object", "properties": {}, "required": []}),
        ),
    ]
}

fn tool_def(name: &str, description: &str, input_schema: Value) -> Value {
    json!({
        "name": name,
        "description": description,
        "inputSchema": input_schema,
    })
}

#[cfg(test)]
mod tests {
    use super::tool_definitions;
    use serde_json::Value;
    use std::collections::HashSet;

    #[test]
    fn catalog_has_ten_uniquely_named_tools() {
        let tools = tool_definitions();
        assert_eq!(tools.len(), 10);

        let names: HashSet<&str> = tools
            .iter()
            .map(|tool| tool["name"].as_str().unwrap())
            .collect();
        assert_eq!(names.len(), 10);
    }

    #[test]
    fn every_tool_declares_an_object_schema() {
        for tool in tool_definitions() {
            assert!(tool["description"].as_str().is_some_and(|d| !d.is_empty()));
            assert_eq!(tool["inputSchema"]["type"], "object");
            assert!(tool["inputSchema"]["required"].is_array());
        }
    }

    #[test]
    fn required_parameters_match_operation_signatures() {
        let required_for = |name: &str| -> Vec<String> {
            tool_definitions()
                .iter()
                .find(|tool| tool["name"] == name)
                .and_then(|tool| tool["inputSchema"]["required"].as_array().cloned())
                .unwrap_or_default()
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        };

        assert_eq!(
            required_for("grafana_promql_query"),
            vec!["datasource_uid", "query"]
        );
        assert_eq!(
            required_for("grafana_loki_query"),
            vec!["datasource_uid", "query"]
        );
        assert_eq!(
            required_for("grafana_query_dashboard_panels"),
            vec!["dashboard_uid", "panel_ids"]
        );
        assert_eq!(
            required_for("grafana_fetch_label_values"),
            vec!["datasource_uid", "label_name"]
        );
        assert_eq!(
            required_for("grafana_get_dashboard_config"),
            vec!["dashboard_uid"]
        );
        assert_eq!(
            required_for("grafana_fetch_dashboard_variables"),
            vec!["dashboard_uid"]
        );
        assert!(required_for("test_connection").is_empty());
        assert!(required_for("grafana_fetch_all_dashboards").is_empty());
        assert!(required_for("grafana_fetch_datasources").is_empty());
        assert!(required_for("grafana_fetch_folders").is_empty());
    }
}
