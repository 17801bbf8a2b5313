use std::collections::{BTreeSet, HashMap};

use serde_json::Value;

const DOWNSAMPLE_THRESHOLD: usize = 1000;
const DOWNSAMPLE_STRIDE: usize = 10;

/// Subsamples oversized query frames in place so responses stay small.
///
/// For each frame whose primary value sequence exceeds 1000 points, every
/// parallel sequence keeps every 10th element so timestamps and values stay
/// index-aligned. Uniform stride, not aggregation; payloads with missing keys
/// are left untouched.
pub fn downsample_time_series(data: &mut Value) {
    let Some(results) = data.get_mut("results").and_then(Value::as_object_mut) else {
        return;
    };

    for result in results.values_mut() {
        let Some(frames) = result.get_mut("frames").and_then(Value::as_array_mut) else {
            continue;
        };
        for frame in frames {
            let Some(values) = frame
                .get_mut("data")
                .and_then(|data| data.get_mut("values"))
                .and_then(Value::as_array_mut)
            else {
                continue;
            };

            let oversized = values
                .first()
                .and_then(Value::as_array)
                .map(|first| first.len() > DOWNSAMPLE_THRESHOLD)
                .unwrap_or(false);
            if !oversized {
                continue;
            }

            for sequence in values.iter_mut() {
                if let Some(points) = sequence.as_array_mut() {
                    *points = points.iter().step_by(DOWNSAMPLE_STRIDE).cloned().collect();
                }
            }
        }
    }
}

/// Collects the distinct values of one label across every frame's field
/// schema in a query payload.
pub fn extract_label_values(data: &Value, label_name: &str) -> Vec<String> {
    let mut values = BTreeSet::new();

    let Some(results) = data.get("results").and_then(Value::as_object) else {
        return Vec::new();
    };

    for result in results.values() {
        let Some(frames) = result.get("frames").and_then(Value::as_array) else {
            continue;
        };
        for frame in frames {
            let Some(fields) = frame
                .get("schema")
                .and_then(|schema| schema.get("fields"))
                .and_then(Value::as_array)
            else {
                continue;
            };
            for field in fields {
                if let Some(value) = field
                    .get("labels")
                    .and_then(|labels| labels.get(label_name))
                    .and_then(Value::as_str)
                {
                    values.insert(value.to_string());
                }
            }
        }
    }

    values.into_iter().collect()
}

/// A panel's first query target, resolved to an executable expression and
/// datasource identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub expr: String,
    pub datasource_uid: String,
}

/// Resolves a panel's first target into an expression with template
/// variables substituted, plus its datasource identifier.
///
/// The datasource reference may be a bare string, or an object carrying
/// `uid` or `id`, at target level with a panel-level fallback. The error
/// string is a descriptive per-panel result, never a raised failure.
pub fn resolve_panel_target(
    panel: &Value,
    template_variables: &HashMap<String, String>,
) -> Result<ResolvedTarget, String> {
    let target = panel
        .get("targets")
        .and_then(Value::as_array)
        .and_then(|targets| targets.first())
        .ok_or_else(|| "No targets found for panel".to_string())?;

    let expr = target
        .get("expr")
        .and_then(Value::as_str)
        .filter(|expr| !expr.is_empty())
        .ok_or_else(|| "No query expression found in target".to_string())?;

    let datasource_uid = datasource_identifier(target.get("datasource"))
        .or_else(|| datasource_identifier(panel.get("datasource")))
        .ok_or_else(|| "No datasource UID found".to_string())?;

    let mut expr = expr.to_string();
    for (name, value) in template_variables {
        expr = expr.replace(&format!("${{{name}}}"), value);
        expr = expr.replace(&format!("${name}"), value);
    }

    Ok(ResolvedTarget {
        expr,
        datasource_uid,
    })
}

/// Normalizes a dashboard definition into one flat panel list, covering both
/// the flat `panels` array and the legacy `rows[].panels` nesting.
pub fn flatten_panels(dashboard: &Value) -> Vec<Value> {
    let mut panels: Vec<Value> = dashboard
        .get("panels")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    if panels.is_empty() {
        if let Some(rows) = dashboard.get("rows").and_then(Value::as_array) {
            for row in rows {
                if let Some(row_panels) = row.get("panels").and_then(Value::as_array) {
                    panels.extend(row_panels.iter().cloned());
                }
            }
        }
    }

    panels
}

/// Ordered datasource-reference resolution: bare string, then object `uid`,
/// then object `id`. Numeric identifiers are rendered as strings.
fn datasource_identifier(datasource: Option<&Value>) -> Option<String> {
    match datasource? {
        Value::String(uid) if !uid.is_empty() => Some(uid.clone()),
        Value::Object(fields) => fields
            .get("uid")
            .and_then(identifier_string)
            .or_else(|| fields.get("id").and_then(identifier_string)),
        _ => None,
    }
}

fn identifier_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        downsample_time_series, extract_label_values, flatten_panels, resolve_panel_target,
    };
    use serde_json::{json, Value};
    use std::collections::HashMap;

    fn frame_payload(len: usize, sequences: usize) -> Value {
        let series: Vec<usize> = (0..len).collect();
        let values: Vec<Vec<usize>> = (0..sequences).map(|_| series.clone()).collect();
        json!({
            "results": {
                "A": {
                    "frames": [
                        {"data": {"values": values}}
                    ]
                }
            }
        })
    }

    fn sequence_lengths(data: &Value) -> Vec<usize> {
        data["results"]["A"]["frames"][0]["data"]["values"]
            .as_array()
            .unwrap()
            .iter()
            .map(|seq| seq.as_array().unwrap().len())
            .collect()
    }

    #[test]
    fn oversized_frames_keep_every_tenth_point() {
        let mut data = frame_payload(2000, 3);
        downsample_time_series(&mut data);
        assert_eq!(sequence_lengths(&data), vec![200, 200, 200]);
    }

    #[test]
    fn downsampled_length_is_ceil_of_tenth() {
        let mut data = frame_payload(1005, 2);
        downsample_time_series(&mut data);
        // ceil(1005 / 10)
        assert_eq!(sequence_lengths(&data), vec![101, 101]);
    }

    #[test]
    fn small_frames_are_untouched() {
        let mut data = frame_payload(1000, 2);
        let before = data.clone();
        downsample_time_series(&mut data);
        assert_eq!(data, before);
    }

    #[test]
    fn missing_keys_leave_payload_unchanged() {
        for payload in [
            json!({}),
            json!({"results": {}}),
            json!({"results": {"A": {}}}),
            json!({"results": {"A": {"frames": [{}]}}}),
            json!({"results": {"A": {"frames": [{"data": {}}]}}}),
            json!({"results": "not-an-object"}),
        ] {
            let mut data = payload.clone();
            downsample_time_series(&mut data);
            assert_eq!(data, payload);
        }
    }

    #[test]
    fn label_values_are_distinct_across_frames() {
        let data = json!({
            "results": {
                "A": {
                    "frames": [
                        {"schema": {"fields": [
                            {"labels": {"instance": "host-1", "job": "node"}},
                            {"labels": {"instance": "host-2"}}
                        ]}},
                        {"schema": {"fields": [
                            {"labels": {"instance": "host-1"}},
                            {"name": "Time"}
                        ]}}
                    ]
                },
                "B": {
                    "frames": [
                        {"schema": {"fields": [{"labels": {"instance": "host-3"}}]}}
                    ]
                }
            }
        });
        assert_eq!(
            extract_label_values(&data, "instance"),
            vec!["host-1", "host-2", "host-3"]
        );
        assert_eq!(extract_label_values(&data, "job"), vec!["node"]);
        assert!(extract_label_values(&data, "pod").is_empty());
        assert!(extract_label_values(&json!({}), "instance").is_empty());
    }

    #[test]
    fn target_resolution_prefers_target_level_string() {
        let panel = json!({
            "datasource": {"uid": "panel-level"},
            "targets": [{"expr": "up", "datasource": "target-level"}]
        });
        let resolved = resolve_panel_target(&panel, &HashMap::new()).unwrap();
        assert_eq!(resolved.datasource_uid, "target-level");
        assert_eq!(resolved.expr, "up");
    }

    #[test]
    fn target_resolution_falls_back_uid_then_id_then_panel() {
        let by_uid = json!({"targets": [{"expr": "up", "datasource": {"uid": "ds-uid"}}]});
        assert_eq!(
            resolve_panel_target(&by_uid, &HashMap::new())
                .unwrap()
                .datasource_uid,
            "ds-uid"
        );

        let by_id = json!({"targets": [{"expr": "up", "datasource": {"id": 42}}]});
        assert_eq!(
            resolve_panel_target(&by_id, &HashMap::new())
                .unwrap()
                .datasource_uid,
            "42"
        );

        let panel_level = json!({
            "datasource": {"uid": "panel-ds"},
            "targets": [{"expr": "up"}]
        });
        assert_eq!(
            resolve_panel_target(&panel_level, &HashMap::new())
                .unwrap()
                .datasource_uid,
            "panel-ds"
        );
    }

    #[test]
    fn target_resolution_errors_are_descriptive() {
        let no_targets = json!({"targets": []});
        assert_eq!(
            resolve_panel_target(&no_targets, &HashMap::new()).unwrap_err(),
            "No targets found for panel"
        );

        let no_expr = json!({"targets": [{"datasource": "ds"}]});
        assert_eq!(
            resolve_panel_target(&no_expr, &HashMap::new()).unwrap_err(),
            "No query expression found in target"
        );

        let no_datasource = json!({"targets": [{"expr": "up"}]});
        assert_eq!(
            resolve_panel_target(&no_datasource, &HashMap::new()).unwrap_err(),
            "No datasource UID found"
        );
    }

    #[test]
    fn template_variables_substitute_both_forms() {
        let panel = json!({
            "targets": [{
                "expr": "rate(http_requests{cluster=\"$cluster\", ns=\"${namespace}\"}[5m])",
                "datasource": {"uid": "prom"}
            }]
        });
        let vars = HashMap::from([
            ("cluster".to_string(), "prod".to_string()),
            ("namespace".to_string(), "web".to_string()),
        ]);
        let resolved = resolve_panel_target(&panel, &vars).unwrap();
        assert_eq!(
            resolved.expr,
            "rate(http_requests{cluster=\"prod\", ns=\"web\"}[5m])"
        );
    }

    #[test]
    fn flatten_handles_flat_and_legacy_layouts() {
        let flat = json!({"panels": [{"id": 1}, {"id": 2}]});
        assert_eq!(flatten_panels(&flat).len(), 2);

        let legacy = json!({
            "rows": [
                {"panels": [{"id": 1}]},
                {"panels": [{"id": 2}, {"id": 3}]},
                {}
            ]
        });
        let panels = flatten_panels(&legacy);
        assert_eq!(panels.len(), 3);
        assert_eq!(panels[2]["id"], 3);

        assert!(flatten_panels(&json!({})).is_empty());
    }
}
