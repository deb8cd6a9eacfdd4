//! Data shaping handlers: `data_transform`, `template`, `javascript`.

use chainflow_types::node::NodeResult;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::{NodeOutcome, loose, parse_config};
use crate::engine::context::ExecutionContext;
use crate::engine::error::EngineError;
use crate::engine::expression::ExpressionEvaluator;
use crate::engine::resolver::value_to_string;

// ---------------------------------------------------------------------------
// data_transform
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TransformConfig {
    operation: String,
    #[serde(default)]
    input: Option<Value>,
    #[serde(default, deserialize_with = "loose::string_list")]
    fields: Vec<String>,
    #[serde(default)]
    mapping: Map<String, Value>,
}

/// `data_transform`: apply one named operation to `input` (default `data`).
pub fn data_transform(
    node_id: &str,
    config: &Map<String, Value>,
    ctx: &ExecutionContext,
) -> Result<NodeOutcome, EngineError> {
    let cfg: TransformConfig = parse_config(node_id, config)?;
    let input = cfg.input.clone().unwrap_or_else(|| ctx.data.clone());

    let result = apply(node_id, &cfg, input)?;
    Ok(NodeOutcome::done(NodeResult::success(
        "data_transform",
        json!({ "operation": cfg.operation, "result": result }),
    )))
}

fn apply(node_id: &str, cfg: &TransformConfig, input: Value) -> Result<Value, EngineError> {
    let invalid = |message: String| EngineError::invalid_config(node_id, message);

    match cfg.operation.as_str() {
        "pick" => {
            let map = as_object(&input).ok_or_else(|| invalid("pick requires an object input".into()))?;
            Ok(Value::Object(
                cfg.fields
                    .iter()
                    .filter_map(|f| map.get(f).map(|v| (f.clone(), v.clone())))
                    .collect(),
            ))
        }
        "omit" => {
            let map = as_object(&input).ok_or_else(|| invalid("omit requires an object input".into()))?;
            Ok(Value::Object(
                map.iter()
                    .filter(|(k, _)| !cfg.fields.contains(k))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ))
        }
        "rename" => {
            let map = as_object(&input).ok_or_else(|| invalid("rename requires an object input".into()))?;
            Ok(Value::Object(
                map.iter()
                    .map(|(k, v)| {
                        let key = cfg
                            .mapping
                            .get(k)
                            .and_then(Value::as_str)
                            .unwrap_or(k.as_str())
                            .to_string();
                        (key, v.clone())
                    })
                    .collect(),
            ))
        }
        "merge" => match input {
            Value::Array(items) => {
                let mut merged = Map::new();
                for item in items {
                    if let Value::Object(map) = item {
                        merged.extend(map);
                    }
                }
                Ok(Value::Object(merged))
            }
            Value::Object(mut map) => {
                map.extend(cfg.mapping.clone());
                Ok(Value::Object(map))
            }
            _ => Err(invalid("merge requires an object or array input".into())),
        },
        "uppercase" => Ok(map_strings(input, &|s| s.to_uppercase())),
        "lowercase" => Ok(map_strings(input, &|s| s.to_lowercase())),
        "trim" => Ok(map_strings(input, &|s| s.trim().to_string())),
        "to_number" => {
            let n = match &input {
                Value::Number(_) => Some(input.clone()),
                Value::String(s) => s.trim().parse::<f64>().ok().map(|f| json!(f)),
                Value::Bool(b) => Some(json!(if *b { 1 } else { 0 })),
                _ => None,
            };
            n.ok_or_else(|| invalid(format!("cannot convert {} to a number", value_to_string(&input))))
        }
        "to_string" => Ok(Value::String(value_to_string(&input))),
        "json_parse" => match &input {
            Value::String(s) => serde_json::from_str(s).map_err(|e| invalid(format!("json_parse: {e}"))),
            other => Ok(other.clone()),
        },
        "json_stringify" => serde_json::to_string(&input)
            .map(Value::String)
            .map_err(|e| invalid(format!("json_stringify: {e}"))),
        "length" => Ok(json!(match &input {
            Value::String(s) => s.chars().count(),
            Value::Array(items) => items.len(),
            Value::Object(map) => map.len(),
            _ => 0,
        })),
        other => Err(invalid(format!("unknown data_transform operation '{other}'"))),
    }
}

fn as_object(value: &Value) -> Option<&Map<String, Value>> {
    value.as_object()
}

/// Apply `f` to a string, or to every string value of an object/array.
fn map_strings(value: Value, f: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::String(s) => Value::String(f(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(|v| map_strings(v, f)).collect()),
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, map_strings(v, f))).collect()),
        other => other,
    }
}

// ---------------------------------------------------------------------------
// template
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TemplateConfig {
    template: Value,
}

/// `template`: the config's `template` after resolution, as text.
pub fn template(node_id: &str, config: &Map<String, Value>) -> Result<NodeOutcome, EngineError> {
    let cfg: TemplateConfig = parse_config(node_id, config)?;
    Ok(NodeOutcome::done(NodeResult::success(
        "template",
        json!({ "text": value_to_string(&cfg.template) }),
    )))
}

// ---------------------------------------------------------------------------
// javascript
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ScriptConfig {
    code: String,
}

/// `javascript`: evaluated by the sandboxed expression evaluator, never a
/// general-purpose interpreter.
pub fn javascript(node_id: &str, config: &Map<String, Value>, ctx: &ExecutionContext) -> Result<NodeOutcome, EngineError> {
    let cfg: ScriptConfig = parse_config(node_id, config)?;
    let code = cfg.code.trim().trim_start_matches("return ").trim_end_matches(';');

    let result = ExpressionEvaluator::new()
        .evaluate_in_context(code, ctx)
        .map_err(|e| EngineError::ScriptExecution(e.to_string()))?;

    Ok(NodeOutcome::done(NodeResult::success("javascript", json!({ "result": result }))))
}
