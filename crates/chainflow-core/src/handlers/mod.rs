//! Built-in node handlers.
//!
//! Each handler receives the node's config after variable resolution,
//! parses it into a typed struct, and produces a `NodeOutcome`. Wrapper
//! nodes (`loop`, `retry`, `try_catch`) and `ai_agent` need sub-walks, so
//! the engine drives them and only their config parsing lives here.

pub mod ai_action;
pub mod flow;
pub mod logic;
pub mod transform;
pub mod variables;

use chainflow_types::node::{NodeResult, Route};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::engine::error::EngineError;

/// What a handler hands back to the walk.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutcome {
    Done { result: NodeResult, route: Route },
    /// Live human-in-the-loop request; the run checkpoints and stops here.
    Pause { prompt: String, channel: Option<String> },
}

impl NodeOutcome {
    /// Finished result that activates every plain outgoing edge.
    pub fn done(result: NodeResult) -> Self {
        NodeOutcome::Done {
            result,
            route: Route::All,
        }
    }

    pub fn routed(result: NodeResult, route: Route) -> Self {
        NodeOutcome::Done { result, route }
    }
}

/// Parse a resolved node config into its typed form.
pub fn parse_config<T: DeserializeOwned>(node_id: &str, config: &Map<String, Value>) -> Result<T, EngineError> {
    serde_json::from_value(Value::Object(config.clone()))
        .map_err(|e| EngineError::invalid_config(node_id, e.to_string()))
}

/// Serde helpers for configs authored loosely in the visual builder.
pub(crate) mod loose {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// `"a, b"`, `"a"`, or `["a", "b"]` -> `vec!["a", "b"]`.
    pub fn string_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::String(s) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Value::Array(items) => items
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect(),
            _ => Vec::new(),
        })
    }

    /// Accepts a number or a numeric string.
    pub fn u64_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match &value {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
                .ok_or_else(|| serde::de::Error::custom(format!("expected a non-negative number, got {value}"))),
            Value::String(s) => s
                .trim()
                .parse::<u64>()
                .map_err(|_| serde::de::Error::custom(format!("expected a number, got '{s}'"))),
            _ => Err(serde::de::Error::custom(format!("expected a number, got {value}"))),
        }
    }

    /// `u64_or_string` for counts, saturating on narrow targets.
    pub fn usize_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
        u64_or_string(deserializer).map(|n| usize::try_from(n).unwrap_or(usize::MAX))
    }
}
