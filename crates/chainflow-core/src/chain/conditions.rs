//! Chain pre-filter conditions.
//!
//! A chain is a routing candidate only when every one of its conditions
//! holds against the agent input. Fields are dotted paths into that input.

use chainflow_types::chain::{ChainCondition, ChainDefinition, ConditionOperator};
use regex::Regex;
use serde_json::Value;

use crate::engine::resolver::{lookup_path, value_to_string};

/// True when all of the chain's conditions hold (vacuously true for none).
pub fn chain_matches(chain: &ChainDefinition, input: &Value) -> bool {
    chain.conditions.iter().all(|condition| condition_holds(condition, input))
}

pub fn condition_holds(condition: &ChainCondition, input: &Value) -> bool {
    let field = lookup_path(input, &condition.field).filter(|v| !v.is_null());

    match condition.operator {
        ConditionOperator::Exists => {
            let want = !matches!(condition.value, Value::Bool(false));
            field.is_some() == want
        }
        ConditionOperator::Equals => field.is_some_and(|actual| equals(actual, &condition.value)),
        ConditionOperator::Contains => field.is_some_and(|actual| contains(actual, &condition.value)),
        ConditionOperator::Matches => field.is_some_and(|actual| matches_pattern(actual, &condition.value)),
    }
}

fn equals(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::String(a), Value::Number(_) | Value::Bool(_)) => *a == expected.to_string(),
        (Value::Number(_) | Value::Bool(_), Value::String(e)) => actual.to_string() == *e,
        (Value::Number(a), Value::Number(e)) => a.as_f64() == e.as_f64(),
        _ => actual == expected,
    }
}

fn contains(actual: &Value, needle: &Value) -> bool {
    match actual {
        Value::String(haystack) => haystack
            .to_lowercase()
            .contains(&value_to_string(needle).to_lowercase()),
        Value::Array(items) => items.iter().any(|item| equals(item, needle)),
        Value::Object(map) => map.contains_key(&value_to_string(needle)),
        _ => false,
    }
}

fn matches_pattern(actual: &Value, pattern: &Value) -> bool {
    let Some(pattern) = pattern.as_str() else {
        return false;
    };
    match Regex::new(pattern) {
        Ok(re) => re.is_match(&value_to_string(actual)),
        Err(e) => {
            tracing::warn!(pattern, error = %e, "invalid chain condition pattern");
            false
        }
    }
}
