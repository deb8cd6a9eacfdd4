//! Assertion evaluation against the actual document of a test run.

use chainflow_types::testing::{Assertion, AssertionKind, AssertionResult};
use serde_json::{Value, json};

use crate::engine::expression::ExpressionEvaluator;
use crate::engine::resolver::{lookup_path, value_to_string};

/// Check one assertion. `document` is `{success, status, output, steps, error}`.
///
/// An unresolvable path yields `actual: null`; only `exists` with
/// `expected: false` passes in that case.
pub fn evaluate(assertion: &Assertion, document: &Value) -> AssertionResult {
    let found = lookup_path(document, &assertion.path);
    let actual = found.cloned().unwrap_or(Value::Null);

    let outcome = match assertion.kind {
        AssertionKind::Equals => Ok(values_equal(&actual, &assertion.expected)),
        AssertionKind::Contains => Ok(contains(&actual, &assertion.expected)),
        AssertionKind::Exists => {
            let want = assertion.expected.as_bool().unwrap_or(true);
            Ok(found.is_some_and(|v| !v.is_null()) == want)
        }
        AssertionKind::Type => Ok(type_name(&actual) == value_to_string(&assertion.expected)),
        AssertionKind::Range => in_range(&actual, &assertion.expected),
        AssertionKind::Custom => custom(&actual, &assertion.expected, document),
    };

    let (passed, message) = match outcome {
        Ok(true) => (true, assertion.message.clone()),
        Ok(false) => (
            false,
            Some(assertion.message.clone().unwrap_or_else(|| {
                format!(
                    "expected {} {} {}, got {}",
                    assertion.path,
                    kind_label(assertion.kind),
                    assertion.expected,
                    actual
                )
            })),
        ),
        Err(reason) => (false, Some(reason)),
    };

    AssertionResult {
        path: assertion.path.clone(),
        kind: assertion.kind,
        passed,
        expected: assertion.expected.clone(),
        actual,
        message,
    }
}

fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (actual.as_f64(), expected.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => actual == expected,
    }
}

fn contains(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::String(s) => s.contains(&value_to_string(expected)),
        Value::Array(items) => items.iter().any(|item| values_equal(item, expected)),
        Value::Object(map) => expected.as_str().is_some_and(|key| map.contains_key(key)),
        _ => false,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn in_range(actual: &Value, bounds: &Value) -> Result<bool, String> {
    let Some(n) = actual.as_f64() else {
        return Ok(false);
    };
    let min = bounds.get("min").and_then(Value::as_f64);
    let max = bounds.get("max").and_then(Value::as_f64);
    if min.is_none() && max.is_none() {
        return Err("range assertion needs `min` or `max`".to_string());
    }
    Ok(min.is_none_or(|m| n >= m) && max.is_none_or(|m| n <= m))
}

fn custom(actual: &Value, expression: &Value, document: &Value) -> Result<bool, String> {
    let Some(expression) = expression.as_str() else {
        return Err("custom assertion needs an expression string".to_string());
    };
    let context = json!({ "actual": actual, "output": document });
    ExpressionEvaluator::new()
        .evaluate_bool(expression, &context)
        .map_err(|e| e.to_string())
}

fn kind_label(kind: AssertionKind) -> &'static str {
    match kind {
        AssertionKind::Equals => "to equal",
        AssertionKind::Contains => "to contain",
        AssertionKind::Exists => "exists:",
        AssertionKind::Type => "to have type",
        AssertionKind::Range => "within",
        AssertionKind::Custom => "to satisfy",
    }
}
