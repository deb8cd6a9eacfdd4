//! `{{AI_FIELD:name}}` placeholders in chain node configs.
//!
//! The resolver leaves these tokens untouched; before a chain node runs,
//! each distinct field name is generated once and substituted everywhere
//! it appears in the config.

use std::collections::HashMap;
use std::sync::LazyLock;

use chainflow_types::llm::GenerationRequest;
use chainflow_types::workflow::Node;
use regex::{Captures, Regex};
use serde_json::{Map, Value};

use crate::engine::context::ExecutionContext;
use crate::llm::generator::TextGenerator;

static AI_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*AI_FIELD:\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("AI_FIELD pattern is valid")
});

static WHOLE_AI_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\{\{\s*AI_FIELD:\s*([A-Za-z0-9_.\-]+)\s*\}\}$").expect("AI_FIELD pattern is valid")
});

/// Distinct field names referenced anywhere in `config`, in first-seen order.
pub fn collect_fields(config: &Map<String, Value>) -> Vec<String> {
    let mut names = Vec::new();
    for value in config.values() {
        collect_from(value, &mut names);
    }
    names
}

fn collect_from(value: &Value, names: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            for caps in AI_FIELD.captures_iter(s) {
                let name = caps[1].to_string();
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_from(v, names)),
        Value::Object(map) => map.values().for_each(|v| collect_from(v, names)),
        _ => {}
    }
}

/// Fills `AI_FIELD` placeholders for chain nodes.
pub struct AiFieldResolver<'a, G: TextGenerator> {
    generator: &'a G,
}

impl<'a, G: TextGenerator> AiFieldResolver<'a, G> {
    pub fn new(generator: &'a G) -> Self {
        Self { generator }
    }

    /// Replace every placeholder in `config`. Test mode substitutes
    /// `"[ai:name]"`; a failed generation leaves the placeholder as written.
    pub async fn resolve(&self, node: &Node, config: Map<String, Value>, ctx: &ExecutionContext) -> Map<String, Value> {
        let names = collect_fields(&config);
        if names.is_empty() {
            return config;
        }

        let mut values = HashMap::new();
        for name in names {
            let value = if ctx.test_mode {
                Some(format!("[ai:{name}]"))
            } else {
                self.generate(node, &name, ctx).await
            };
            if let Some(value) = value {
                values.insert(name, value);
            }
        }

        config
            .into_iter()
            .map(|(key, value)| (key, substitute(value, &values)))
            .collect()
    }

    async fn generate(&self, node: &Node, name: &str, ctx: &ExecutionContext) -> Option<String> {
        let request = GenerationRequest::new(format!(
            "Action: {}\nField: {name}\n\nContext:\n{}",
            node.node_type,
            serde_json::to_string_pretty(&ctx.data).unwrap_or_default()
        ))
        .with_system(
            "You fill in a single field of an automated action from the given context. \
             Respond with the field value only, no quotes or explanation.",
        )
        .with_model(self.generator.default_model());

        match self.generator.generate(&request).await {
            Ok(response) => Some(response.text.trim().to_string()),
            Err(e) => {
                tracing::warn!(node_id = %node.id, field = name, error = %e, "AI field generation failed");
                None
            }
        }
    }
}

fn substitute(value: Value, values: &HashMap<String, String>) -> Value {
    match value {
        Value::String(s) => {
            if let Some(caps) = WHOLE_AI_FIELD.captures(&s) {
                if let Some(generated) = values.get(&caps[1]) {
                    return Value::String(generated.clone());
                }
                return Value::String(s);
            }
            let replaced = AI_FIELD.replace_all(&s, |caps: &Captures| match values.get(&caps[1]) {
                Some(generated) => generated.clone(),
                None => caps[0].to_string(),
            });
            Value::String(replaced.into_owned())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(|v| substitute(v, values)).collect()),
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, substitute(v, values))).collect()),
        other => other,
    }
}
