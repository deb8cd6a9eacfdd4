//! AI action nodes: summarize, extract, sentiment, translate, generate, classify.
//!
//! Each action normalizes its loose builder config, builds a prompt, calls
//! the text generator once, and reshapes the answer into flat output fields.
//! Test mode never calls the generator and returns canned output with the
//! same keys as a live call.

use chainflow_types::llm::GenerationRequest;
use chainflow_types::node::NodeResult;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::{NodeOutcome, loose, parse_config};
use crate::engine::context::ExecutionContext;
use crate::engine::error::EngineError;
use crate::engine::resolver::value_to_string;
use crate::llm::generator::TextGenerator;
use crate::llm::response::extract_json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AiActionKind {
    Summarize,
    Extract,
    Sentiment,
    Translate,
    Generate,
    Classify,
}

impl AiActionKind {
    pub const ALL: [AiActionKind; 6] = [
        AiActionKind::Summarize,
        AiActionKind::Extract,
        AiActionKind::Sentiment,
        AiActionKind::Translate,
        AiActionKind::Generate,
        AiActionKind::Classify,
    ];

    pub fn from_node_type(node_type: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.node_type() == node_type)
    }

    pub fn node_type(self) -> &'static str {
        match self {
            AiActionKind::Summarize => "ai_action_summarize",
            AiActionKind::Extract => "ai_action_extract",
            AiActionKind::Sentiment => "ai_action_sentiment",
            AiActionKind::Translate => "ai_action_translate",
            AiActionKind::Generate => "ai_action_generate",
            AiActionKind::Classify => "ai_action_classify",
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn default_max_length() -> u64 {
    150
}

#[derive(Debug, Deserialize)]
struct AiActionConfig {
    #[serde(default, alias = "input", alias = "content")]
    text: Option<Value>,
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default, deserialize_with = "loose::string_list")]
    fields: Vec<String>,
    #[serde(default, deserialize_with = "loose::string_list")]
    categories: Vec<String>,
    #[serde(default, alias = "targetLanguage")]
    target_language: Option<String>,
    #[serde(default, alias = "sourceLanguage")]
    source_language: Option<String>,
    #[serde(default = "default_max_length", alias = "maxLength", deserialize_with = "loose::u64_or_string")]
    max_length: u64,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    temperature: Option<f64>,
}

impl AiActionConfig {
    /// Input text: the configured `text`, else the current `data` document.
    fn input_text(&self, ctx: &ExecutionContext) -> String {
        match &self.text {
            Some(value) if !value.is_null() => value_to_string(value),
            _ => value_to_string(&ctx.data),
        }
    }

    fn target(&self) -> String {
        self.target_language.clone().unwrap_or_else(|| "en".to_string())
    }

    fn source(&self) -> String {
        self.source_language.clone().unwrap_or_else(|| "auto".to_string())
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Run an AI action node.
pub async fn run<G: TextGenerator>(
    generator: &G,
    kind: AiActionKind,
    node_id: &str,
    config: &Map<String, Value>,
    ctx: &ExecutionContext,
) -> Result<NodeOutcome, EngineError> {
    let cfg: AiActionConfig = parse_config(node_id, config)?;
    validate(kind, node_id, &cfg)?;

    let output = if ctx.test_mode {
        simulated(kind, &cfg, ctx)
    } else {
        let (system, user) = prompts(kind, &cfg, ctx);
        let request = GenerationRequest::new(user)
            .with_system(system)
            .with_model(cfg.model.clone().unwrap_or_else(|| generator.default_model().to_string()))
            .with_temperature(cfg.temperature);

        let response = match generator.generate(&request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(node_id, action = kind.node_type(), error = %e, "AI action generation failed");
                return Ok(NodeOutcome::done(NodeResult::failure(kind.node_type(), e.to_string())));
            }
        };

        match reshape(kind, &cfg, &response.text) {
            Ok(output) => output,
            Err(message) => {
                return Ok(NodeOutcome::done(NodeResult::failure(kind.node_type(), message)));
            }
        }
    };

    Ok(NodeOutcome::done(NodeResult::success(kind.node_type(), output)))
}

fn validate(kind: AiActionKind, node_id: &str, cfg: &AiActionConfig) -> Result<(), EngineError> {
    match kind {
        AiActionKind::Classify if cfg.categories.is_empty() => {
            Err(EngineError::invalid_config(node_id, "classify requires at least one category"))
        }
        AiActionKind::Extract if cfg.fields.is_empty() => {
            Err(EngineError::invalid_config(node_id, "extract requires at least one field"))
        }
        AiActionKind::Generate if cfg.prompt.as_deref().is_none_or(|p| p.trim().is_empty()) && cfg.text.is_none() => {
            Err(EngineError::invalid_config(node_id, "generate requires a prompt"))
        }
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

const JSON_ONLY: &str = "Respond with a single JSON object and nothing else.";

fn prompts(kind: AiActionKind, cfg: &AiActionConfig, ctx: &ExecutionContext) -> (String, String) {
    let text = cfg.input_text(ctx);
    match kind {
        AiActionKind::Summarize => (
            format!(
                "You summarize content. Keep the summary under {} words. Respond with the summary text only.",
                cfg.max_length
            ),
            text,
        ),
        AiActionKind::Extract => (
            format!(
                "You extract structured fields from text. Return a JSON object with exactly these keys: {}. \
                 Use null for anything not present. {JSON_ONLY}",
                cfg.fields.join(", ")
            ),
            text,
        ),
        AiActionKind::Sentiment => (
            format!(
                "You analyze sentiment. Return {{\"sentiment\": \"positive\"|\"negative\"|\"neutral\", \
                 \"score\": -1.0..1.0, \"confidence\": 0.0..1.0}}. {JSON_ONLY}"
            ),
            text,
        ),
        AiActionKind::Translate => (
            format!(
                "You translate text from {} to {}. Respond with the translation only.",
                cfg.source(),
                cfg.target()
            ),
            text,
        ),
        AiActionKind::Generate => (
            "You write content for an automated workflow. Respond with the content only.".to_string(),
            match &cfg.prompt {
                Some(prompt) if !prompt.trim().is_empty() => prompt.clone(),
                _ => text,
            },
        ),
        AiActionKind::Classify => (
            format!(
                "You classify text into exactly one of these categories: {}. \
                 Return {{\"category\": <one of the categories>, \"confidence\": 0.0..1.0}}. {JSON_ONLY}",
                cfg.categories.join(", ")
            ),
            text,
        ),
    }
}

// ---------------------------------------------------------------------------
// Output shaping
// ---------------------------------------------------------------------------

fn reshape(kind: AiActionKind, cfg: &AiActionConfig, text: &str) -> Result<Value, String> {
    let text = text.trim();
    match kind {
        AiActionKind::Summarize => Ok(json!({
            "summary": text,
            "word_count": text.split_whitespace().count(),
        })),
        AiActionKind::Extract => {
            let parsed = extract_json(text)
                .filter(Value::is_object)
                .ok_or_else(|| "extraction response was not a JSON object".to_string())?;
            let extracted: Map<String, Value> = cfg
                .fields
                .iter()
                .map(|f| (f.clone(), parsed.get(f).cloned().unwrap_or(Value::Null)))
                .collect();
            Ok(json!({ "extracted": extracted }))
        }
        AiActionKind::Sentiment => {
            let parsed = extract_json(text).ok_or_else(|| "sentiment response was not JSON".to_string())?;
            Ok(json!({
                "sentiment": parsed.get("sentiment").and_then(Value::as_str).unwrap_or("neutral"),
                "score": parsed.get("score").and_then(Value::as_f64).unwrap_or(0.0),
                "confidence": parsed.get("confidence").and_then(Value::as_f64).unwrap_or(0.0),
            }))
        }
        AiActionKind::Translate => Ok(json!({
            "translated_text": text,
            "source_language": cfg.source(),
            "target_language": cfg.target(),
        })),
        AiActionKind::Generate => Ok(json!({ "generated_text": text })),
        AiActionKind::Classify => {
            let (category, confidence) = match extract_json(text) {
                Some(parsed) => (
                    parsed
                        .get("category")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .ok_or_else(|| "classification response has no category".to_string())?,
                    parsed.get("confidence").and_then(Value::as_f64).unwrap_or(0.0),
                ),
                None => {
                    let category = cfg
                        .categories
                        .iter()
                        .find(|c| c.eq_ignore_ascii_case(text))
                        .cloned()
                        .ok_or_else(|| format!("'{text}' is not one of the categories"))?;
                    (category, 1.0)
                }
            };
            Ok(json!({
                "category": category,
                "confidence": confidence,
                "categories": cfg.categories,
            }))
        }
    }
}

/// Deterministic test-mode output.
fn simulated(kind: AiActionKind, cfg: &AiActionConfig, ctx: &ExecutionContext) -> Value {
    match kind {
        AiActionKind::Summarize => {
            let summary = "Simulated summary of the provided content.";
            json!({ "summary": summary, "word_count": summary.split_whitespace().count() })
        }
        AiActionKind::Extract => {
            let extracted: Map<String, Value> = cfg
                .fields
                .iter()
                .map(|f| (f.clone(), Value::String(format!("[test {f}]"))))
                .collect();
            json!({ "extracted": extracted })
        }
        AiActionKind::Sentiment => json!({ "sentiment": "neutral", "score": 0.0, "confidence": 1.0 }),
        AiActionKind::Translate => json!({
            "translated_text": format!("[{}] {}", cfg.target(), cfg.input_text(ctx)),
            "source_language": cfg.source(),
            "target_language": cfg.target(),
        }),
        AiActionKind::Generate => json!({ "generated_text": "Simulated generated text." }),
        AiActionKind::Classify => json!({
            "category": cfg.categories.first().cloned().unwrap_or_default(),
            "confidence": 1.0,
            "categories": cfg.categories,
        }),
    }
}
