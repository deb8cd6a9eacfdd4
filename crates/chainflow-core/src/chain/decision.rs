//! AI chain routing: pre-filter chains by their conditions, then ask the
//! text generator which of the remaining candidates to run.

use chainflow_types::chain::{
    ChainDefinition, ChainSelectionResult, DecisionState, ExecutionPlan, SelectedChain, UnselectedChain,
};
use chainflow_types::llm::GenerationRequest;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::conditions::chain_matches;
use crate::engine::error::EngineError;
use crate::handlers::parse_config;
use crate::llm::generator::TextGenerator;
use crate::llm::response::extract_json;

/// Routing failures. Never fatal: the `ai_agent` node degrades to an
/// empty selection.
#[derive(Debug, thiserror::Error)]
pub enum DecisionError {
    #[error("routing call failed: {0}")]
    Generation(String),

    #[error("could not parse routing decision: {0}")]
    Parse(String),
}

// ---------------------------------------------------------------------------
// Agent config
// ---------------------------------------------------------------------------

/// Config of an `ai_agent` node.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    #[serde(default)]
    pub chains: Vec<ChainDefinition>,
    /// Free-text routing instructions from the workflow author.
    #[serde(default, alias = "routingInstructions", alias = "routing_instructions")]
    pub instructions: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default, alias = "execution_plan")]
    pub execution_plan: Option<ExecutionPlan>,
    /// Overrides `ctx.data` as the agent input.
    #[serde(default)]
    pub input: Option<Value>,
}

impl AgentConfig {
    pub fn parse(node_id: &str, config: &Map<String, Value>) -> Result<Self, EngineError> {
        parse_config(node_id, config)
    }

    /// The configured plan, or a sequential one with the engine's default concurrency.
    pub fn plan(&self, default_max_concurrency: usize) -> ExecutionPlan {
        self.execution_plan.clone().unwrap_or(ExecutionPlan {
            max_concurrency: default_max_concurrency,
            ..ExecutionPlan::default()
        })
    }
}

// ---------------------------------------------------------------------------
// State tracking
// ---------------------------------------------------------------------------

/// Tracks an agent node through `analyzing -> selected -> executing -> summarized`.
#[derive(Debug)]
pub struct DecisionTracker {
    state: DecisionState,
}

impl Default for DecisionTracker {
    fn default() -> Self {
        Self {
            state: DecisionState::Analyzing,
        }
    }
}

impl DecisionTracker {
    pub fn state(&self) -> DecisionState {
        self.state
    }

    /// Move to `next`; an invalid transition is logged and ignored.
    pub fn advance(&mut self, next: DecisionState) -> bool {
        if self.state.can_transition_to(next) {
            tracing::debug!(from = %self.state, to = %next, "decision state transition");
            self.state = next;
            true
        } else {
            tracing::warn!(from = %self.state, to = %next, "rejected decision state transition");
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Pick the chains to run for `input`.
///
/// Chains whose conditions fail never reach the model. Test mode selects
/// every remaining candidate in declaration order without a model call.
pub async fn analyze_and_route<G: TextGenerator>(
    generator: &G,
    config: &AgentConfig,
    input: &Value,
    test_mode: bool,
    default_max_concurrency: usize,
) -> Result<ChainSelectionResult, DecisionError> {
    let candidates: Vec<&ChainDefinition> = config
        .chains
        .iter()
        .filter(|chain| chain_matches(chain, input))
        .collect();
    let plan = config.plan(default_max_concurrency);

    tracing::debug!(
        total = config.chains.len(),
        candidates = candidates.len(),
        "pre-filtered agent chains"
    );

    if candidates.is_empty() {
        return Ok(ChainSelectionResult {
            execution_plan: plan,
            reasoning: Some("no chain conditions matched the input".to_string()),
            ..ChainSelectionResult::default()
        });
    }

    if test_mode {
        return Ok(ChainSelectionResult {
            selected_chains: candidates
                .iter()
                .enumerate()
                .map(|(i, chain)| SelectedChain {
                    chain_id: chain.id.clone(),
                    reasoning: "test mode selects every candidate".to_string(),
                    priority: i as u32 + 1,
                    confidence: 1.0,
                    input_mapping: Map::new(),
                })
                .collect(),
            unselected_chains: Vec::new(),
            execution_plan: plan,
            reasoning: Some("test mode".to_string()),
        });
    }

    let mut request = GenerationRequest::new(user_prompt(&candidates, config, input))
        .with_system(SYSTEM_PROMPT)
        .with_model(config.model.clone().unwrap_or_else(|| generator.default_model().to_string()))
        .with_temperature(config.temperature);
    request.max_tokens = request.max_tokens.max(2048);

    let response = generator
        .generate(&request)
        .await
        .map_err(|e| DecisionError::Generation(e.to_string()))?;

    parse_selection(&response.text, &candidates, plan)
}

const SYSTEM_PROMPT: &str = "You route workflow input to action chains. \
Choose the chains that should run for the given input and explain why. \
Respond with a single JSON object of the form \
{\"selectedChains\": [{\"chainId\": string, \"reasoning\": string, \"priority\": number, \"confidence\": number, \"inputMapping\": object}], \
\"unselectedChains\": [{\"chainId\": string, \"reasoning\": string}], \
\"executionPlan\": {\"parallel\": boolean, \"maxConcurrency\": number, \"continueOnError\": boolean}, \
\"reasoning\": string}. \
Only use chain IDs from the list you are given.";

fn user_prompt(candidates: &[&ChainDefinition], config: &AgentConfig, input: &Value) -> String {
    let mut prompt = String::from("Available chains:\n");
    for chain in candidates {
        let actions: Vec<&str> = chain.graph.nodes.iter().map(|n| n.node_type.as_str()).collect();
        prompt.push_str(&format!(
            "- id: {}\n  name: {}\n  description: {}\n  actions: {}\n",
            chain.id,
            chain.name,
            chain.description,
            actions.join(" -> ")
        ));
    }
    if !config.instructions.trim().is_empty() {
        prompt.push_str(&format!("\nRouting instructions:\n{}\n", config.instructions.trim()));
    }
    prompt.push_str(&format!(
        "\nInput:\n{}\n",
        serde_json::to_string_pretty(input).unwrap_or_else(|_| input.to_string())
    ));
    prompt
}

fn parse_selection(
    text: &str,
    candidates: &[&ChainDefinition],
    fallback_plan: ExecutionPlan,
) -> Result<ChainSelectionResult, DecisionError> {
    let raw = extract_json(text).ok_or_else(|| DecisionError::Parse("response contains no JSON object".to_string()))?;
    let has_plan = raw.get("executionPlan").is_some_and(Value::is_object);
    let mut selection: ChainSelectionResult =
        serde_json::from_value(raw).map_err(|e| DecisionError::Parse(e.to_string()))?;

    let known = |id: &str| candidates.iter().any(|c| c.id == id);
    selection.selected_chains.retain(|sel| {
        let keep = known(&sel.chain_id);
        if !keep {
            tracing::warn!(chain_id = %sel.chain_id, "routing selected an unknown chain, dropping it");
        }
        keep
    });
    selection.unselected_chains.retain(|u| known(&u.chain_id));
    for candidate in candidates {
        let mentioned = selection.selected_chains.iter().any(|s| s.chain_id == candidate.id)
            || selection.unselected_chains.iter().any(|u| u.chain_id == candidate.id);
        if !mentioned {
            selection.unselected_chains.push(UnselectedChain {
                chain_id: candidate.id.clone(),
                reasoning: "not selected".to_string(),
            });
        }
    }

    if !has_plan {
        selection.execution_plan = fallback_plan;
    }
    Ok(selection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::memory::ScriptedGenerator;
    use serde_json::json;

    fn agent(chains: Value) -> AgentConfig {
        serde_json::from_value(json!({
            "chains": chains,
            "instructions": "Escalate urgent tickets",
            "executionPlan": { "parallel": false, "maxConcurrency": 2, "continueOnError": true }
        }))
        .unwrap()
    }

    fn chains() -> Value {
        json!([
            { "id": "escalate", "name": "Escalate", "description": "Page the on-call",
              "nodes": [{ "id": "e1", "type": "slack_send_message" }], "edges": [],
              "conditions": [{ "field": "priority", "operator": "equals", "value": "high" }] },
            { "id": "archive", "name": "Archive", "description": "Store for later",
              "nodes": [{ "id": "a1", "type": "template" }], "edges": [],
              "conditions": [{ "field": "priority", "operator": "equals", "value": "low" }] },
            { "id": "log", "name": "Log", "description": "Write to the ticket log",
              "nodes": [{ "id": "l1", "type": "template" }], "edges": [] }
        ])
    }

    #[tokio::test]
    async fn test_prefiltered_chain_absent_from_prompt_and_selection() {
        let generator = ScriptedGenerator::new(vec![Ok(r#"```json
{"selectedChains": [
  {"chainId": "escalate", "reasoning": "urgent", "priority": 1, "confidence": 0.9},
  {"chainId": "archive", "reasoning": "hallucinated", "priority": 2, "confidence": 0.4}
], "reasoning": "high priority"}
```"#
            .to_string())]);

        let selection = analyze_and_route(&generator, &agent(chains()), &json!({ "priority": "high" }), false, 3)
            .await
            .unwrap();

        let prompt = &generator.requests()[0].user_prompt;
        assert!(prompt.contains("id: escalate"));
        assert!(prompt.contains("id: log"));
        assert!(!prompt.contains("archive"));
        assert!(prompt.contains("Escalate urgent tickets"));

        let ids: Vec<&str> = selection.selected_chains.iter().map(|s| s.chain_id.as_str()).collect();
        assert_eq!(ids, vec!["escalate"]);
        assert!(selection.unselected_chains.iter().all(|u| u.chain_id != "archive"));
        assert!(selection.unselected_chains.iter().any(|u| u.chain_id == "log"));
        // No plan in the response: the configured plan applies.
        assert_eq!(selection.execution_plan.max_concurrency, 2);
        assert!(selection.execution_plan.continue_on_error);
    }

    #[tokio::test]
    async fn test_test_mode_selects_candidates_without_model_call() {
        let generator = ScriptedGenerator::new(vec![]);
        let selection = analyze_and_route(&generator, &agent(chains()), &json!({ "priority": "low" }), true, 3)
            .await
            .unwrap();

        assert_eq!(generator.calls(), 0);
        let ids: Vec<&str> = selection.selected_chains.iter().map(|s| s.chain_id.as_str()).collect();
        assert_eq!(ids, vec!["archive", "log"]);
        assert!(selection.selected_chains.iter().all(|s| s.confidence == 1.0));
    }

    #[tokio::test]
    async fn test_no_candidates_short_circuits() {
        let generator = ScriptedGenerator::new(vec![]);
        let config = agent(json!([chains()[0].clone()]));
        let selection = analyze_and_route(&generator, &config, &json!({ "priority": "medium" }), false, 3)
            .await
            .unwrap();
        assert!(selection.selected_chains.is_empty());
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_generation_and_parse_errors() {
        let failing = ScriptedGenerator::failing();
        let err = analyze_and_route(&failing, &agent(chains()), &json!({}), false, 3)
            .await
            .unwrap_err();
        assert!(matches!(err, DecisionError::Generation(_)));

        let rambling = ScriptedGenerator::new(vec![Ok("I think the log chain fits best.".to_string())]);
        let err = analyze_and_route(&rambling, &agent(chains()), &json!({}), false, 3)
            .await
            .unwrap_err();
        assert!(matches!(err, DecisionError::Parse(_)));
    }

    #[test]
    fn test_tracker_rejects_skipping_states() {
        let mut tracker = DecisionTracker::default();
        assert!(!tracker.advance(DecisionState::Executing));
        assert_eq!(tracker.state(), DecisionState::Analyzing);
        assert!(tracker.advance(DecisionState::Selected));
        assert!(tracker.advance(DecisionState::Summarized));
        assert_eq!(tracker.state(), DecisionState::Summarized);
    }
}
