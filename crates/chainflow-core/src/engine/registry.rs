//! Node classification and the pluggable action handler registry.
//!
//! Built-in node types (triggers, control flow, AI actions, AI agents) are
//! dispatched by the engine through `NodeKind`. Everything else must be
//! registered as an `ActionHandler` under its node type string.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chainflow_types::workflow::Node;
use serde_json::Value;

use super::context::ExecutionContext;
use crate::handlers::ai_action::AiActionKind;

// ---------------------------------------------------------------------------
// NodeKind
// ---------------------------------------------------------------------------

/// What the engine does with a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Trigger,
    Filter,
    IfCondition,
    Delay,
    Loop,
    VariableSet,
    VariableGet,
    SwitchCase,
    DataTransform,
    Template,
    Javascript,
    TryCatch,
    Retry,
    Hitl,
    AiAction(AiActionKind),
    AiAgent,
    /// Registered external handler.
    Action(String),
    /// Nothing handles this type; fatal for the run.
    Unknown(String),
}

/// Coarse grouping of node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerCategory {
    Trigger,
    Action,
    ControlFlow,
    AiAction,
    AiAgent,
}

impl NodeKind {
    /// Classify a node. Never fails; unhandled types map to `Unknown`.
    pub fn classify(node: &Node, registry: &HandlerRegistry) -> NodeKind {
        if node.is_trigger {
            return NodeKind::Trigger;
        }

        match node.node_type.as_str() {
            "filter" => NodeKind::Filter,
            "if_condition" => NodeKind::IfCondition,
            "delay" => NodeKind::Delay,
            "loop" => NodeKind::Loop,
            "variable_set" => NodeKind::VariableSet,
            "variable_get" => NodeKind::VariableGet,
            "switch_case" => NodeKind::SwitchCase,
            "data_transform" => NodeKind::DataTransform,
            "template" => NodeKind::Template,
            "javascript" => NodeKind::Javascript,
            "try_catch" => NodeKind::TryCatch,
            "retry" => NodeKind::Retry,
            "hitl_conversation" => NodeKind::Hitl,
            "ai_agent" => NodeKind::AiAgent,
            other => {
                if let Some(kind) = AiActionKind::from_node_type(other) {
                    NodeKind::AiAction(kind)
                } else if registry.contains(other) {
                    NodeKind::Action(other.to_string())
                } else {
                    NodeKind::Unknown(other.to_string())
                }
            }
        }
    }

    pub fn category(&self) -> Option<HandlerCategory> {
        match self {
            NodeKind::Trigger => Some(HandlerCategory::Trigger),
            NodeKind::AiAction(_) => Some(HandlerCategory::AiAction),
            NodeKind::AiAgent => Some(HandlerCategory::AiAgent),
            NodeKind::Action(_) => Some(HandlerCategory::Action),
            NodeKind::Unknown(_) => None,
            _ => Some(HandlerCategory::ControlFlow),
        }
    }
}

// ---------------------------------------------------------------------------
// ActionHandler port
// ---------------------------------------------------------------------------

/// Errors returned by external action handlers.
///
/// Never propagated: the engine turns them into `{success: false, error}`.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("provider error: {0}")]
    Provider(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// A pluggable handler for a third-party action node (Slack send, Sheets
/// append, ...). Handlers must not call real APIs when `ctx.test_mode` is set.
///
/// `node.config` has already been through variable resolution.
pub trait ActionHandler: Send + Sync {
    /// Node type this handler serves, e.g. `"slack_send_message"`.
    fn node_type(&self) -> &str;

    fn execute(
        &self,
        node: &Node,
        ctx: &ExecutionContext,
    ) -> impl Future<Output = Result<Value, ActionError>> + Send;
}

/// Object-safe version of [`ActionHandler`] with boxed futures.
pub trait ActionHandlerDyn: Send + Sync {
    fn node_type(&self) -> &str;

    fn execute_boxed<'a>(
        &'a self,
        node: &'a Node,
        ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = Result<Value, ActionError>> + Send + 'a>>;
}

impl<T: ActionHandler> ActionHandlerDyn for T {
    fn node_type(&self) -> &str {
        ActionHandler::node_type(self)
    }

    fn execute_boxed<'a>(
        &'a self,
        node: &'a Node,
        ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = Result<Value, ActionError>> + Send + 'a>> {
        Box::pin(self.execute(node, ctx))
    }
}

/// Type-erased action handler, as stored in the registry.
pub struct BoxActionHandler {
    inner: Box<dyn ActionHandlerDyn + Send + Sync>,
}

impl BoxActionHandler {
    pub fn new<T: ActionHandler + 'static>(handler: T) -> Self {
        Self {
            inner: Box::new(handler),
        }
    }

    pub fn node_type(&self) -> &str {
        self.inner.node_type()
    }

    pub async fn execute(&self, node: &Node, ctx: &ExecutionContext) -> Result<Value, ActionError> {
        self.inner.execute_boxed(node, ctx).await
    }
}

// ---------------------------------------------------------------------------
// HandlerRegistry
// ---------------------------------------------------------------------------

/// String-keyed registry of external action handlers.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<BoxActionHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its `node_type()`. Replaces any previous one.
    pub fn register<T: ActionHandler + 'static>(&mut self, handler: T) {
        let boxed = BoxActionHandler::new(handler);
        let node_type = boxed.node_type().to_string();
        tracing::debug!(node_type = %node_type, "registered action handler");
        self.handlers.insert(node_type, Arc::new(boxed));
    }

    pub fn get(&self, node_type: &str) -> Option<Arc<BoxActionHandler>> {
        self.handlers.get(node_type).cloned()
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.handlers.contains_key(node_type)
    }

    /// Registered node types, sorted.
    pub fn node_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }
}
