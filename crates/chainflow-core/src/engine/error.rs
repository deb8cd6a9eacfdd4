//! Engine error type.

use chainflow_types::error::RepositoryError;
use uuid::Uuid;

/// Errors raised while walking a workflow graph or managing a run.
///
/// Run-fatal variants abort the whole run, even from inside a chain.
/// The rest are local to the node that raised them: they become a failed
/// node result and route through `error` edges when the graph has any.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("unknown node type '{node_type}' on node '{node_id}'")]
    UnknownNodeType { node_id: String, node_type: String },

    #[error("malformed graph: {0}")]
    MalformedGraph(String),

    #[error("script execution failed: {0}")]
    ScriptExecution(String),

    #[error("loop target is not an array: {0}")]
    LoopTargetNotArray(String),

    #[error("invalid config for node '{node_id}': {message}")]
    InvalidConfig { node_id: String, message: String },

    #[error("chain nesting depth {depth} exceeds maximum {max}")]
    DepthExceeded { depth: usize, max: usize },

    #[error("execution cancelled")]
    Cancelled,

    #[error("execution exceeded its {0}s time budget")]
    Timeout(u64),

    #[error("execution not found: {0}")]
    RunNotFound(Uuid),

    #[error("execution {0} is not paused")]
    NotPaused(Uuid),

    #[error("invalid pause token for execution {0}")]
    InvalidPauseToken(Uuid),

    #[error("stored context for execution {0} could not be restored: {1}")]
    CorruptCheckpoint(Uuid, String),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl EngineError {
    /// True for errors that end the run regardless of `error` edges or
    /// chain-level `continue_on_error`.
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::UnknownNodeType { .. }
                | EngineError::MalformedGraph(_)
                | EngineError::LoopTargetNotArray(_)
                | EngineError::DepthExceeded { .. }
                | EngineError::Cancelled
                | EngineError::Timeout(_)
                | EngineError::CorruptCheckpoint(..)
                | EngineError::Repository(_)
        )
    }

    /// Short machine-readable name, surfaced in summary `details`.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::UnknownNodeType { .. } => "unknown_node_type",
            EngineError::MalformedGraph(_) => "malformed_graph",
            EngineError::ScriptExecution(_) => "script_execution",
            EngineError::LoopTargetNotArray(_) => "loop_target_not_array",
            EngineError::InvalidConfig { .. } => "invalid_config",
            EngineError::DepthExceeded { .. } => "depth_exceeded",
            EngineError::Cancelled => "cancelled",
            EngineError::Timeout(_) => "timeout",
            EngineError::RunNotFound(_) => "run_not_found",
            EngineError::NotPaused(_) => "not_paused",
            EngineError::InvalidPauseToken(_) => "invalid_pause_token",
            EngineError::CorruptCheckpoint(..) => "corrupt_checkpoint",
            EngineError::Repository(_) => "repository",
        }
    }

    pub(crate) fn invalid_config(node_id: &str, message: impl Into<String>) -> Self {
        EngineError::InvalidConfig {
            node_id: node_id.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(EngineError::Cancelled.is_run_fatal());
        assert!(EngineError::MalformedGraph("cycle".into()).is_run_fatal());
        assert!(EngineError::DepthExceeded { depth: 6, max: 5 }.is_run_fatal());
        assert!(EngineError::LoopTargetNotArray("data.items".into()).is_run_fatal());
        assert!(!EngineError::ScriptExecution("bad token".into()).is_run_fatal());
        assert!(!EngineError::invalid_config("n1", "missing field").is_run_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = EngineError::UnknownNodeType {
            node_id: "n7".to_string(),
            node_type: "fax_send".to_string(),
        };
        assert!(err.to_string().contains("fax_send"));
        assert!(err.to_string().contains("n7"));
        assert_eq!(err.kind(), "unknown_node_type");
    }
}
