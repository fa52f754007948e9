//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent violations while building or inspecting a component tree.
/// These are independent of synthesis, rendering and CLI concerns.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("cycle detected: cannot attach '{node}' below its own descendant '{parent}'")]
    CycleDetected { node: String, parent: String },

    #[error("tree deeper than {limit} levels above '{node}' (corrupt or cyclic tree)")]
    DepthExceeded { node: String, limit: usize },

    #[error("unknown tree node: {0}")]
    UnknownNode(String),

    #[error("failed to construct {kind} in component '{component}': {reason}")]
    ManifestConstruction {
        component: String,
        kind: String,
        reason: String,
    },

    #[error("failed to capture behavior trace: {reason}")]
    TraceCapture { reason: String },

    #[error("{kind} draft cannot be edited as {target}: {reason}")]
    DraftConversion {
        kind: String,
        target: &'static str,
        reason: String,
    },
}

impl DomainError {
    /// Tree shape violations: cycles, runaway depth, dangling ids.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            DomainError::CycleDetected { .. }
                | DomainError::DepthExceeded { .. }
                | DomainError::UnknownNode(_)
        )
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
