//! Application-level errors (wraps domain errors)

use thiserror::Error;

use crate::domain::{BehaviorError, DomainError, Trace};

/// Application errors wrap domain errors and add synthesis-level context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("behavior failed in component '{component}' (registered at {trace}): {source}")]
    Behavior {
        component: String,
        trace: Trace,
        #[source]
        source: BehaviorError,
    },

    #[error("provenance lost in component '{component}', manifest {manifest_index}: {reason}")]
    ProvenanceInvariant {
        component: String,
        manifest_index: usize,
        reason: String,
    },

    #[error("naming collision: {message}")]
    NamingCollision { message: String },

    #[error("validation failed: {message}")]
    Validation { message: String },

    #[error("config error: {message}")]
    Config { message: String },
}

impl ApplicationError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
