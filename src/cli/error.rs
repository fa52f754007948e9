//! CLI-level errors (wraps infrastructure errors)

use thiserror::Error;

use crate::application::ApplicationError;
use crate::domain::DomainError;
use crate::exitcode;
use crate::infrastructure::InfraError;

/// CLI errors are the top-level error type.
/// These are what get displayed to the user.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Infra(#[from] InfraError),
}

impl From<ApplicationError> for CliError {
    fn from(e: ApplicationError) -> Self {
        Self::Infra(e.into())
    }
}

impl From<DomainError> for CliError {
    fn from(e: DomainError) -> Self {
        Self::Infra(e.into())
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    /// Get the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        let CliError::Infra(e) = self;
        match e {
            InfraError::Io { .. } => exitcode::IOERR,
            InfraError::Render { .. } => exitcode::SOFTWARE,
            InfraError::Application(e) => match e {
                ApplicationError::Config { .. } => exitcode::CONFIG,
                ApplicationError::NamingCollision { .. } | ApplicationError::Validation { .. } => {
                    exitcode::DATAERR
                }
                ApplicationError::Domain(d) if !d.is_structural() => exitcode::DATAERR,
                ApplicationError::Domain(_)
                | ApplicationError::Behavior { .. }
                | ApplicationError::ProvenanceInvariant { .. } => exitcode::SOFTWARE,
            },
        }
    }
}
