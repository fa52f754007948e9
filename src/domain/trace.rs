//! Source locations attributed to behaviors.
//!
//! A [`Trace`] is taken once, when a behavior is registered on a component, and
//! travels with every change that behavior later produces. Locations come from
//! `#[track_caller]` (see [`Trace::caller`]) or are supplied explicitly through
//! [`Trace::new`] / the [`here!`](crate::here) macro.

use std::fmt;
use std::panic::Location;
use std::path::Path;

use crate::domain::error::{DomainError, DomainResult};
use crate::util::path::relative_to_cwd;

/// Immutable call-site location of a behavior registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Trace {
    file: String,
    line: u32,
    column: u32,
    relative_file: String,
}

impl Trace {
    /// Builds a trace from an explicitly provided location.
    ///
    /// Fails when the location cannot identify a source line: an empty file or
    /// line 0.
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> DomainResult<Self> {
        let file = file.into();
        if file.trim().is_empty() {
            return Err(DomainError::TraceCapture {
                reason: "empty source file".to_string(),
            });
        }
        if line == 0 {
            return Err(DomainError::TraceCapture {
                reason: format!("invalid line 0 in {file}"),
            });
        }
        Ok(Self::from_parts(file, line, column))
    }

    /// Location of the code that called the current `#[track_caller]` chain.
    #[track_caller]
    pub fn caller() -> Self {
        Self::from_location(Location::caller())
    }

    pub fn from_location(location: &Location<'_>) -> Self {
        Self::from_parts(location.file().to_string(), location.line(), location.column())
    }

    fn from_parts(file: String, line: u32, column: u32) -> Self {
        let relative_file = relative_to_cwd(Path::new(&file));
        Self {
            file,
            line,
            column,
            relative_file,
        }
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    /// File path relative to the working directory when the trace was taken.
    pub fn relative_file(&self) -> &str {
        &self.relative_file
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.relative_file, self.line)
    }
}

/// Captures the invocation site as a `Result<Trace, DomainError>`.
///
/// ```
/// let trace = synku::here!().unwrap();
/// assert!(trace.line() > 0);
/// ```
#[macro_export]
macro_rules! here {
    () => {
        $crate::domain::Trace::new(file!(), line!(), column!())
    };
}
