//! Application layer: synthesis, validation and prefab building blocks
//!
//! This layer drives the domain model; it performs no I/O.

pub mod behaviors;
pub mod blueprints;
pub mod collisions;
pub mod error;
pub mod release;
pub mod synthesizer;
pub mod validation;

pub use blueprints::{SimpleApp, SimpleAppOptions};
pub use collisions::resolve_collisions;
pub use error::{ApplicationError, ApplicationResult};
pub use release::{release, release_with};
pub use synthesizer::{effective_behaviors, StateChange, Synthesis, Synthesized, Synthesizer};
pub use validation::{
    basic_validators, production_validators, validate, validate_with, DnsNames, IssueKind,
    NamingCollisions, RequiredLabels, RequiredMetadata, ResourceLimits, SecurityContext, Severity,
    SiblingNames, ValidationIssue, ValidationReport, Validator,
};
