//! Post-synthesis checks over the produced manifests and the tree shape.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use itertools::Itertools;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::application::error::{ApplicationError, ApplicationResult};
use crate::application::synthesizer::Synthesis;
use crate::domain::{ComponentTree, WalkOrder};

static DNS_SUBDOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$").unwrap()
});

const MAX_NAME_LEN: usize = 253;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    NamingCollision,
    MissingName,
    MissingApiVersion,
    MissingKind,
    InvalidName,
    DuplicateSibling,
    MissingLabel,
    MissingSecurityContext,
    MissingResourceLimits,
    MissingResourceRequests,
    /// Raised by a caller-supplied validator.
    Custom(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub severity: Severity,
    /// Long names of the components involved.
    pub components: Vec<String>,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.message, self.components.join(", "))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    /// No issue of [`Severity::Error`].
    pub fn is_valid(&self) -> bool {
        self.errors().next().is_none()
    }

    /// Collisions become [`ApplicationError::NamingCollision`], other errors
    /// [`ApplicationError::Validation`]. Warnings never fail.
    pub fn into_result(self) -> ApplicationResult<()> {
        let (collisions, others): (Vec<_>, Vec<_>) = self
            .issues
            .into_iter()
            .filter(|i| i.severity == Severity::Error)
            .partition(|i| i.kind == IssueKind::NamingCollision);
        if !collisions.is_empty() {
            return Err(ApplicationError::NamingCollision {
                message: collisions.iter().join("; "),
            });
        }
        if !others.is_empty() {
            return Err(ApplicationError::Validation {
                message: others.iter().join("; "),
            });
        }
        Ok(())
    }
}

/// Identity under which two manifests would clash when applied.
pub(crate) fn manifest_key(manifest: &Value) -> Option<String> {
    let name = manifest.pointer("/metadata/name")?.as_str()?;
    Some(identity(manifest, name))
}

/// `apiVersion/kind/namespace/name` of `manifest` if it were called `name`.
pub(crate) fn identity(manifest: &Value, name: &str) -> String {
    let namespace = manifest
        .pointer("/metadata/namespace")
        .and_then(Value::as_str)
        .unwrap_or("default");
    let field = |key: &str| manifest.get(key).and_then(Value::as_str).unwrap_or("");
    format!("{}/{}/{}/{}", field("apiVersion"), field("kind"), namespace, name)
}

fn missing(manifest: &Value, pointer: &str) -> bool {
    manifest
        .pointer(pointer)
        .and_then(Value::as_str)
        .map_or(true, str::is_empty)
}

fn error(kind: IssueKind, component: &str, message: String) -> ValidationIssue {
    ValidationIssue {
        kind,
        severity: Severity::Error,
        components: vec![component.to_string()],
        message,
    }
}

/// Every manifest together with the long name of its component.
fn manifests(synthesis: &Synthesis) -> impl Iterator<Item = (&str, &Value)> {
    synthesis.iter().flat_map(|s| {
        s.manifests
            .iter()
            .map(move |m| (s.component.long_name.as_str(), m))
    })
}

fn is_workload(manifest: &Value) -> bool {
    matches!(
        manifest.get("kind").and_then(Value::as_str),
        Some("Deployment" | "StatefulSet" | "DaemonSet")
    )
}

fn containers(manifest: &Value) -> impl Iterator<Item = &Value> {
    manifest
        .pointer("/spec/template/spec/containers")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn container_name(container: &Value) -> &str {
    container.get("name").and_then(Value::as_str).unwrap_or("<unnamed>")
}

/// A check over a synthesized release.
///
/// Closures with the same signature as [`Validator::check`] are validators.
pub trait Validator: Send + Sync {
    fn check(&self, tree: &ComponentTree, synthesis: &Synthesis) -> ApplicationResult<Vec<ValidationIssue>>;
}

impl<F> Validator for F
where
    F: Fn(&ComponentTree, &Synthesis) -> ApplicationResult<Vec<ValidationIssue>> + Send + Sync,
{
    fn check(&self, tree: &ComponentTree, synthesis: &Synthesis) -> ApplicationResult<Vec<ValidationIssue>> {
        self(tree, synthesis)
    }
}

/// `metadata.name`, `apiVersion` and `kind` are present.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequiredMetadata;

impl Validator for RequiredMetadata {
    fn check(&self, _: &ComponentTree, synthesis: &Synthesis) -> ApplicationResult<Vec<ValidationIssue>> {
        let mut issues = Vec::new();
        for (component, manifest) in manifests(synthesis) {
            for (pointer, kind, field) in [
                ("/metadata/name", IssueKind::MissingName, "metadata.name"),
                ("/apiVersion", IssueKind::MissingApiVersion, "apiVersion"),
                ("/kind", IssueKind::MissingKind, "kind"),
            ] {
                if missing(manifest, pointer) {
                    issues.push(error(kind, component, format!("manifest is missing required {field}")));
                }
            }
        }
        Ok(issues)
    }
}

/// Names are DNS-1123 subdomains.
#[derive(Debug, Clone, Copy, Default)]
pub struct DnsNames;

impl Validator for DnsNames {
    fn check(&self, _: &ComponentTree, synthesis: &Synthesis) -> ApplicationResult<Vec<ValidationIssue>> {
        Ok(manifests(synthesis)
            .filter_map(|(component, manifest)| {
                let name = manifest.pointer("/metadata/name")?.as_str()?;
                let valid = name.is_empty() || (name.len() <= MAX_NAME_LEN && DNS_SUBDOMAIN.is_match(name));
                (!valid).then(|| {
                    error(
                        IssueKind::InvalidName,
                        component,
                        format!("'{name}' is not a valid DNS-1123 subdomain"),
                    )
                })
            })
            .collect())
    }
}

/// No two manifests share `apiVersion/kind/namespace/name`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NamingCollisions;

impl Validator for NamingCollisions {
    fn check(&self, _: &ComponentTree, synthesis: &Synthesis) -> ApplicationResult<Vec<ValidationIssue>> {
        let mut by_key: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (component, manifest) in manifests(synthesis) {
            if let Some(key) = manifest_key(manifest) {
                by_key.entry(key).or_default().push(component.to_string());
            }
        }
        Ok(by_key
            .into_iter()
            .filter(|(_, components)| components.len() > 1)
            .map(|(key, components)| ValidationIssue {
                kind: IssueKind::NamingCollision,
                severity: Severity::Error,
                components,
                message: format!("multiple manifests share identity {key}"),
            })
            .collect())
    }
}

/// Warns about siblings sharing a component name.
#[derive(Debug, Clone, Copy, Default)]
pub struct SiblingNames;

impl Validator for SiblingNames {
    fn check(&self, tree: &ComponentTree, _: &Synthesis) -> ApplicationResult<Vec<ValidationIssue>> {
        let mut issues = Vec::new();
        for id in tree.walk(tree.root(), WalkOrder::PreOrder)? {
            let names: Vec<&str> = tree
                .children(id)?
                .into_iter()
                .map(|child| tree.name(child))
                .collect::<Result<_, _>>()?;
            for duplicate in names.iter().duplicates() {
                issues.push(ValidationIssue {
                    kind: IssueKind::DuplicateSibling,
                    severity: Severity::Warning,
                    components: vec![tree.long_name(id)?],
                    message: format!("more than one child named '{duplicate}'"),
                });
            }
        }
        Ok(issues)
    }
}

/// Every manifest carries each of the listed labels with a non-empty value.
#[derive(Debug, Clone, Default)]
pub struct RequiredLabels {
    labels: Vec<String>,
}

impl RequiredLabels {
    pub fn new<S: Into<String>>(labels: impl IntoIterator<Item = S>) -> Self {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }
}

impl Validator for RequiredLabels {
    fn check(&self, _: &ComponentTree, synthesis: &Synthesis) -> ApplicationResult<Vec<ValidationIssue>> {
        let mut issues = Vec::new();
        for (component, manifest) in manifests(synthesis) {
            for label in &self.labels {
                let pointer = format!("/metadata/labels/{}", label.replace('~', "~0").replace('/', "~1"));
                if missing(manifest, &pointer) {
                    issues.push(error(
                        IssueKind::MissingLabel,
                        component,
                        format!("missing required label {label}"),
                    ));
                }
            }
        }
        Ok(issues)
    }
}

/// Workload pod templates and their containers set a `securityContext`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityContext;

impl Validator for SecurityContext {
    fn check(&self, _: &ComponentTree, synthesis: &Synthesis) -> ApplicationResult<Vec<ValidationIssue>> {
        let mut issues = Vec::new();
        for (component, manifest) in manifests(synthesis).filter(|(_, m)| is_workload(m)) {
            if let Some(pod) = manifest.pointer("/spec/template/spec") {
                if pod.get("securityContext").is_none() {
                    issues.push(error(
                        IssueKind::MissingSecurityContext,
                        component,
                        "pod template is missing securityContext".to_string(),
                    ));
                }
            }
            for container in containers(manifest) {
                if container.get("securityContext").is_none() {
                    issues.push(error(
                        IssueKind::MissingSecurityContext,
                        component,
                        format!("container '{}' is missing securityContext", container_name(container)),
                    ));
                }
            }
        }
        Ok(issues)
    }
}

/// Workload containers declare resource requests and limits.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceLimits;

impl Validator for ResourceLimits {
    fn check(&self, _: &ComponentTree, synthesis: &Synthesis) -> ApplicationResult<Vec<ValidationIssue>> {
        let mut issues = Vec::new();
        for (component, manifest) in manifests(synthesis).filter(|(_, m)| is_workload(m)) {
            for container in containers(manifest) {
                let name = container_name(container);
                if container.pointer("/resources/limits").is_none() {
                    issues.push(error(
                        IssueKind::MissingResourceLimits,
                        component,
                        format!("container '{name}' is missing resource limits"),
                    ));
                }
                if container.pointer("/resources/requests").is_none() {
                    issues.push(error(
                        IssueKind::MissingResourceRequests,
                        component,
                        format!("container '{name}' is missing resource requests"),
                    ));
                }
            }
        }
        Ok(issues)
    }
}

/// Required metadata, DNS names, naming collisions and sibling names.
pub fn basic_validators() -> Vec<Box<dyn Validator>> {
    vec![
        Box::new(RequiredMetadata),
        Box::new(DnsNames),
        Box::new(NamingCollisions),
        Box::new(SiblingNames),
    ]
}

/// [`basic_validators`] plus security context and resource checks.
pub fn production_validators() -> Vec<Box<dyn Validator>> {
    let mut validators = basic_validators();
    validators.push(Box::new(SecurityContext));
    validators.push(Box::new(ResourceLimits));
    validators
}

/// Runs [`basic_validators`].
pub fn validate(tree: &ComponentTree, synthesis: &Synthesis) -> ApplicationResult<ValidationReport> {
    validate_with(tree, synthesis, &basic_validators())
}

/// Runs `validators` in order and collects their issues in one report.
#[instrument(level = "debug", skip_all, fields(validators = validators.len()))]
pub fn validate_with(
    tree: &ComponentTree,
    synthesis: &Synthesis,
    validators: &[Box<dyn Validator>],
) -> ApplicationResult<ValidationReport> {
    let mut issues = Vec::new();
    for validator in validators {
        issues.extend(validator.check(tree, synthesis)?);
    }
    debug!(issues = issues.len(), "validation complete");
    Ok(ValidationReport { issues })
}
