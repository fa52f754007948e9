//! Text rendering of a [`Synthesis`].
//!
//! Output layout per synthesized component:
//!
//! ```text
//! ---
//! #>> app-web
//! <manifest 0>
//!
//! ---
//! <manifest 1>
//! #<< app-web
//! ```
//!
//! Components are separated by a blank line; the number of `>`/`<` marks is
//! the component depth plus one.

use std::cmp::Ordering;
use std::io::Write;

use serde_json::Value;
use serde_yaml::{Mapping, Value as Yaml};
use tracing::{instrument, trace};

use crate::application::{StateChange, Synthesis, Synthesized};
use crate::domain::{Diff, FieldPath, PathSegment};
use crate::infrastructure::document::Document;
use crate::infrastructure::error::{InfraError, InfraResult};

pub const DEFAULT_KEY_ORDER: [&str; 6] = ["apiVersion", "kind", "metadata", "name", "labels", "annotations"];

/// Mapping key order: listed keys first in list order, the rest alphabetically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyOrder {
    priority: Vec<String>,
}

impl Default for KeyOrder {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_ORDER)
    }
}

impl KeyOrder {
    pub fn new<S: Into<String>>(priority: impl IntoIterator<Item = S>) -> Self {
        Self {
            priority: priority.into_iter().map(Into::into).collect(),
        }
    }

    fn rank(&self, key: &str) -> Option<usize> {
        self.priority.iter().position(|p| p == key)
    }

    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        match (self.rank(a), self.rank(b)) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.cmp(b),
        }
    }

    /// Converts `value` to YAML with every mapping sorted by this order.
    pub fn apply(&self, value: &Value) -> Yaml {
        match value {
            Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort_by(|a, b| self.compare(a, b));
                let mut mapping = Mapping::new();
                for key in keys {
                    mapping.insert(Yaml::String(key.clone()), self.apply(&map[key]));
                }
                Yaml::Mapping(mapping)
            }
            Value::Array(items) => Yaml::Sequence(items.iter().map(|v| self.apply(v)).collect()),
            Value::String(s) => Yaml::String(s.clone()),
            Value::Bool(b) => Yaml::Bool(*b),
            Value::Number(n) => Yaml::Number(number(n)),
            Value::Null => Yaml::Null,
        }
    }
}

fn number(n: &serde_json::Number) -> serde_yaml::Number {
    if let Some(i) = n.as_i64() {
        i.into()
    } else if let Some(u) = n.as_u64() {
        u.into()
    } else {
        n.as_f64().unwrap_or_default().into()
    }
}

fn render_err(e: serde_yaml::Error) -> InfraError {
    InfraError::Render {
        message: e.to_string(),
    }
}

/// Writes a [`Synthesis`] as a YAML stream.
pub trait ManifestWriter {
    /// YAML text of `synthesized.manifests[index]`, newline-terminated.
    fn render_manifest(&self, synthesized: &Synthesized, index: usize) -> InfraResult<String>;

    #[instrument(level = "debug", skip_all, fields(components = synthesis.len()))]
    fn write(&self, synthesis: &Synthesis, out: &mut dyn Write) -> InfraResult<()> {
        let io = |e| InfraError::io("write manifests", e);
        for (position, synthesized) in synthesis.iter().enumerate() {
            let component = &synthesized.component;
            if position > 0 {
                out.write_all(b"\n\n").map_err(io)?;
            }
            out.write_all(b"---\n").map_err(io)?;
            writeln!(out, "#{} {}", ">".repeat(component.depth + 1), component.long_name)
                .map_err(io)?;
            for index in 0..synthesized.manifests.len() {
                if index > 0 {
                    out.write_all(b"\n---\n").map_err(io)?;
                }
                out.write_all(self.render_manifest(synthesized, index)?.as_bytes())
                    .map_err(io)?;
            }
            writeln!(out, "#{} {}", "<".repeat(component.depth + 1), component.long_name)
                .map_err(io)?;
        }
        Ok(())
    }

    fn render(&self, synthesis: &Synthesis) -> InfraResult<String> {
        let mut buffer = Vec::new();
        self.write(synthesis, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| InfraError::Render {
            message: e.to_string(),
        })
    }
}

/// Plain YAML output.
#[derive(Debug, Clone, Default)]
pub struct Serializer {
    key_order: KeyOrder,
}

impl Serializer {
    pub fn new(key_order: KeyOrder) -> Self {
        Self { key_order }
    }
}

impl ManifestWriter for Serializer {
    fn render_manifest(&self, synthesized: &Synthesized, index: usize) -> InfraResult<String> {
        let manifest = manifest_at(synthesized, index)?;
        serde_yaml::to_string(&self.key_order.apply(manifest)).map_err(render_err)
    }
}

/// YAML output annotated with the provenance of every change.
#[derive(Debug, Clone, Default)]
pub struct TracedSerializer {
    key_order: KeyOrder,
}

impl TracedSerializer {
    pub fn new(key_order: KeyOrder) -> Self {
        Self { key_order }
    }
}

impl ManifestWriter for TracedSerializer {
    fn render_manifest(&self, synthesized: &Synthesized, index: usize) -> InfraResult<String> {
        let manifest = manifest_at(synthesized, index)?;
        let text = serde_yaml::to_string(&self.key_order.apply(manifest)).map_err(render_err)?;
        let mut document = Document::parse(&text).map_err(render_err)?;
        for change in synthesized.changes_for(index) {
            annotate(&mut document, change);
        }
        document.render().map_err(render_err)
    }
}

fn manifest_at(synthesized: &Synthesized, index: usize) -> InfraResult<&Value> {
    synthesized.manifests.get(index).ok_or_else(|| InfraError::Render {
        message: format!(
            "component '{}' has no manifest {index}",
            synthesized.component.long_name
        ),
    })
}

fn annotate(document: &mut Document, change: &StateChange) {
    let trace = &change.trace;
    match &change.diff {
        Diff::Add { path, value } => annotate_add(document, path, value, change),
        Diff::Update { path, value, .. } => {
            attach(document, path, &format!(" update [{}] {trace}", inline(value)));
        }
        Diff::Delete { path, old_value } => {
            let Some((key, parent)) = path.split_last() else {
                return;
            };
            let text = format!(" delete {key} [{}] {trace}", inline(old_value));
            attach(document, parent, &text);
        }
    }
}

fn annotate_add(document: &mut Document, path: &FieldPath, value: &Value, change: &StateChange) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, nested) in map {
                let mut child = path.clone();
                child.push(PathSegment::Key(key.clone()));
                annotate_add(document, &child, nested, change);
            }
        }
        _ => {
            let text = format!(" add [{}] {}", inline(value), change.trace);
            attach(document, path, &text);
        }
    }
}

fn attach(document: &mut Document, path: &[PathSegment], text: &str) {
    if !document.comment(path, text) {
        trace!(path = %crate::domain::display_path(path), "no node for comment");
    }
}

fn inline(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
