//! Comment-capable YAML document tree.
//!
//! `serde_yaml` drops comments, so traced output re-parses the rendered
//! manifest into this tree, attaches comments to keys and sequence items, and
//! renders it back in the same block style `serde_yaml` emits.

use serde_yaml::Value as Yaml;

use crate::domain::PathSegment;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Scalar(Yaml),
    Map(Vec<Entry>),
    Seq(Vec<Item>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: String,
    pub comments: Vec<String>,
    pub value: Node,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub comments: Vec<String>,
    pub value: Node,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    comments: Vec<String>,
    root: Node,
}

impl Document {
    pub fn parse(text: &str) -> Result<Self, serde_yaml::Error> {
        let value: Yaml = serde_yaml::from_str(text)?;
        Ok(Self::from_value(value))
    }

    pub fn from_value(value: Yaml) -> Self {
        Self {
            comments: Vec::new(),
            root: Node::from_value(value),
        }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Comments rendered above the document body.
    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    /// Attaches `text` above the key or item at `path`; an empty path targets
    /// the document itself. Returns `false` when `path` does not exist.
    pub fn comment(&mut self, path: &[PathSegment], text: &str) -> bool {
        let Some((last, parent)) = path.split_last() else {
            self.comments.push(text.to_string());
            return true;
        };
        let Some(parent) = self.root.get_mut(parent) else {
            return false;
        };
        let comments = match (parent, last) {
            (Node::Map(entries), PathSegment::Key(key)) => {
                entries.iter_mut().find(|e| e.key == *key).map(|e| &mut e.comments)
            }
            (Node::Seq(items), PathSegment::Index(index)) => {
                items.get_mut(*index).map(|i| &mut i.comments)
            }
            _ => None,
        };
        match comments {
            Some(comments) => {
                comments.push(text.to_string());
                true
            }
            None => false,
        }
    }

    pub fn render(&self) -> Result<String, serde_yaml::Error> {
        let mut out = String::new();
        for comment in &self.comments {
            push_comment(&mut out, 0, comment);
        }
        match &self.root {
            Node::Scalar(value) => {
                out.push_str(&scalar(value, 0)?);
                out.push('\n');
            }
            node if node.is_empty_collection() => {
                out.push_str(node.empty_text());
                out.push('\n');
            }
            node => node.render_block(0, &mut out)?,
        }
        Ok(out)
    }
}

impl Node {
    fn from_value(value: Yaml) -> Self {
        match value {
            Yaml::Mapping(mapping) => Node::Map(
                mapping
                    .into_iter()
                    .map(|(key, value)| Entry {
                        key: key_text(&key),
                        comments: Vec::new(),
                        value: Node::from_value(value),
                    })
                    .collect(),
            ),
            Yaml::Sequence(items) => Node::Seq(
                items
                    .into_iter()
                    .map(|value| Item {
                        comments: Vec::new(),
                        value: Node::from_value(value),
                    })
                    .collect(),
            ),
            Yaml::Tagged(tagged) => Node::from_value(tagged.value),
            scalar => Node::Scalar(scalar),
        }
    }

    fn get_mut(&mut self, path: &[PathSegment]) -> Option<&mut Node> {
        let Some((first, rest)) = path.split_first() else {
            return Some(self);
        };
        let child = match (self, first) {
            (Node::Map(entries), PathSegment::Key(key)) => {
                &mut entries.iter_mut().find(|e| e.key == *key)?.value
            }
            (Node::Seq(items), PathSegment::Index(index)) => &mut items.get_mut(*index)?.value,
            _ => return None,
        };
        child.get_mut(rest)
    }

    fn is_empty_collection(&self) -> bool {
        match self {
            Node::Map(entries) => entries.is_empty(),
            Node::Seq(items) => items.is_empty(),
            Node::Scalar(_) => false,
        }
    }

    fn empty_text(&self) -> &'static str {
        match self {
            Node::Seq(_) => "[]",
            _ => "{}",
        }
    }

    /// Renders a non-empty collection whose lines start at `indent`.
    fn render_block(&self, indent: usize, out: &mut String) -> Result<(), serde_yaml::Error> {
        let pad = " ".repeat(indent);
        match self {
            Node::Map(entries) => {
                for entry in entries {
                    for comment in &entry.comments {
                        push_comment(out, indent, comment);
                    }
                    out.push_str(&pad);
                    out.push_str(&key_literal(&entry.key)?);
                    out.push(':');
                    match &entry.value {
                        Node::Scalar(value) => {
                            out.push(' ');
                            out.push_str(&scalar(value, indent)?);
                            out.push('\n');
                        }
                        node if node.is_empty_collection() => {
                            out.push(' ');
                            out.push_str(node.empty_text());
                            out.push('\n');
                        }
                        node @ Node::Map(_) => {
                            out.push('\n');
                            node.render_block(indent + 2, out)?;
                        }
                        // block sequences sit at their key's indentation
                        node @ Node::Seq(_) => {
                            out.push('\n');
                            node.render_block(indent, out)?;
                        }
                    }
                }
            }
            Node::Seq(items) => {
                for item in items {
                    for comment in &item.comments {
                        push_comment(out, indent, comment);
                    }
                    match &item.value {
                        Node::Scalar(value) => {
                            out.push_str(&pad);
                            out.push_str("- ");
                            out.push_str(&scalar(value, indent)?);
                            out.push('\n');
                        }
                        node if node.is_empty_collection() => {
                            out.push_str(&pad);
                            out.push_str("- ");
                            out.push_str(node.empty_text());
                            out.push('\n');
                        }
                        node => {
                            let mut nested = String::new();
                            node.render_block(indent + 2, &mut nested)?;
                            hoist_into_item(&nested, indent, out);
                        }
                    }
                }
            }
            Node::Scalar(value) => {
                out.push_str(&pad);
                out.push_str(&scalar(value, indent)?);
                out.push('\n');
            }
        }
        Ok(())
    }
}

/// Moves the first content line of `nested` (rendered at `indent + 2`) onto
/// the `- ` marker. Comments above it go before the marker.
fn hoist_into_item(nested: &str, indent: usize, out: &mut String) {
    let pad = " ".repeat(indent);
    let mut hoisted = false;
    for line in nested.lines() {
        if hoisted {
            out.push_str(line);
        } else if line.trim_start().starts_with('#') {
            out.push_str(&pad);
            out.push_str(line.trim_start());
        } else {
            out.push_str(&pad);
            out.push_str("- ");
            out.push_str(&line[(indent + 2).min(line.len())..]);
            hoisted = true;
        }
        out.push('\n');
    }
}

fn push_comment(out: &mut String, indent: usize, text: &str) {
    out.push_str(&" ".repeat(indent));
    out.push('#');
    out.push_str(&text.replace('\n', "\\n"));
    out.push('\n');
}

fn key_text(key: &Yaml) -> String {
    match key {
        Yaml::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Implicit key text. Keys `serde_yaml` would emit as block scalars are
/// written as double-quoted scalars instead.
fn key_literal(key: &str) -> Result<String, serde_yaml::Error> {
    let literal = serde_yaml::to_string(key)?.trim_end().to_string();
    if literal.contains('\n') {
        return Ok(serde_json::Value::String(key.to_string()).to_string());
    }
    Ok(literal)
}

/// `serde_yaml`'s rendering of a scalar; continuation lines of block scalars
/// are shifted to `indent`.
fn scalar(value: &Yaml, indent: usize) -> Result<String, serde_yaml::Error> {
    let text = serde_yaml::to_string(value)?;
    let pad = " ".repeat(indent);
    let mut lines = text.trim_end_matches('\n').lines();
    let mut rendered = lines.next().unwrap_or_default().to_string();
    for line in lines {
        rendered.push('\n');
        if !line.is_empty() {
            rendered.push_str(&pad);
        }
        rendered.push_str(line);
    }
    Ok(rendered)
}
