//! Structural diff between two manifest snapshots.

use std::fmt;

use serde_json::Value;

/// One step of a [`FieldPath`]: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => f.write_str(key),
            PathSegment::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// Location of a field inside a manifest body.
pub type FieldPath = Vec<PathSegment>;

/// Dotted rendering of a path, e.g. `spec.containers.0.image`.
pub fn display_path(path: &[PathSegment]) -> String {
    path.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(".")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffOp {
    Add,
    Update,
    Delete,
}

impl fmt::Display for DiffOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DiffOp::Add => "add",
            DiffOp::Update => "update",
            DiffOp::Delete => "delete",
        })
    }
}

/// A single structural difference.
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    Add {
        path: FieldPath,
        value: Value,
    },
    Update {
        path: FieldPath,
        value: Value,
        old_value: Value,
    },
    Delete {
        path: FieldPath,
        old_value: Value,
    },
}

impl Diff {
    pub fn op(&self) -> DiffOp {
        match self {
            Diff::Add { .. } => DiffOp::Add,
            Diff::Update { .. } => DiffOp::Update,
            Diff::Delete { .. } => DiffOp::Delete,
        }
    }

    pub fn path(&self) -> &[PathSegment] {
        match self {
            Diff::Add { path, .. } | Diff::Update { path, .. } | Diff::Delete { path, .. } => path,
        }
    }
}

/// Computes the differences turning `before` into `after`.
///
/// Objects are compared key by key and arrays index by index; any other
/// mismatch (including a change of type) is an update of the whole value.
/// Newly added non-empty objects are reported leaf by leaf.
pub fn diff(before: &Value, after: &Value) -> Vec<Diff> {
    let mut out = Vec::new();
    let mut path = FieldPath::new();
    diff_into(&mut path, before, after, &mut out);
    out
}

fn diff_into(path: &mut FieldPath, before: &Value, after: &Value, out: &mut Vec<Diff>) {
    match (before, after) {
        (Value::Object(old), Value::Object(new)) => {
            for (key, old_value) in old {
                path.push(PathSegment::Key(key.clone()));
                match new.get(key) {
                    Some(new_value) => diff_into(path, old_value, new_value, out),
                    None => out.push(Diff::Delete {
                        path: path.clone(),
                        old_value: old_value.clone(),
                    }),
                }
                path.pop();
            }
            for (key, new_value) in new.iter().filter(|(key, _)| !old.contains_key(*key)) {
                path.push(PathSegment::Key(key.clone()));
                push_add(path, new_value, out);
                path.pop();
            }
        }
        (Value::Array(old), Value::Array(new)) => {
            for index in 0..old.len().max(new.len()) {
                path.push(PathSegment::Index(index));
                match (old.get(index), new.get(index)) {
                    (Some(o), Some(n)) => diff_into(path, o, n, out),
                    (Some(o), None) => out.push(Diff::Delete {
                        path: path.clone(),
                        old_value: o.clone(),
                    }),
                    (None, Some(n)) => push_add(path, n, out),
                    (None, None) => {}
                }
                path.pop();
            }
        }
        (old, new) if old != new => out.push(Diff::Update {
            path: path.clone(),
            value: new.clone(),
            old_value: old.clone(),
        }),
        _ => {}
    }
}

fn push_add(path: &mut FieldPath, value: &Value, out: &mut Vec<Diff>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, nested) in map {
                path.push(PathSegment::Key(key.clone()));
                push_add(path, nested, out);
                path.pop();
            }
        }
        _ => out.push(Diff::Add {
            path: path.clone(),
            value: value.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keys(path: &[&str]) -> FieldPath {
        path.iter().map(|k| PathSegment::from(*k)).collect()
    }

    #[test]
    fn given_identical_values_when_diffing_then_empty() {
        let v = json!({"a": [1, {"b": null}], "c": "d"});
        assert!(diff(&v, &v.clone()).is_empty());
    }

    #[test]
    fn given_absent_nested_field_when_added_then_single_leaf_add() {
        let before = json!({"kind": "ConfigMap"});
        let after = json!({"kind": "ConfigMap", "metadata": {"labels": {"team": "x"}}});

        let diffs = diff(&before, &after);

        assert_eq!(
            diffs,
            vec![Diff::Add {
                path: keys(&["metadata", "labels", "team"]),
                value: json!("x"),
            }]
        );
    }

    #[test]
    fn given_removed_key_when_diffing_then_delete_carries_old_value() {
        let before = json!({"data": {"a": "1", "b": "2"}});
        let after = json!({"data": {"a": "1"}});

        let diffs = diff(&before, &after);

        assert_eq!(
            diffs,
            vec![Diff::Delete {
                path: keys(&["data", "b"]),
                old_value: json!("2"),
            }]
        );
    }

    #[test]
    fn given_changed_scalar_and_type_when_diffing_then_updates() {
        let before = json!({"replicas": 1, "selector": {"app": "x"}});
        let after = json!({"replicas": 2, "selector": "none"});

        let diffs = diff(&before, &after);

        assert_eq!(diffs.len(), 2);
        assert!(diffs.iter().all(|d| d.op() == DiffOp::Update));
        assert_eq!(diffs[0].path(), keys(&["replicas"]).as_slice());
        assert_eq!(diffs[1].path(), keys(&["selector"]).as_slice());
    }

    #[test]
    fn given_arrays_of_different_length_when_diffing_then_index_paths() {
        let before = json!({"ports": [80, 443]});
        let after = json!({"ports": [8080]});

        let diffs = diff(&before, &after);

        assert_eq!(diffs.len(), 2);
        assert_eq!(diffs[0].op(), DiffOp::Update);
        assert_eq!(
            diffs[0].path(),
            &[PathSegment::from("ports"), PathSegment::Index(0)]
        );
        assert_eq!(diffs[1].op(), DiffOp::Delete);
        assert_eq!(display_path(diffs[1].path()), "ports.1");
    }

    #[test]
    fn given_empty_object_added_when_diffing_then_reported_whole() {
        let diffs = diff(&json!({}), &json!({"labels": {}}));
        assert_eq!(
            diffs,
            vec![Diff::Add {
                path: keys(&["labels"]),
                value: json!({}),
            }]
        );
    }
}
