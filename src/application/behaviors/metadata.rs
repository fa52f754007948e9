use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::application::behaviors::string_map;
use crate::domain::manifest::object_field;
use crate::domain::{Behavior, Draft, Scope};

pub const RELEASE_LABEL: &str = "synku/release";
pub const COMPONENT_LABEL: &str = "synku/component";
pub const MANAGED_BY: &str = "synku";

fn merge_strings(target: &mut Map<String, Value>, entries: &BTreeMap<String, String>, overwrite: bool) {
    for (key, value) in entries {
        if overwrite || target.get(key).map_or(true, Value::is_null) {
            target.insert(key.clone(), Value::String(value.clone()));
        }
    }
}

fn set_default(metadata: &mut Map<String, Value>, key: &str, value: String) {
    if metadata.get(key).map_or(true, Value::is_null) {
        metadata.insert(key.to_string(), Value::String(value));
    }
}

fn rename(draft: &mut Draft, f: impl Fn(&str) -> String) {
    let Some(current) = draft.name().map(f) else {
        return;
    };
    draft
        .metadata_mut()
        .insert("name".to_string(), Value::String(current));
}

/// Names unnamed manifests after the component's long name, optionally prefixed.
pub fn default_name(prefix: Option<&str>) -> Behavior {
    let prefix = prefix.map(|p| format!("{p}-")).unwrap_or_default();
    Behavior::new(move |scope: &mut Scope<'_>| {
        let name = format!("{prefix}{}", scope.long_name());
        for draft in scope.drafts_mut() {
            set_default(draft.metadata_mut(), "name", name.clone());
        }
        Ok(())
    })
}

pub fn default_namespace(namespace: &str) -> Behavior {
    let namespace = namespace.to_string();
    Behavior::new(move |scope: &mut Scope<'_>| {
        for draft in scope.drafts_mut() {
            set_default(draft.metadata_mut(), "namespace", namespace.clone());
        }
        Ok(())
    })
}

/// Sets `metadata.name` on every manifest, replacing any existing name.
pub fn explicit_name(name: &str) -> Behavior {
    let name = name.to_string();
    Behavior::new(move |scope: &mut Scope<'_>| {
        for draft in scope.drafts_mut() {
            draft
                .metadata_mut()
                .insert("name".to_string(), Value::String(name.clone()));
        }
        Ok(())
    })
}

/// Prepends `prefix-` to names that are already set.
pub fn name_prefix(prefix: &str) -> Behavior {
    let prefix = prefix.to_string();
    Behavior::new(move |scope: &mut Scope<'_>| {
        for draft in scope.drafts_mut() {
            rename(draft, |name| format!("{prefix}-{name}"));
        }
        Ok(())
    })
}

/// Appends `-suffix` to names that are already set.
pub fn name_suffix(suffix: &str) -> Behavior {
    let suffix = suffix.to_string();
    Behavior::new(move |scope: &mut Scope<'_>| {
        for draft in scope.drafts_mut() {
            rename(draft, |name| format!("{name}-{suffix}"));
        }
        Ok(())
    })
}

fn metadata_map(field: &'static str, entries: BTreeMap<String, String>, overwrite: bool) -> Behavior {
    Behavior::new(move |scope: &mut Scope<'_>| {
        for draft in scope.drafts_mut() {
            let target = object_field(draft.metadata_mut(), field);
            merge_strings(target, &entries, overwrite);
        }
        Ok(())
    })
}

pub fn labels<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Behavior
where
    K: Into<String>,
    V: Into<String>,
{
    metadata_map("labels", string_map(entries), true)
}

pub fn default_labels<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Behavior
where
    K: Into<String>,
    V: Into<String>,
{
    metadata_map("labels", string_map(entries), false)
}

pub fn annotations<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Behavior
where
    K: Into<String>,
    V: Into<String>,
{
    metadata_map("annotations", string_map(entries), true)
}

pub fn default_annotations<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Behavior
where
    K: Into<String>,
    V: Into<String>,
{
    metadata_map("annotations", string_map(entries), false)
}

/// Labels every manifest with the release (root) name and the component's
/// long name, followed by `extra`.
pub fn release_labels<K, V>(extra: impl IntoIterator<Item = (K, V)>) -> Behavior
where
    K: Into<String>,
    V: Into<String>,
{
    let extra = string_map(extra);
    Behavior::new(move |scope: &mut Scope<'_>| {
        let mut entries = BTreeMap::from([
            (RELEASE_LABEL.to_string(), scope.root_name().to_string()),
            (COMPONENT_LABEL.to_string(), scope.long_name().to_string()),
        ]);
        entries.extend(extra.clone());
        for draft in scope.drafts_mut() {
            merge_strings(object_field(draft.metadata_mut(), "labels"), &entries, true);
        }
        Ok(())
    })
}

/// Sets the recommended `app.kubernetes.io/*` labels: `name`, `component`
/// (the long name), `managed-by` and, when given, `version`.
pub fn common_labels(name: &str, version: Option<&str>) -> Behavior {
    let name = name.to_string();
    let version = version.map(str::to_string);
    Behavior::new(move |scope: &mut Scope<'_>| {
        let mut entries = BTreeMap::from([
            ("app.kubernetes.io/name".to_string(), name.clone()),
            ("app.kubernetes.io/component".to_string(), scope.long_name().to_string()),
            ("app.kubernetes.io/managed-by".to_string(), MANAGED_BY.to_string()),
        ]);
        if let Some(version) = &version {
            entries.insert("app.kubernetes.io/version".to_string(), version.clone());
        }
        for draft in scope.drafts_mut() {
            merge_strings(object_field(draft.metadata_mut(), "labels"), &entries, true);
        }
        Ok(())
    })
}
