use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use crate::application::behaviors::string_map;
use crate::domain::manifest::{ensure_object, object_field};
use crate::domain::{Behavior, DaemonSet, Deployment, Draft, ManifestType, Scope, StatefulSet};

pub const MATCH_LABEL: &str = "synku/match";

fn merge_into(target: &mut Map<String, Value>, entries: &BTreeMap<String, String>, overwrite: bool) {
    for (key, value) in entries {
        if overwrite || !target.contains_key(key) {
            target.insert(key.clone(), Value::String(value.clone()));
        }
    }
}

fn fill_missing(target: &mut Map<String, Value>, entries: &Map<String, Value>) {
    for (key, value) in entries {
        if !target.contains_key(key) {
            target.insert(key.clone(), value.clone());
        }
    }
}

fn is_workload(draft: &Draft) -> bool {
    draft.is(&Deployment) || draft.is(&StatefulSet) || draft.is(&DaemonSet)
}

fn containers_mut(draft: &mut Draft) -> Option<&mut Vec<Value>> {
    draft
        .body_mut()
        .pointer_mut("/spec/template/spec/containers")?
        .as_array_mut()
}

/// Adds `labels` to the selector and pod template of every Deployment.
pub fn match_labels<K, V>(labels: impl IntoIterator<Item = (K, V)>) -> Behavior
where
    K: Into<String>,
    V: Into<String>,
{
    let labels = string_map(labels);
    Behavior::new(move |scope: &mut Scope<'_>| {
        for draft in scope.find_all_mut(Some(&Deployment.kind())) {
            let spec = object_field(ensure_object(draft.body_mut()), "spec");
            let selector = object_field(object_field(spec, "selector"), "matchLabels");
            merge_into(selector, &labels, true);
            let template = object_field(object_field(spec, "template"), "metadata");
            merge_into(object_field(template, "labels"), &labels, true);
        }
        Ok(())
    })
}

/// Wires every Deployment to its pods.
///
/// Selector and pod template labels become the manifest's own labels plus
/// `synku/match` (the manifest name, else the long name); labels already on
/// the selector or template win. Unnamed containers are named after the
/// manifest, else the component.
pub fn default_container() -> Behavior {
    Behavior::new(|scope: &mut Scope<'_>| {
        let long_name = scope.long_name().to_string();
        let name = scope.name().to_string();
        for draft in scope.find_all_mut(Some(&Deployment.kind())) {
            let manifest_name = draft.name().map(str::to_string);
            let own_labels = draft
                .body()
                .pointer("/metadata/labels")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            let mut base = own_labels;
            base.insert(
                MATCH_LABEL.to_string(),
                Value::String(manifest_name.clone().unwrap_or_else(|| long_name.clone())),
            );

            let spec = object_field(ensure_object(draft.body_mut()), "spec");
            fill_missing(object_field(object_field(spec, "selector"), "matchLabels"), &base);
            let template = object_field(object_field(spec, "template"), "metadata");
            fill_missing(object_field(template, "labels"), &base);

            let container_name = manifest_name.unwrap_or_else(|| name.clone());
            for container in containers_mut(draft).into_iter().flatten() {
                let container = ensure_object(container);
                if container.get("name").map_or(true, Value::is_null) {
                    container.insert("name".into(), Value::String(container_name.clone()));
                }
            }
        }
        Ok(())
    })
}

/// Fills in container resource requests and limits of Deployments and
/// StatefulSets. Values already set on a container win.
pub fn default_resources<K, V>(
    requests: impl IntoIterator<Item = (K, V)>,
    limits: impl IntoIterator<Item = (K, V)>,
) -> Behavior
where
    K: Into<String>,
    V: Into<String>,
{
    let requests = string_map(requests);
    let limits = string_map(limits);
    Behavior::new(move |scope: &mut Scope<'_>| {
        for draft in scope.drafts_mut() {
            if !(draft.is(&Deployment) || draft.is(&StatefulSet)) {
                continue;
            }
            for container in containers_mut(draft).into_iter().flatten() {
                let resources = object_field(ensure_object(container), "resources");
                if !requests.is_empty() {
                    merge_into(object_field(resources, "requests"), &requests, false);
                }
                if !limits.is_empty() {
                    merge_into(object_field(resources, "limits"), &limits, false);
                }
            }
        }
        Ok(())
    })
}

/// Sets environment variable `name` on every container of every workload,
/// replacing the value of an existing entry.
pub fn container_env(name: &str, value: &str) -> Behavior {
    let name = name.to_string();
    let value = value.to_string();
    Behavior::new(move |scope: &mut Scope<'_>| {
        for draft in scope.drafts_mut() {
            if !is_workload(draft) {
                continue;
            }
            for container in containers_mut(draft).into_iter().flatten() {
                let container = ensure_object(container);
                let env = container
                    .entry("env")
                    .or_insert_with(|| Value::Array(Vec::new()));
                if !env.is_array() {
                    *env = Value::Array(Vec::new());
                }
                let Some(entries) = env.as_array_mut() else {
                    continue;
                };
                match entries
                    .iter_mut()
                    .find(|e| e.get("name").and_then(Value::as_str) == Some(name.as_str()))
                {
                    Some(existing) => {
                        ensure_object(existing).insert("value".into(), Value::String(value.clone()));
                    }
                    None => entries.push(json!({"name": name.clone(), "value": value.clone()})),
                }
            }
        }
        Ok(())
    })
}
