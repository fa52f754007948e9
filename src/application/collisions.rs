//! Renaming of manifests whose identities collide.
//!
//! Collisions span components, so resolution runs over the finished
//! [`Synthesis`] rather than inside a behavior. Renames are still recorded as
//! traced changes and show up in traced output like any behavior edit.

use std::collections::{BTreeMap, HashSet};

use serde_json::Value;
use tracing::{debug, instrument};

use crate::application::synthesizer::{StateChange, Synthesis};
use crate::application::validation::{identity, manifest_key};
use crate::domain::{Diff, PathSegment, Trace};

/// Renames every manifest after the first in each group sharing
/// `apiVersion/kind/namespace/name` to `name-2`, `name-3`, ..., skipping names
/// already taken. Returns the number of renamed manifests.
///
/// Each rename is appended to the owning component's changes as an `update`
/// of `metadata.name` attributed to `trace`.
#[instrument(level = "debug", skip(synthesis))]
pub fn resolve_collisions(synthesis: &mut Synthesis, trace: &Trace) -> usize {
    // (component position, manifest index) per identity, in emission order
    let mut groups: BTreeMap<String, Vec<(usize, usize)>> = BTreeMap::new();
    for (position, synthesized) in synthesis.iter().enumerate() {
        for (index, manifest) in synthesized.manifests.iter().enumerate() {
            if let Some(key) = manifest_key(manifest) {
                groups.entry(key).or_default().push((position, index));
            }
        }
    }
    let mut taken: HashSet<String> = groups.keys().cloned().collect();

    let mut renamed = 0;
    for locations in groups.into_values().filter(|l| l.len() > 1) {
        for (nth, &(position, index)) in locations.iter().enumerate().skip(1) {
            let synthesized = &mut synthesis[position];
            let manifest = &mut synthesized.manifests[index];
            let Some(original) = manifest
                .pointer("/metadata/name")
                .and_then(Value::as_str)
                .map(str::to_string)
            else {
                continue;
            };

            let mut suffix = nth + 1;
            let mut name = format!("{original}-{suffix}");
            while taken.contains(&identity(manifest, &name)) {
                suffix += 1;
                name = format!("{original}-{suffix}");
            }
            taken.insert(identity(manifest, &name));

            if let Some(slot) = manifest.pointer_mut("/metadata/name") {
                *slot = Value::String(name.clone());
            }
            debug!(component = %synthesized.component.long_name, from = %original, to = %name, "renamed");
            synthesized.changes.push(StateChange {
                diff: Diff::Update {
                    path: vec![PathSegment::from("metadata"), PathSegment::from("name")],
                    value: Value::String(name),
                    old_value: Value::String(original),
                },
                trace: trace.clone(),
                manifest_index: index,
            });
            renamed += 1;
        }
    }
    renamed
}
