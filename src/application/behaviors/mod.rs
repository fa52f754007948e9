//! Prefab behaviors.
//!
//! Functions prefixed with `default_` only fill in values that are absent;
//! the others overwrite.

mod metadata;
mod workload;

pub use metadata::{
    annotations, common_labels, default_annotations, default_labels, default_name,
    default_namespace, explicit_name, labels, name_prefix, name_suffix, release_labels,
    COMPONENT_LABEL, MANAGED_BY, RELEASE_LABEL,
};
pub use workload::{container_env, default_container, default_resources, match_labels, MATCH_LABEL};

use std::collections::BTreeMap;

use crate::domain::{Behavior, Scope};

/// Runs `behaviors` in order as a single behavior.
pub fn chain(behaviors: impl IntoIterator<Item = Behavior>) -> Behavior {
    let behaviors: Vec<Behavior> = behaviors.into_iter().collect();
    Behavior::new(move |scope: &mut Scope<'_>| {
        for behavior in &behaviors {
            behavior.call(scope)?;
        }
        Ok(())
    })
}

/// `behavior` when `condition` holds, a no-op otherwise.
pub fn when(condition: bool, behavior: Behavior) -> Behavior {
    if condition {
        behavior
    } else {
        Behavior::new(|_: &mut Scope<'_>| Ok(()))
    }
}

pub(crate) fn string_map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> BTreeMap<String, String>
where
    K: Into<String>,
    V: Into<String>,
{
    entries
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
