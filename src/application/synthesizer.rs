//! Synthesis: applies effective behaviors to working copies of each
//! component's drafts and records every resulting field change together with
//! the trace of the behavior that caused it.

use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, instrument, trace};

use crate::application::collisions::resolve_collisions;
use crate::application::error::{ApplicationError, ApplicationResult};
use crate::domain::{
    diff, ComponentId, ComponentInfo, ComponentTree, Diff, Draft, Scope, Trace, TracedBehavior,
};

/// One field change, attributed to the behavior registration that caused it.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub diff: Diff,
    pub trace: Trace,
    /// Position of the affected manifest in the component's draft list.
    pub manifest_index: usize,
}

/// Synthesized output of a single component.
#[derive(Debug, Clone)]
pub struct Synthesized {
    pub component: ComponentInfo,
    pub manifests: Vec<Value>,
    pub changes: Vec<StateChange>,
}

impl Synthesized {
    /// Changes that touched the manifest at `index`, in application order.
    pub fn changes_for(&self, index: usize) -> impl Iterator<Item = &StateChange> {
        self.changes.iter().filter(move |c| c.manifest_index == index)
    }
}

/// Pre-order list of synthesized components; components without drafts are absent.
pub type Synthesis = Vec<Synthesized>;

#[derive(Debug, Clone, Default)]
pub struct Synthesizer {
    parallel: bool,
    /// Where collision resolution was enabled; `None` when disabled.
    collision_trace: Option<Trace>,
}

impl Synthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synthesize sibling subtrees concurrently. Output order is unchanged.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Rename colliding manifests after synthesis (see [`resolve_collisions`]).
    ///
    /// The renames are attributed to the caller of this method.
    #[track_caller]
    pub fn resolve_collisions(mut self, enabled: bool) -> Self {
        self.collision_trace = if enabled { Some(Trace::caller()) } else { None };
        self
    }

    /// Synthesizes the whole tree, root first.
    #[instrument(level = "debug", skip(self, tree), fields(parallel = self.parallel))]
    pub fn synth(&self, tree: &ComponentTree) -> ApplicationResult<Synthesis> {
        self.synth_from(tree, tree.root())
    }

    /// Synthesizes the subtree rooted at `id`.
    ///
    /// Behaviors inherited from ancestors of `id` still apply.
    pub fn synth_from(&self, tree: &ComponentTree, id: ComponentId) -> ApplicationResult<Synthesis> {
        let mut synthesis = Synthesis::new();
        self.synth_subtree(tree, id, &mut synthesis)?;
        if let Some(trace) = &self.collision_trace {
            let renamed = resolve_collisions(&mut synthesis, trace);
            debug!(renamed, "collisions resolved");
        }
        debug!(components = synthesis.len(), "synthesis complete");
        Ok(synthesis)
    }

    fn synth_subtree(
        &self,
        tree: &ComponentTree,
        id: ComponentId,
        out: &mut Synthesis,
    ) -> ApplicationResult<()> {
        if let Some(synthesized) = synth_component(tree, id)? {
            out.push(synthesized);
        }

        let children = tree.children(id)?;
        if self.parallel && children.len() > 1 {
            let subtrees: Vec<ApplicationResult<Synthesis>> = children
                .par_iter()
                .map(|&child| {
                    let mut sub = Synthesis::new();
                    self.synth_subtree(tree, child, &mut sub).map(|_| sub)
                })
                .collect();
            for sub in subtrees {
                out.extend(sub?);
            }
        } else {
            for child in children {
                self.synth_subtree(tree, child, out)?;
            }
        }
        Ok(())
    }
}

/// Own behaviors first, then the parent's, up to the root's.
pub fn effective_behaviors(
    tree: &ComponentTree,
    id: ComponentId,
) -> ApplicationResult<Vec<&TracedBehavior>> {
    let mut behaviors: Vec<&TracedBehavior> = tree.get(id)?.behaviors().iter().collect();
    for ancestor in tree.ancestors(id)? {
        behaviors.extend(tree.get(ancestor)?.behaviors());
    }
    Ok(behaviors)
}

#[instrument(level = "debug", skip(tree))]
fn synth_component(tree: &ComponentTree, id: ComponentId) -> ApplicationResult<Option<Synthesized>> {
    let component = tree.get(id)?;
    let info = tree.info(id)?;
    if component.drafts().is_empty() {
        trace!(component = %info.long_name, "no drafts, skipping");
        return Ok(None);
    }

    let mut drafts: Vec<Draft> = component.drafts().to_vec();
    let mut changes = Vec::new();

    for behavior in effective_behaviors(tree, id)? {
        let before: Vec<Value> = drafts.iter().map(|d| d.body().clone()).collect();

        behavior
            .apply(&mut Scope::new(&info, &mut drafts))
            .map_err(|source| ApplicationError::Behavior {
                component: info.long_name.clone(),
                trace: behavior.trace().clone(),
                source,
            })?;

        let applied = changes.len();
        for (manifest_index, (old, draft)) in before.iter().zip(&drafts).enumerate() {
            for change in diff(old, draft.body()) {
                if change.path().is_empty() {
                    return Err(ApplicationError::ProvenanceInvariant {
                        component: info.long_name.clone(),
                        manifest_index,
                        reason: format!(
                            "behavior at {} replaced the whole manifest, changes cannot be attributed to a field",
                            behavior.trace()
                        ),
                    });
                }
                changes.push(StateChange {
                    diff: change,
                    trace: behavior.trace().clone(),
                    manifest_index,
                });
            }
        }
        debug!(
            component = %info.long_name,
            trace = %behavior.trace(),
            changes = changes.len() - applied,
            "behavior applied"
        );
    }

    Ok(Some(Synthesized {
        component: info,
        manifests: drafts.into_iter().map(Draft::into_body).collect(),
        changes,
    }))
}
