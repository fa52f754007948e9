//! Component tree: named nodes owning drafts and behaviors.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use generational_arena::Index;
use serde::Serialize;
use termtree::Tree;
use tracing::{debug, instrument};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::manifest::{Draft, ManifestKind, ManifestType};
use crate::domain::node::{NodeArena, WalkOrder, DEFAULT_MAX_DEPTH};
use crate::domain::trace::Trace;

pub const DEFAULT_SEPARATOR: &str = "-";

/// Handle of a component inside its [`ComponentTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentId(Index);

pub type BehaviorError = Box<dyn Error + Send + Sync>;
pub type BehaviorResult = Result<(), BehaviorError>;

/// A mutation applied to the drafts of a component during synthesis.
#[derive(Clone)]
pub struct Behavior(Arc<dyn Fn(&mut Scope<'_>) -> BehaviorResult + Send + Sync>);

impl Behavior {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut Scope<'_>) -> BehaviorResult + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, scope: &mut Scope<'_>) -> BehaviorResult {
        (self.0)(scope)
    }
}

impl fmt::Debug for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Behavior(..)")
    }
}

/// A behavior together with the location it was registered from.
#[derive(Debug, Clone)]
pub struct TracedBehavior {
    behavior: Behavior,
    trace: Trace,
}

impl TracedBehavior {
    pub fn new(behavior: Behavior, trace: Trace) -> Self {
        Self { behavior, trace }
    }

    pub fn behavior(&self) -> &Behavior {
        &self.behavior
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn apply(&self, scope: &mut Scope<'_>) -> BehaviorResult {
        self.behavior.call(scope)
    }
}

/// Payload of a tree node.
#[derive(Debug, Default)]
pub struct Component {
    drafts: Vec<Draft>,
    behaviors: Vec<TracedBehavior>,
}

impl Component {
    pub fn drafts(&self) -> &[Draft] {
        &self.drafts
    }

    /// Behaviors registered on this component only, in registration order.
    pub fn behaviors(&self) -> &[TracedBehavior] {
        &self.behaviors
    }

    /// First draft created by a type with the same identity as `manifest_type`.
    pub fn find<M: ManifestType + ?Sized>(&self, manifest_type: &M) -> Option<&Draft> {
        let kind = manifest_type.kind();
        self.drafts.iter().find(|d| *d.kind() == kind)
    }

    /// All drafts of `kind`, or every draft when `kind` is `None`.
    pub fn find_all(&self, kind: Option<&ManifestKind>) -> Vec<&Draft> {
        self.drafts
            .iter()
            .filter(|d| kind.map_or(true, |k| d.kind() == k))
            .collect()
    }
}

/// Snapshot of where a component sits in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentInfo {
    pub id: ComponentId,
    pub name: String,
    pub long_name: String,
    pub root_name: String,
    pub depth: usize,
}

/// What a behavior sees while it runs: the component's identity and its
/// working drafts. The draft count is fixed for the duration of the call.
pub struct Scope<'a> {
    info: &'a ComponentInfo,
    drafts: &'a mut [Draft],
}

impl<'a> Scope<'a> {
    pub fn new(info: &'a ComponentInfo, drafts: &'a mut [Draft]) -> Self {
        Self { info, drafts }
    }

    pub fn info(&self) -> &ComponentInfo {
        self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn long_name(&self) -> &str {
        &self.info.long_name
    }

    /// Short name of the tree's root, i.e. the release name.
    pub fn root_name(&self) -> &str {
        &self.info.root_name
    }

    pub fn depth(&self) -> usize {
        self.info.depth
    }

    pub fn drafts(&self) -> &[Draft] {
        &*self.drafts
    }

    pub fn drafts_mut(&mut self) -> &mut [Draft] {
        &mut *self.drafts
    }

    pub fn find<M: ManifestType + ?Sized>(&self, manifest_type: &M) -> Option<&Draft> {
        let kind = manifest_type.kind();
        self.drafts.iter().find(|d| *d.kind() == kind)
    }

    pub fn find_mut<M: ManifestType + ?Sized>(&mut self, manifest_type: &M) -> Option<&mut Draft> {
        let kind = manifest_type.kind();
        self.drafts.iter_mut().find(|d| *d.kind() == kind)
    }

    pub fn find_all_mut(&mut self, kind: Option<&ManifestKind>) -> Vec<&mut Draft> {
        self.drafts
            .iter_mut()
            .filter(|d| kind.map_or(true, |k| d.kind() == k))
            .collect()
    }
}

/// Builds a typed subtree below a freshly added component.
pub trait Blueprint {
    fn build(self, component: &mut ComponentMut<'_>) -> DomainResult<()>;
}

impl<F> Blueprint for F
where
    F: FnOnce(&mut ComponentMut<'_>) -> DomainResult<()>,
{
    fn build(self, component: &mut ComponentMut<'_>) -> DomainResult<()> {
        self(component)
    }
}

/// Hierarchy of components rooted at a single release component.
#[derive(Debug)]
pub struct ComponentTree {
    nodes: NodeArena<Component>,
    root: ComponentId,
    separator: String,
}

impl ComponentTree {
    pub fn new(root_name: &str) -> Self {
        Self::with_options(root_name, DEFAULT_SEPARATOR, DEFAULT_MAX_DEPTH)
    }

    pub fn with_options(root_name: &str, separator: &str, max_depth: usize) -> Self {
        let mut nodes = NodeArena::with_max_depth(max_depth);
        let root = ComponentId(nodes.insert_root(root_name, Component::default()));
        Self {
            nodes,
            root,
            separator: separator.to_string(),
        }
    }

    pub fn root(&self) -> ComponentId {
        self.root
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Appends a new, empty child component to `parent`.
    #[instrument(level = "debug", skip(self))]
    pub fn add(&mut self, parent: ComponentId, name: &str) -> DomainResult<ComponentId> {
        let idx = self.nodes.insert(name, Component::default(), Some(parent.0))?;
        Ok(ComponentId(idx))
    }

    /// Adds a child component and lets `blueprint` populate it.
    pub fn add_blueprint<B: Blueprint>(
        &mut self,
        parent: ComponentId,
        name: &str,
        blueprint: B,
    ) -> DomainResult<ComponentId> {
        let id = self.add(parent, name)?;
        blueprint.build(&mut self.component(id)?)?;
        Ok(id)
    }

    /// Fluent editing handle for `id`.
    pub fn component(&mut self, id: ComponentId) -> DomainResult<ComponentMut<'_>> {
        self.nodes.node(id.0)?;
        Ok(ComponentMut { tree: self, id })
    }

    pub fn get(&self, id: ComponentId) -> DomainResult<&Component> {
        Ok(&self.nodes.node(id.0)?.data)
    }

    pub fn name(&self, id: ComponentId) -> DomainResult<&str> {
        Ok(self.nodes.node(id.0)?.name.as_str())
    }

    /// Names from the root down to `id`, joined with the separator.
    pub fn long_name(&self, id: ComponentId) -> DomainResult<String> {
        Ok(self.nodes.path(id.0)?.join(&self.separator))
    }

    pub fn depth(&self, id: ComponentId) -> DomainResult<usize> {
        self.nodes.depth(id.0)
    }

    pub fn parent(&self, id: ComponentId) -> DomainResult<Option<ComponentId>> {
        Ok(self.nodes.node(id.0)?.parent().map(ComponentId))
    }

    pub fn children(&self, id: ComponentId) -> DomainResult<Vec<ComponentId>> {
        Ok(self
            .nodes
            .node(id.0)?
            .children()
            .iter()
            .copied()
            .map(ComponentId)
            .collect())
    }

    /// Nearest ancestor first.
    pub fn ancestors(&self, id: ComponentId) -> DomainResult<Vec<ComponentId>> {
        Ok(self.nodes.ancestors(id.0)?.into_iter().map(ComponentId).collect())
    }

    pub fn root_of(&self, id: ComponentId) -> DomainResult<ComponentId> {
        self.nodes.root(id.0).map(ComponentId)
    }

    /// Moves `id` below `parent`; `None` detaches it.
    pub fn set_parent(&mut self, id: ComponentId, parent: Option<ComponentId>) -> DomainResult<()> {
        self.nodes.set_parent(id.0, parent.map(|p| p.0))
    }

    /// Component ids of the subtree rooted at `from`, in `order`.
    pub fn walk(&self, from: ComponentId, order: WalkOrder) -> DomainResult<Vec<ComponentId>> {
        let mut ids = Vec::new();
        self.nodes.walk(from.0, order, |idx, _| ids.push(ComponentId(idx)))?;
        Ok(ids)
    }

    pub fn info(&self, id: ComponentId) -> DomainResult<ComponentInfo> {
        let path = self.nodes.path(id.0)?;
        let root_name = path.first().copied().unwrap_or_default().to_string();
        Ok(ComponentInfo {
            id,
            name: self.name(id)?.to_string(),
            long_name: path.join(&self.separator),
            root_name,
            depth: path.len() - 1,
        })
    }

    /// Renders the hierarchy below the root with draft and behavior counts.
    #[instrument(level = "debug", skip(self))]
    pub fn to_tree_string(&self) -> DomainResult<String> {
        Ok(self.subtree(self.root)?.to_string())
    }

    fn subtree(&self, id: ComponentId) -> DomainResult<Tree<String>> {
        let node = self.nodes.node(id.0)?;
        let label = format!(
            "{} (drafts: {}, behaviors: {})",
            node.name,
            node.data.drafts.len(),
            node.data.behaviors.len()
        );
        let leaves = node
            .children()
            .iter()
            .map(|&child| self.subtree(ComponentId(child)))
            .collect::<DomainResult<Vec<_>>>()?;
        Ok(Tree::new(label).with_leaves(leaves))
    }

    fn data_mut(&mut self, id: ComponentId) -> &mut Component {
        match self.nodes.get_mut(id.0) {
            Some(node) => &mut node.data,
            None => unreachable!("component handles are checked on creation"),
        }
    }
}

/// Mutable, chainable view of one component.
pub struct ComponentMut<'a> {
    tree: &'a mut ComponentTree,
    id: ComponentId,
}

impl<'a> ComponentMut<'a> {
    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn tree(&mut self) -> &mut ComponentTree {
        self.tree
    }

    /// Constructs a draft from `spec` and appends it.
    pub fn draft<M, S>(&mut self, manifest_type: &M, spec: S) -> DomainResult<&mut Self>
    where
        M: ManifestType + ?Sized,
        S: Serialize,
    {
        let draft = match Draft::construct(manifest_type, spec) {
            Ok(draft) => draft,
            Err(reason) => {
                return Err(DomainError::ManifestConstruction {
                    component: self.tree.long_name(self.id)?,
                    kind: manifest_type.kind().to_string(),
                    reason,
                })
            }
        };
        debug!(kind = %draft.kind(), "draft added");
        self.tree.data_mut(self.id).drafts.push(draft);
        Ok(self)
    }

    /// Registers a behavior traced to the caller's location.
    #[track_caller]
    pub fn with<F>(&mut self, behavior: F) -> &mut Self
    where
        F: Fn(&mut Scope<'_>) -> BehaviorResult + Send + Sync + 'static,
    {
        self.with_traced(behavior, Trace::caller())
    }

    #[track_caller]
    pub fn with_behavior(&mut self, behavior: Behavior) -> &mut Self {
        self.push_behavior(behavior, Trace::caller())
    }

    /// Registers a behavior with an explicitly supplied trace.
    pub fn with_traced<F>(&mut self, behavior: F, trace: Trace) -> &mut Self
    where
        F: Fn(&mut Scope<'_>) -> BehaviorResult + Send + Sync + 'static,
    {
        self.push_behavior(Behavior::new(behavior), trace)
    }

    fn push_behavior(&mut self, behavior: Behavior, trace: Trace) -> &mut Self {
        debug!(%trace, "behavior registered");
        self.tree
            .data_mut(self.id)
            .behaviors
            .push(TracedBehavior::new(behavior, trace));
        self
    }

    /// Adds a child and returns its id.
    pub fn add(&mut self, name: &str) -> DomainResult<ComponentId> {
        self.tree.add(self.id, name)
    }

    pub fn add_blueprint<B: Blueprint>(&mut self, name: &str, blueprint: B) -> DomainResult<ComponentId> {
        self.tree.add_blueprint(self.id, name, blueprint)
    }

    /// Adds a child and returns an editing handle for it.
    pub fn child(&mut self, name: &str) -> DomainResult<ComponentMut<'_>> {
        let id = self.tree.add(self.id, name)?;
        Ok(ComponentMut {
            tree: &mut *self.tree,
            id,
        })
    }
}
