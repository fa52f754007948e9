use generational_arena::{Arena, Index};
use tracing::instrument;

use crate::domain::error::{DomainError, DomainResult};

/// Upper bound for parent-link walks before the tree is considered corrupt.
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// Traversal order for [`NodeArena::walk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOrder {
    /// Parent before its children
    PreOrder,
    /// Children before their parent
    PostOrder,
}

/// Tree node in the arena-based hierarchy structure.
#[derive(Debug)]
pub struct TreeNode<T> {
    /// Short name, unique only among siblings
    pub name: String,
    /// Payload carried by this node
    pub data: T,
    parent: Option<Index>,
    children: Vec<Index>,
}

impl<T> TreeNode<T> {
    pub fn parent(&self) -> Option<Index> {
        self.parent
    }

    pub fn children(&self) -> &[Index] {
        &self.children
    }
}

/// Arena-based tree storage.
///
/// Nodes reference each other through generational indices, so parent and
/// children links stay valid without shared ownership. Any node without a
/// parent is a root; detaching a node turns it into the root of its own subtree.
#[derive(Debug)]
pub struct NodeArena<T> {
    arena: Arena<TreeNode<T>>,
    max_depth: usize,
}

impl<T> Default for NodeArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> NodeArena<T> {
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            arena: Arena::new(),
            max_depth,
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Inserts a node and attaches it to `parent` (appended as last child).
    #[instrument(level = "trace", skip(self, data))]
    pub fn insert(&mut self, name: &str, data: T, parent: Option<Index>) -> DomainResult<Index> {
        let Some(parent_idx) = parent else {
            return Ok(self.insert_root(name, data));
        };
        self.node(parent_idx)?;
        let idx = self.arena.insert(TreeNode {
            name: name.to_string(),
            data,
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = self.arena.get_mut(parent_idx) {
            parent.children.push(idx);
        }
        Ok(idx)
    }

    /// Inserts a parentless node.
    pub fn insert_root(&mut self, name: &str, data: T) -> Index {
        self.arena.insert(TreeNode {
            name: name.to_string(),
            data,
            parent: None,
            children: Vec::new(),
        })
    }

    pub fn get(&self, idx: Index) -> Option<&TreeNode<T>> {
        self.arena.get(idx)
    }

    pub fn get_mut(&mut self, idx: Index) -> Option<&mut TreeNode<T>> {
        self.arena.get_mut(idx)
    }

    /// Like [`get`](Self::get), but a missing node is an error.
    pub fn node(&self, idx: Index) -> DomainResult<&TreeNode<T>> {
        self.arena
            .get(idx)
            .ok_or_else(|| DomainError::UnknownNode(format!("{idx:?}")))
    }

    pub fn node_mut(&mut self, idx: Index) -> DomainResult<&mut TreeNode<T>> {
        self.arena
            .get_mut(idx)
            .ok_or_else(|| DomainError::UnknownNode(format!("{idx:?}")))
    }

    /// Moves `idx` below `parent`, or detaches it when `parent` is `None`.
    ///
    /// The node leaves its previous parent's child list first. Re-attaching to
    /// the current parent is a no-op and keeps the sibling position.
    #[instrument(level = "debug", skip(self))]
    pub fn set_parent(&mut self, idx: Index, parent: Option<Index>) -> DomainResult<()> {
        let current = self.node(idx)?.parent;
        if current == parent {
            return Ok(());
        }

        if let Some(new_parent) = parent {
            self.node(new_parent)?;
            if new_parent == idx || self.ancestors(new_parent)?.contains(&idx) {
                return Err(DomainError::CycleDetected {
                    node: self.node(idx)?.name.clone(),
                    parent: self.node(new_parent)?.name.clone(),
                });
            }
        }

        if let Some(old_parent) = current {
            if let Some(old) = self.arena.get_mut(old_parent) {
                old.children.retain(|&child| child != idx);
            }
        }
        self.node_mut(idx)?.parent = parent;
        if let Some(new_parent) = parent {
            self.node_mut(new_parent)?.children.push(idx);
        }
        Ok(())
    }

    /// Ancestors of `idx`, nearest first.
    #[instrument(level = "trace", skip(self))]
    pub fn ancestors(&self, idx: Index) -> DomainResult<Vec<Index>> {
        let mut result = Vec::new();
        let mut current = self.node(idx)?.parent;
        while let Some(parent_idx) = current {
            if result.len() >= self.max_depth {
                return Err(DomainError::DepthExceeded {
                    node: self.node(idx)?.name.clone(),
                    limit: self.max_depth,
                });
            }
            result.push(parent_idx);
            current = self.node(parent_idx)?.parent;
        }
        Ok(result)
    }

    /// Walks parent links up to the node without a parent.
    pub fn root(&self, idx: Index) -> DomainResult<Index> {
        Ok(self.ancestors(idx)?.last().copied().unwrap_or(idx))
    }

    /// 0 for a root, parent depth + 1 otherwise.
    pub fn depth(&self, idx: Index) -> DomainResult<usize> {
        Ok(self.ancestors(idx)?.len())
    }

    /// Names from the root down to `idx` inclusive.
    pub fn path(&self, idx: Index) -> DomainResult<Vec<&str>> {
        let mut names = Vec::new();
        for ancestor in self.ancestors(idx)?.into_iter().rev() {
            names.push(self.node(ancestor)?.name.as_str());
        }
        names.push(self.node(idx)?.name.as_str());
        Ok(names)
    }

    pub fn iter_from(&self, idx: Index) -> TreeIterator<'_, T> {
        TreeIterator::new(self, idx)
    }

    pub fn iter_postorder_from(&self, idx: Index) -> PostOrderIterator<'_, T> {
        PostOrderIterator::new(self, idx)
    }

    /// Visits every node of the subtree rooted at `idx` exactly once.
    pub fn walk<F>(&self, idx: Index, order: WalkOrder, mut visitor: F) -> DomainResult<()>
    where
        F: FnMut(Index, &TreeNode<T>),
    {
        self.node(idx)?;
        match order {
            WalkOrder::PreOrder => self.iter_from(idx).for_each(|(i, n)| visitor(i, n)),
            WalkOrder::PostOrder => self
                .iter_postorder_from(idx)
                .for_each(|(i, n)| visitor(i, n)),
        }
        Ok(())
    }
}

pub struct TreeIterator<'a, T> {
    arena: &'a NodeArena<T>,
    stack: Vec<Index>,
}

impl<'a, T> TreeIterator<'a, T> {
    fn new(arena: &'a NodeArena<T>, start: Index) -> Self {
        Self {
            arena,
            stack: vec![start],
        }
    }
}

impl<'a, T> Iterator for TreeIterator<'a, T> {
    type Item = (Index, &'a TreeNode<T>);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current_idx) = self.stack.pop() {
            if let Some(node) = self.arena.get(current_idx) {
                // Push children in reverse order for left-to-right traversal
                for &child in node.children.iter().rev() {
                    self.stack.push(child);
                }
                return Some((current_idx, node));
            }
        }
        None
    }
}

pub struct PostOrderIterator<'a, T> {
    arena: &'a NodeArena<T>,
    stack: Vec<(Index, bool)>,
}

impl<'a, T> PostOrderIterator<'a, T> {
    fn new(arena: &'a NodeArena<T>, start: Index) -> Self {
        Self {
            arena,
            stack: vec![(start, false)],
        }
    }
}

impl<'a, T> Iterator for PostOrderIterator<'a, T> {
    type Item = (Index, &'a TreeNode<T>);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((current_idx, visited)) = self.stack.pop() {
            if let Some(node) = self.arena.get(current_idx) {
                if !visited {
                    self.stack.push((current_idx, true));
                    for &child in node.children.iter().rev() {
                        self.stack.push((child, false));
                    }
                } else {
                    return Some((current_idx, node));
                }
            }
        }
        None
    }
}
