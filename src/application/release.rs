use std::iter;

use crate::application::behaviors::{chain, default_name, release_labels};
use crate::domain::{ComponentTree, DomainResult, DEFAULT_MAX_DEPTH, DEFAULT_SEPARATOR};

/// A tree whose root names and labels every manifest of the release.
pub fn release(name: &str) -> DomainResult<ComponentTree> {
    release_with(name, DEFAULT_SEPARATOR, DEFAULT_MAX_DEPTH)
}

pub fn release_with(name: &str, separator: &str, max_depth: usize) -> DomainResult<ComponentTree> {
    let mut tree = ComponentTree::with_options(name, separator, max_depth);
    let root = tree.root();
    tree.component(root)?.with_behavior(chain([
        default_name(None),
        release_labels(iter::empty::<(String, String)>()),
    ]));
    Ok(tree)
}
