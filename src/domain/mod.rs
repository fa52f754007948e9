//! Domain layer: component tree, manifests, traces and diffs
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod component;
pub mod diff;
pub mod error;
pub mod manifest;
pub mod node;
pub mod trace;

pub use component::{
    Behavior, BehaviorError, BehaviorResult, Blueprint, Component, ComponentId, ComponentInfo,
    ComponentMut, ComponentTree, Scope, TracedBehavior, DEFAULT_SEPARATOR,
};
pub use diff::{diff, display_path, Diff, DiffOp, FieldPath, PathSegment};
pub use error::{DomainError, DomainResult};
pub use manifest::{
    ConfigMap, CronJob, DaemonSet, Deployment, Draft, Ingress, Job, ManifestKind, ManifestType,
    Namespace, PersistentVolumeClaim, Secret, Service, ServiceAccount, StatefulSet, Unstructured,
};
pub use node::{NodeArena, TreeNode, WalkOrder, DEFAULT_MAX_DEPTH};
pub use trace::Trace;
