//! Manifest types and drafts.
//!
//! A manifest type is the constructor contract for one kind of configuration
//! object: it knows its identity ([`ManifestKind`]) and turns a partial
//! specification into a concrete JSON object. Drafts are the constructed objects
//! owned by a component until synthesis.

use std::borrow::Cow;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::domain::error::{DomainError, DomainResult};

/// Identity of a manifest type: the `apiVersion` + `kind` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ManifestKind {
    api_version: Cow<'static, str>,
    kind: Cow<'static, str>,
}

impl ManifestKind {
    pub const fn from_static(api_version: &'static str, kind: &'static str) -> Self {
        Self {
            api_version: Cow::Borrowed(api_version),
            kind: Cow::Borrowed(kind),
        }
    }

    pub fn new(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            api_version: Cow::Owned(api_version.into()),
            kind: Cow::Owned(kind.into()),
        }
    }

    /// Reads the identity declared inside a manifest body.
    pub fn of(body: &Value) -> Option<Self> {
        let api_version = body.get("apiVersion")?.as_str()?;
        let kind = body.get("kind")?.as_str()?;
        Some(Self::new(api_version, kind))
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }
}

impl fmt::Display for ManifestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api_version, self.kind)
    }
}

/// Constructor contract for a manifest shape.
///
/// Two drafts are "the same kind" exactly when their types report equal
/// [`ManifestKind`]s; `find`/`find_all` rely on nothing else.
pub trait ManifestType: Send + Sync {
    fn kind(&self) -> ManifestKind;

    /// Turns a partial specification into a concrete manifest body.
    ///
    /// The default stamps `apiVersion` and `kind` onto an object spec and
    /// rejects specs that are not objects or that declare a different identity.
    fn construct(&self, spec: Value) -> Result<Value, String> {
        construct_object(&self.kind(), spec)
    }
}

/// Default construction shared by the built-in manifest types.
pub fn construct_object(kind: &ManifestKind, spec: Value) -> Result<Value, String> {
    let mut object = match spec {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => return Err(format!("spec must be an object, got {}", type_name(&other))),
    };
    for (field, expected) in [("apiVersion", kind.api_version()), ("kind", kind.kind())] {
        match object.get(field) {
            Some(Value::String(declared)) if declared != expected => {
                return Err(format!("spec declares {field} '{declared}', expected '{expected}'"));
            }
            Some(Value::String(_)) | None => {}
            Some(other) => {
                return Err(format!("{field} must be a string, got {}", type_name(other)));
            }
        }
        object.insert(field.to_string(), Value::String(expected.to_string()));
    }
    Ok(Value::Object(object))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

macro_rules! manifest_types {
    ($($(#[$meta:meta])* $name:ident => ($api:literal, $kind:literal);)*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
            pub struct $name;

            impl $name {
                pub const KIND: ManifestKind = ManifestKind::from_static($api, $kind);
            }

            impl ManifestType for $name {
                fn kind(&self) -> ManifestKind {
                    Self::KIND
                }
            }
        )*
    };
}

manifest_types! {
    /// `v1/ConfigMap`
    ConfigMap => ("v1", "ConfigMap");
    /// `v1/Secret`
    Secret => ("v1", "Secret");
    /// `v1/Service`
    Service => ("v1", "Service");
    /// `v1/Namespace`
    Namespace => ("v1", "Namespace");
    /// `v1/ServiceAccount`
    ServiceAccount => ("v1", "ServiceAccount");
    /// `v1/PersistentVolumeClaim`
    PersistentVolumeClaim => ("v1", "PersistentVolumeClaim");
    /// `apps/v1/Deployment`
    Deployment => ("apps/v1", "Deployment");
    /// `apps/v1/StatefulSet`
    StatefulSet => ("apps/v1", "StatefulSet");
    /// `apps/v1/DaemonSet`
    DaemonSet => ("apps/v1", "DaemonSet");
    /// `batch/v1/Job`
    Job => ("batch/v1", "Job");
    /// `batch/v1/CronJob`
    CronJob => ("batch/v1", "CronJob");
    /// `networking.k8s.io/v1/Ingress`
    Ingress => ("networking.k8s.io/v1", "Ingress");
}

/// Manifest type for any `apiVersion`/`kind` pair without a dedicated type,
/// e.g. custom resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unstructured {
    kind: ManifestKind,
}

impl Unstructured {
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            kind: ManifestKind::new(api_version, kind),
        }
    }
}

impl ManifestType for Unstructured {
    fn kind(&self) -> ManifestKind {
        self.kind.clone()
    }
}

/// A constructed, still mutable manifest owned by a component.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    kind: ManifestKind,
    body: Value,
}

impl Draft {
    /// Invokes `manifest_type` with `spec`.
    ///
    /// Returns the rejection reason when the spec cannot be serialized or the
    /// type refuses it.
    pub fn construct<M, S>(manifest_type: &M, spec: S) -> Result<Self, String>
    where
        M: ManifestType + ?Sized,
        S: Serialize,
    {
        let spec = serde_json::to_value(spec).map_err(|e| e.to_string())?;
        let body = manifest_type.construct(spec)?;
        Ok(Self {
            kind: manifest_type.kind(),
            body,
        })
    }

    pub fn kind(&self) -> &ManifestKind {
        &self.kind
    }

    pub fn is<M: ManifestType + ?Sized>(&self, manifest_type: &M) -> bool {
        self.kind == manifest_type.kind()
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Value {
        &mut self.body
    }

    pub fn into_body(self) -> Value {
        self.body
    }

    /// `metadata.name`, when set to a string.
    pub fn name(&self) -> Option<&str> {
        self.body.pointer("/metadata/name")?.as_str()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.body.pointer("/metadata/namespace")?.as_str()
    }

    /// The `metadata` object, created if missing.
    pub fn metadata_mut(&mut self) -> &mut Map<String, Value> {
        object_field(ensure_object(&mut self.body), "metadata")
    }

    /// Edits the body through a typed view.
    ///
    /// The body is deserialized into `T`, handed to `edit`, and serialized back.
    pub fn edit_as<T, F>(&mut self, edit: F) -> DomainResult<()>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut T),
    {
        let target = std::any::type_name::<T>();
        let conversion = |reason: String| DomainError::DraftConversion {
            kind: self.kind.to_string(),
            target,
            reason,
        };
        let mut typed: T =
            serde_json::from_value(self.body.clone()).map_err(|e| conversion(e.to_string()))?;
        edit(&mut typed);
        let body = serde_json::to_value(&typed).map_err(|e| conversion(e.to_string()))?;
        self.body = body;
        Ok(())
    }
}

/// Returns `value` as an object, replacing any non-object value with `{}`.
pub fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just made an object"),
    }
}

/// The object stored under `key`, created (or replaced, if not an object) on demand.
pub fn object_field<'a>(map: &'a mut Map<String, Value>, key: &str) -> &'a mut Map<String, Value> {
    ensure_object(map.entry(key).or_insert_with(|| Value::Object(Map::new())))
}
