//! Infrastructure layer: rendering synthesized manifests to text

pub mod document;
pub mod error;
pub mod serializer;

pub use document::Document;
pub use error::{InfraError, InfraResult};
pub use serializer::{KeyOrder, ManifestWriter, Serializer, TracedSerializer, DEFAULT_KEY_ORDER};
