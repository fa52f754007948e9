//! synku: Kubernetes manifests from a tree of components.
//!
//! Components hold manifest drafts and behaviors. Behaviors registered on a
//! component apply to its own drafts and to every descendant's drafts; the
//! synthesizer records each change a behavior makes together with the source
//! location that registered it, and the traced serializer prints that
//! provenance as YAML comments.
//!
//! ```no_run
//! use serde_json::json;
//! use synku::application::release;
//! use synku::domain::ConfigMap;
//! use synku::application::Synthesizer;
//! use synku::infrastructure::{ManifestWriter, TracedSerializer};
//!
//! let mut tree = release("shop")?;
//! let db = tree.add(tree.root(), "db")?;
//! tree.component(db)?
//!     .draft(&ConfigMap, json!({"data": {"url": "postgres://db"}}))?
//!     .with(|scope| {
//!         for draft in scope.drafts_mut() {
//!             draft.metadata_mut().insert("namespace".into(), json!("shop"));
//!         }
//!         Ok(())
//!     });
//!
//! let synthesis = Synthesizer::new().synth(&tree)?;
//! print!("{}", TracedSerializer::default().render(&synthesis)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;

pub use application::{release, validate, SimpleApp, Synthesizer};
pub use config::Settings;
pub use domain::{Behavior, ComponentTree, Trace};
pub use infrastructure::{ManifestWriter, Serializer, TracedSerializer};
