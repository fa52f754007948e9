//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/synku/synku.toml`
//! 3. Project config: `<project_dir>/synku.toml`
//! 4. Environment variables: `SYNKU_*` prefix

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::{release_with, ApplicationError};
use crate::domain::{ComponentTree, DomainResult, DEFAULT_MAX_DEPTH, DEFAULT_SEPARATOR};
use crate::infrastructure::DEFAULT_KEY_ORDER;

pub const CONFIG_FILE_NAME: &str = "synku.toml";
pub const ENV_PREFIX: &str = "SYNKU";

/// Parses `true/1/yes/y` and `false/0/no/n`, case-insensitively.
pub fn parse_truthy(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Some(true),
        "false" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}

/// Raw settings for intermediate parsing (`None` means "not specified").
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub trace: Option<bool>,
    pub parallel: Option<bool>,
    pub separator: Option<String>,
    pub max_depth: Option<usize>,
    pub key_order: Option<Vec<String>>,
    pub output: Option<PathBuf>,
    pub resolve_collisions: Option<bool>,
    pub strict: Option<bool>,
    pub required_labels: Option<Vec<String>>,
    pub context: Option<BTreeMap<String, String>>,
}

/// Unified configuration for synku.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Annotate output with the provenance of every change
    pub trace: bool,
    /// Synthesize sibling subtrees concurrently
    pub parallel: bool,
    /// Joins component names into long names
    pub separator: String,
    /// Bound for parent-link walks
    pub max_depth: usize,
    /// Mapping keys emitted first, in this order
    pub key_order: Vec<String>,
    /// Output file; stdout when unset
    pub output: Option<PathBuf>,
    /// Rename colliding manifests instead of failing validation
    pub resolve_collisions: bool,
    /// Also require security contexts and resource requests/limits
    pub strict: bool,
    /// Labels every manifest must carry
    pub required_labels: Vec<String>,
    /// Release context handed to the build function
    pub context: BTreeMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            trace: false,
            parallel: false,
            separator: DEFAULT_SEPARATOR.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
            key_order: DEFAULT_KEY_ORDER.iter().map(|k| k.to_string()).collect(),
            output: None,
            resolve_collisions: false,
            strict: false,
            required_labels: Vec::new(),
            context: BTreeMap::new(),
        }
    }
}

/// Get the XDG config directory for synku.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "synku").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Get the path to the config file of a project directory.
pub fn project_config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(CONFIG_FILE_NAME)
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ApplicationError::config(format!("read {}: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| ApplicationError::config(format!("parse {}: {}", path.display(), e)))
}

/// Expand `~`, `$VAR` and `${VAR}`; unresolvable input is returned unchanged.
pub(crate) fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    match shellexpand::full(&raw) {
        Ok(expanded) => PathBuf::from(expanded.into_owned()),
        Err(_) => path.to_path_buf(),
    }
}

impl Settings {
    /// Merge context maps with union semantics and negation support.
    ///
    /// - Entries from overlay are added to (or replace those of) base
    /// - Keys prefixed with `!` remove the corresponding entry
    pub fn merge_context(
        base: &BTreeMap<String, String>,
        overlay: &BTreeMap<String, String>,
    ) -> BTreeMap<String, String> {
        let mut result = base.clone();
        for (key, value) in overlay {
            if let Some(negated) = key.strip_prefix('!') {
                result.remove(negated);
            } else {
                result.insert(key.clone(), value.clone());
            }
        }
        result
    }

    /// Merge project config onto self: scalars override, `context` unions.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            trace: overlay.trace.unwrap_or(self.trace),
            parallel: overlay.parallel.unwrap_or(self.parallel),
            separator: overlay
                .separator
                .clone()
                .unwrap_or_else(|| self.separator.clone()),
            max_depth: overlay.max_depth.unwrap_or(self.max_depth),
            key_order: overlay
                .key_order
                .clone()
                .unwrap_or_else(|| self.key_order.clone()),
            output: overlay.output.clone().or_else(|| self.output.clone()),
            resolve_collisions: overlay.resolve_collisions.unwrap_or(self.resolve_collisions),
            strict: overlay.strict.unwrap_or(self.strict),
            required_labels: overlay
                .required_labels
                .clone()
                .unwrap_or_else(|| self.required_labels.clone()),
            context: overlay
                .context
                .as_ref()
                .map(|o| Self::merge_context(&self.context, o))
                .unwrap_or_else(|| self.context.clone()),
        }
    }

    /// Apply global config onto defaults; every specified field REPLACES.
    fn apply_global(&self, global: &RawSettings) -> Self {
        Self {
            context: global
                .context
                .clone()
                .unwrap_or_else(|| self.context.clone()),
            ..self.merge_with(&RawSettings {
                context: None,
                ..global.clone()
            })
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Precedence (lowest to highest)
    /// 1. Compiled defaults
    /// 2. Global config: `$XDG_CONFIG_HOME/synku/synku.toml` (context REPLACES defaults)
    /// 3. Project config: `<project_dir>/synku.toml` (context UNION with global, `!key` removes)
    /// 4. Environment variables: `SYNKU_*` prefix (REPLACES - explicit override)
    pub fn load(project_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        let global = global_config_path().filter(|p| p.exists());
        let local = project_dir.map(project_config_path).filter(|p| p.exists());
        Self::load_from(global.as_deref(), local.as_deref(), Self::environment())
    }

    /// Layered load from explicit sources.
    pub fn load_from(
        global: Option<&Path>,
        local: Option<&Path>,
        env: Environment,
    ) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(path) = global {
            debug!(path = %path.display(), "loading global config");
            current = current.apply_global(&load_raw_settings(path)?);
        }
        if let Some(path) = local {
            debug!(path = %path.display(), "loading project config");
            current = current.merge_with(&load_raw_settings(path)?);
        }

        current = current.apply_env_overrides(env)?;
        current.output = current.output.as_deref().map(expand_path);
        current.validate()?;
        Ok(current)
    }

    /// The `SYNKU_*` environment source.
    pub fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("key_order")
            .with_list_parse_key("required_labels")
            .try_parsing(true)
    }

    /// Apply environment variables as explicit overrides.
    fn apply_env_overrides(mut self, env: Environment) -> Result<Self, ApplicationError> {
        let config = Config::builder().add_source(env).build().map_err(config_err)?;

        if let Ok(val) = config.get_string("trace") {
            self.trace = truthy("trace", &val)?;
        }
        if let Ok(val) = config.get_string("parallel") {
            self.parallel = truthy("parallel", &val)?;
        }
        if let Ok(val) = config.get_string("separator") {
            self.separator = val;
        }
        if let Ok(val) = config.get_string("max_depth") {
            self.max_depth = val
                .parse()
                .map_err(|e| ApplicationError::config(format!("max_depth '{val}': {e}")))?;
        }
        if let Ok(val) = config.get::<Vec<String>>("key_order") {
            self.key_order = val;
        }
        if let Ok(val) = config.get_string("output") {
            self.output = Some(PathBuf::from(val));
        }
        if let Ok(val) = config.get_string("resolve_collisions") {
            self.resolve_collisions = truthy("resolve_collisions", &val)?;
        }
        if let Ok(val) = config.get_string("strict") {
            self.strict = truthy("strict", &val)?;
        }
        if let Ok(val) = config.get::<Vec<String>>("required_labels") {
            self.required_labels = val;
        }
        if let Ok(table) = config.get_table("context") {
            for (key, value) in table {
                let value = value.into_string().map_err(config_err)?;
                self.context.insert(key, value);
            }
        }
        Ok(self)
    }

    fn validate(&self) -> Result<(), ApplicationError> {
        if self.separator.is_empty() {
            return Err(ApplicationError::config("separator must not be empty"));
        }
        if self.max_depth == 0 {
            return Err(ApplicationError::config("max_depth must be positive"));
        }
        Ok(())
    }

    /// A release tree honoring the configured separator and depth bound.
    pub fn release(&self, name: &str) -> DomainResult<ComponentTree> {
        release_with(name, &self.separator, self.max_depth)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self)
            .map_err(|e| ApplicationError::config(format!("serialize config: {e}")))
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# synku configuration
#
# Locations (by precedence, lowest to highest):
#   Global:  ~/.config/synku/synku.toml   (defines your baseline)
#   Project: <project_dir>/synku.toml     (project-specific settings)
#   Env:     SYNKU_* environment variables (explicit overrides)
#
# Context Merge Semantics:
#   Global context REPLACES the (empty) default.
#   Project context UNIONS with global; use "!key" to REMOVE an inherited entry:
#     [context]
#     "!team" = ""        # drops team from the global context

# Annotate output with the provenance of every change (env: SYNKU_TRACE=yes)
# trace = false

# Synthesize sibling subtrees concurrently
# parallel = false

# Joins component names into long names
# separator = "-"

# Maximum tree depth
# max_depth = 1024

# Mapping keys emitted first (remaining keys are sorted alphabetically)
# key_order = ["apiVersion", "kind", "metadata", "name", "labels", "annotations"]

# Output file (stdout when unset), ~ and $VAR are expanded
# output = "~/manifests/release.yaml"

# Rename colliding manifests (name-2, name-3, ...) instead of failing
# resolve_collisions = false

# Also require pod/container securityContext and resource requests/limits
# strict = false

# Labels every manifest must carry (env: SYNKU_REQUIRED_LABELS=a,b)
# required_labels = ["app.kubernetes.io/name"]

[context]
# Values handed to the build function
# environment = "staging"
"#
        .to_string()
    }
}

fn truthy(field: &str, value: &str) -> Result<bool, ApplicationError> {
    parse_truthy(value).ok_or_else(|| {
        ApplicationError::config(format!("{field}: '{value}' is not a boolean (use yes/no)"))
    })
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::config(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::environment().source(Some(source))
    }

    fn map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn given_no_config_when_loading_then_uses_defaults() {
        let settings = Settings::load_from(None, None, env(&[])).expect("load defaults");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.separator, "-");
        assert_eq!(settings.key_order[0], "apiVersion");
    }

    #[test]
    fn given_truthy_strings_when_parsing_then_recognized() {
        for yes in ["true", "1", "yes", "Y"] {
            assert_eq!(parse_truthy(yes), Some(true), "{yes}");
        }
        for no in ["false", "0", "no", "N"] {
            assert_eq!(parse_truthy(no), Some(false), "{no}");
        }
        assert_eq!(parse_truthy("maybe"), None);
    }

    #[test]
    fn given_env_vars_when_loading_then_override_defaults() {
        let settings = Settings::load_from(
            None,
            None,
            env(&[
                ("SYNKU_TRACE", "yes"),
                ("SYNKU_PARALLEL", "0"),
                ("SYNKU_KEY_ORDER", "kind,apiVersion"),
                ("SYNKU_CONTEXT__ENVIRONMENT", "prod"),
            ]),
        )
        .unwrap();

        assert!(settings.trace);
        assert!(!settings.parallel);
        assert_eq!(settings.key_order, vec!["kind", "apiVersion"]);
        assert_eq!(settings.context.get("environment").map(String::as_str), Some("prod"));
    }

    #[test]
    fn given_validation_env_vars_when_loading_then_applied() {
        let settings = Settings::load_from(
            None,
            None,
            env(&[
                ("SYNKU_STRICT", "yes"),
                ("SYNKU_RESOLVE_COLLISIONS", "1"),
                ("SYNKU_REQUIRED_LABELS", "team,app.kubernetes.io/name"),
            ]),
        )
        .unwrap();

        assert!(settings.strict);
        assert!(settings.resolve_collisions);
        assert_eq!(settings.required_labels, vec!["team", "app.kubernetes.io/name"]);
    }

    #[test]
    fn given_invalid_boolean_env_when_loading_then_config_error() {
        let err = Settings::load_from(None, None, env(&[("SYNKU_TRACE", "maybe")])).unwrap_err();
        assert!(matches!(err, ApplicationError::Config { .. }));
    }

    #[test]
    fn given_tilde_in_output_when_loading_then_expands_to_home() {
        let settings =
            Settings::load_from(None, None, env(&[("SYNKU_OUTPUT", "~/out.yaml")])).unwrap();

        let home = std::env::var("HOME").expect("HOME should be set");
        let output = settings.output.unwrap();
        assert!(output.starts_with(&home), "{}", output.display());
    }

    #[test]
    fn test_merge_context_union_and_negation() {
        let base = map(&[("a", "1"), ("b", "2")]);
        let overlay = map(&[("!a", ""), ("b", "3"), ("c", "4")]);

        let result = Settings::merge_context(&base, &overlay);

        assert_eq!(result, map(&[("b", "3"), ("c", "4")]));
    }

    #[test]
    fn test_merge_context_negation_nonexistent() {
        let base = map(&[("a", "1")]);
        let result = Settings::merge_context(&base, &map(&[("!x", "")]));
        assert_eq!(result, base);
    }

    #[test]
    fn test_apply_global_replaces_context() {
        let base = Settings {
            context: map(&[("a", "1")]),
            ..Settings::default()
        };
        let global = RawSettings {
            context: Some(map(&[("b", "2")])),
            separator: Some(".".into()),
            ..RawSettings::default()
        };

        let result = base.apply_global(&global);

        assert_eq!(result.context, map(&[("b", "2")]));
        assert_eq!(result.separator, ".");
    }

    #[test]
    fn test_merge_with_keeps_base_when_not_specified() {
        let base = Settings {
            trace: true,
            context: map(&[("a", "1")]),
            ..Settings::default()
        };

        let result = base.merge_with(&RawSettings::default());

        assert_eq!(result, base);
    }
}
