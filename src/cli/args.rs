//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};

use crate::config::{expand_path, Settings};

/// Synthesize Kubernetes manifests from a component tree
#[derive(Parser, Debug)]
#[command(name = "synku")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug level: -d (info), -dd (debug), -ddd (trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub debug: u8,

    /// Project directory (default: cwd)
    #[arg(short = 'C', long, global = true, value_hint = ValueHint::DirPath)]
    pub project_dir: Option<PathBuf>,

    /// Annotate output with the provenance of every change
    #[arg(long, global = true)]
    pub trace: bool,

    /// Synthesize sibling subtrees concurrently
    #[arg(long, global = true)]
    pub parallel: bool,

    /// Rename colliding manifests instead of failing validation
    #[arg(long, global = true)]
    pub resolve_collisions: bool,

    /// Also require security contexts and resource requests/limits
    #[arg(long, global = true)]
    pub strict: bool,

    /// Write manifests to FILE instead of stdout
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    /// Set a release context value
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_val, global = true)]
    pub set: Vec<(String, String)>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Synthesize and print all manifests (default)
    Synth,

    /// Show the component hierarchy
    Tree,

    /// Synthesize and check the manifests for collisions and missing fields
    Validate,

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,
    /// Print a commented template config
    Template,
    /// Show config file locations
    Path,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' in '{s}'"))?;
    if key.trim().is_empty() {
        return Err(format!("invalid KEY=VALUE: empty key in '{s}'"));
    }
    Ok((key.trim().to_string(), value.to_string()))
}

impl Cli {
    /// The subcommand to run; `synth` when none is given.
    pub fn effective_command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Synth)
    }

    /// Command-line flags override every configuration layer.
    pub fn apply(&self, mut settings: Settings) -> Settings {
        if self.trace {
            settings.trace = true;
        }
        if self.parallel {
            settings.parallel = true;
        }
        if self.resolve_collisions {
            settings.resolve_collisions = true;
        }
        if self.strict {
            settings.strict = true;
        }
        if let Some(output) = &self.output {
            settings.output = Some(expand_path(output));
        }
        settings.context.extend(self.set.iter().cloned());
        settings
    }
}
