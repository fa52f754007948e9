//! Command dispatch

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::{generate, Shell};
use tracing::{debug, info, instrument};

use crate::application::{
    basic_validators, production_validators, validate_with, ApplicationResult, RequiredLabels,
    Severity, Synthesis, Synthesizer, ValidationReport, Validator,
};
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::error::CliResult;
use crate::cli::output;
use crate::config::{global_config_path, project_config_path, Settings};
use crate::domain::ComponentTree;
use crate::infrastructure::{InfraError, KeyOrder, ManifestWriter, Serializer, TracedSerializer};
use crate::util::path::relative_to_cwd;

/// Run `cli` against the tree produced by `build`.
pub fn execute<F>(cli: &Cli, build: F) -> CliResult<()>
where
    F: FnOnce(&Settings) -> ApplicationResult<ComponentTree>,
{
    let command = cli.effective_command();
    if let Commands::Completion { shell } = command {
        completion(shell);
        return Ok(());
    }

    let project_dir = resolve_project_dir(cli.project_dir.as_deref())?;
    let settings = cli.apply(Settings::load(Some(&project_dir))?);
    debug!(?settings, "effective settings");

    match command {
        Commands::Synth => cmd_synth(&build(&settings)?, &settings),
        Commands::Tree => cmd_tree(&build(&settings)?),
        Commands::Validate => cmd_validate(&build(&settings)?, &settings),
        Commands::Config { command } => cmd_config(&command, &settings, &project_dir),
        Commands::Completion { .. } => Ok(()),
    }
}

fn resolve_project_dir(dir: Option<&Path>) -> CliResult<PathBuf> {
    match dir {
        Some(dir) => Ok(dir.to_path_buf()),
        None => Ok(std::env::current_dir()
            .map_err(|e| InfraError::io("get current directory", e))?),
    }
}

fn completion(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}

/// The writer selected by `settings.trace`.
pub fn manifest_writer(settings: &Settings) -> Box<dyn ManifestWriter> {
    let key_order = KeyOrder::new(settings.key_order.iter().cloned());
    if settings.trace {
        Box::new(TracedSerializer::new(key_order))
    } else {
        Box::new(Serializer::new(key_order))
    }
}

fn synthesize(tree: &ComponentTree, settings: &Settings) -> ApplicationResult<Synthesis> {
    Synthesizer::new()
        .parallel(settings.parallel)
        .resolve_collisions(settings.resolve_collisions)
        .synth(tree)
}

/// The checks selected by `settings.strict` and `settings.required_labels`.
pub fn validators(settings: &Settings) -> Vec<Box<dyn Validator>> {
    let mut validators = if settings.strict {
        production_validators()
    } else {
        basic_validators()
    };
    if !settings.required_labels.is_empty() {
        validators.push(Box::new(RequiredLabels::new(settings.required_labels.clone())));
    }
    validators
}

fn check(
    tree: &ComponentTree,
    settings: &Settings,
    synthesis: &Synthesis,
) -> ApplicationResult<ValidationReport> {
    validate_with(tree, synthesis, &validators(settings))
}

/// Synthesize and validate `tree`, then render the YAML stream.
#[instrument(level = "debug", skip_all)]
pub fn render_release(tree: &ComponentTree, settings: &Settings) -> CliResult<String> {
    let synthesis = synthesize(tree, settings)?;
    let report = check(tree, settings, &synthesis)?;
    for warning in report.warnings() {
        output::warning(warning);
    }
    report.into_result()?;
    Ok(manifest_writer(settings).render(&synthesis)?)
}

/// Synthesize and validate `tree`, then write the YAML stream to `out`.
///
/// Nothing is written when validation reports an error.
pub fn synth_into(tree: &ComponentTree, settings: &Settings, out: &mut dyn Write) -> CliResult<()> {
    let text = render_release(tree, settings)?;
    out.write_all(text.as_bytes())
        .and_then(|_| out.flush())
        .map_err(|e| InfraError::io("write manifests", e))?;
    Ok(())
}

fn cmd_synth(tree: &ComponentTree, settings: &Settings) -> CliResult<()> {
    match &settings.output {
        Some(path) => {
            // the file is only touched once the release rendered cleanly
            let text = render_release(tree, settings)?;
            fs::write(path, text)
                .map_err(|e| InfraError::io(format!("write {}", path.display()), e))?;
            info!(path = %path.display(), "manifests written");
            output::success(&format!("wrote {}", relative_to_cwd(path)));
            Ok(())
        }
        None => synth_into(tree, settings, &mut io::stdout().lock()),
    }
}

fn cmd_tree(tree: &ComponentTree) -> CliResult<()> {
    output::info(&tree.to_tree_string()?.trim_end());
    Ok(())
}

fn cmd_validate(tree: &ComponentTree, settings: &Settings) -> CliResult<()> {
    let synthesis = synthesize(tree, settings)?;
    let report = check(tree, settings, &synthesis)?;

    for issue in report.issues() {
        match issue.severity {
            Severity::Warning => output::warning(issue),
            Severity::Error => output::failure(issue),
        }
    }
    if report.is_valid() {
        let manifests: usize = synthesis.iter().map(|s| s.manifests.len()).sum();
        output::success(&format!(
            "{manifests} manifests in {} components are valid",
            synthesis.len()
        ));
    }
    report.into_result()?;
    Ok(())
}

fn cmd_config(command: &ConfigCommands, settings: &Settings, project_dir: &Path) -> CliResult<()> {
    match command {
        ConfigCommands::Show => output::info(&settings.to_toml()?),
        ConfigCommands::Template => output::info(&Settings::template()),
        ConfigCommands::Path => {
            output::header("Config files (by precedence, lowest first)");
            match global_config_path() {
                Some(path) => output::detail(&describe(&path)),
                None => output::detail(&"global: <no config directory>"),
            }
            output::detail(&describe(&project_config_path(project_dir)));
        }
    }
    Ok(())
}

fn describe(path: &Path) -> String {
    let state = if path.exists() { "found" } else { "not found" };
    format!("{} ({state})", path.display())
}
