//! Integration tests for the command layer.

use std::fs;

use clap::Parser;
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

use synku::application::ApplicationResult;
use synku::cli::{execute, synth_into, Cli, CliError};
use synku::config::Settings;
use synku::domain::{ComponentTree, ConfigMap};
use synku::exitcode;

fn tree(settings: &Settings) -> ComponentTree {
    let mut tree = settings.release("app").unwrap();
    let root = tree.root();
    tree.component(root)
        .unwrap()
        .child("db")
        .unwrap()
        .draft(&ConfigMap, json!({"data": {"url": "postgres"}}))
        .unwrap();
    tree
}

fn render(settings: &Settings) -> String {
    let mut out = Vec::new();
    synth_into(&tree(settings), settings, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn given_default_settings_when_synthesizing_then_plain_yaml_stream() {
    // Arrange
    let settings = Settings::default();

    // Act
    let text = render(&settings);

    // Assert
    assert_eq!(
        text,
        "\
---
#>> app-db
apiVersion: v1
kind: ConfigMap
metadata:
  name: app-db
  labels:
    synku/component: app-db
    synku/release: app
data:
  url: postgres
#<< app-db
"
    );
}

#[test]
fn given_trace_enabled_when_synthesizing_then_output_carries_provenance_comments() {
    // Arrange
    let settings = Settings {
        trace: true,
        ..Settings::default()
    };

    // Act
    let text = render(&settings);

    // Assert
    let comments: Vec<&str> = text
        .lines()
        .filter(|l| l.trim_start().starts_with("# add"))
        .collect();
    assert_eq!(comments.len(), 3, "{text}");
    assert!(comments.iter().all(|c| c.contains("release.rs:")), "{text}");
}

#[test]
fn given_custom_separator_when_synthesizing_then_long_names_use_it() {
    let settings = Settings {
        separator: ".".into(),
        ..Settings::default()
    };

    let text = render(&settings);

    assert!(text.contains("#>> app.db\n"), "{text}");
    assert!(text.contains("  name: app.db\n"), "{text}");
}

#[test]
fn given_output_file_when_writing_then_same_bytes_as_stdout_rendering() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.yaml");
    let settings = Settings::default();

    // Act
    let mut file = fs::File::create(&path).unwrap();
    synth_into(&tree(&settings), &settings, &mut file).unwrap();

    // Assert
    assert_eq!(fs::read_to_string(&path).unwrap(), render(&settings));
}

#[test]
fn given_failing_behavior_when_synthesizing_then_software_exit_code() {
    // Arrange
    let settings = Settings::default();
    let mut tree = tree(&settings);
    let root = tree.root();
    tree.component(root).unwrap().with(|_| Err("boom".into()));

    // Act
    let err: CliError = synth_into(&tree, &settings, &mut Vec::new()).unwrap_err();

    // Assert
    assert_eq!(err.exit_code(), exitcode::SOFTWARE);
    assert!(err.to_string().contains("app-db"), "{err}");
}

#[test]
fn given_naming_collision_when_synthesizing_then_dataerr_and_nothing_written() {
    // Arrange
    let settings = Settings::default();
    let mut tree = tree(&settings);
    let root = tree.root();
    tree.component(root)
        .unwrap()
        .child("cache")
        .unwrap()
        .draft(&ConfigMap, json!({"metadata": {"name": "app-db"}}))
        .unwrap();
    let mut out = Vec::new();

    // Act
    let err = synth_into(&tree, &settings, &mut out).unwrap_err();

    // Assert
    assert_eq!(err.exit_code(), exitcode::DATAERR);
    assert!(out.is_empty());
}

fn colliding(settings: &Settings) -> ApplicationResult<ComponentTree> {
    let mut tree = settings.release("app")?;
    let root = tree.root();
    for name in ["a", "b"] {
        tree.component(root)?
            .child(name)?
            .draft(&ConfigMap, json!({"metadata": {"name": "same"}}))?;
    }
    Ok(tree)
}

#[test]
fn given_existing_output_file_when_validation_fails_then_file_is_untouched() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.yaml");
    fs::write(&path, "previous release\n").unwrap();
    let cli = Cli::parse_from([
        "synku",
        "-C",
        dir.path().to_str().unwrap(),
        "-o",
        path.to_str().unwrap(),
    ]);

    // Act
    let err = execute(&cli, colliding).unwrap_err();

    // Assert
    assert_eq!(err.exit_code(), exitcode::DATAERR);
    assert_eq!(fs::read_to_string(&path).unwrap(), "previous release\n");
}

#[test]
fn given_output_option_when_executing_then_file_holds_rendered_stream() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.yaml");
    let cli = Cli::parse_from([
        "synku",
        "-C",
        dir.path().to_str().unwrap(),
        "-o",
        path.to_str().unwrap(),
    ]);

    // Act
    execute(&cli, |settings: &Settings| Ok(tree(settings))).unwrap();

    // Assert
    assert_eq!(fs::read_to_string(&path).unwrap(), render(&Settings::default()));
}

#[test]
fn given_collision_resolution_enabled_when_synthesizing_then_later_manifest_renamed_with_trace() {
    // Arrange
    let settings = Settings {
        resolve_collisions: true,
        trace: true,
        ..Settings::default()
    };
    let tree = colliding(&settings).unwrap();
    let mut out = Vec::new();

    // Act
    synth_into(&tree, &settings, &mut out).unwrap();

    // Assert
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("  name: same\n"), "{text}");
    assert!(text.contains("  name: same-2\n"), "{text}");
    assert!(
        text.lines()
            .any(|l| l.trim_start().starts_with("# update [same-2]") && l.contains("commands.rs:")),
        "{text}"
    );
}

#[test]
fn given_strict_settings_when_workload_lacks_hardening_then_dataerr() {
    // Arrange
    let settings = Settings {
        strict: true,
        ..Settings::default()
    };
    let mut tree = settings.release("app").unwrap();
    let root = tree.root();
    tree.add_blueprint(root, "web", synku::application::SimpleApp::new("nginx"))
        .unwrap();

    // Act
    let err = synth_into(&tree, &settings, &mut Vec::new()).unwrap_err();

    // Assert
    assert_eq!(err.exit_code(), exitcode::DATAERR);
    assert!(err.to_string().contains("securityContext"), "{err}");
}

#[test]
fn given_required_labels_when_release_labels_present_then_only_missing_label_fails() {
    let mut settings = Settings {
        required_labels: vec!["synku/release".into()],
        ..Settings::default()
    };
    assert!(synth_into(&tree(&settings), &settings, &mut Vec::new()).is_ok());

    settings.required_labels.push("team".into());
    let err = synth_into(&tree(&settings), &settings, &mut Vec::new()).unwrap_err();
    assert!(err.to_string().contains("missing required label team"), "{err}");
}
