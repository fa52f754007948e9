//! Integration tests for synthesis: behavior inheritance, diff attribution and
//! determinism.

use pretty_assertions::assert_eq;
use serde_json::json;

use synku::application::behaviors::{default_labels, labels};
use synku::application::{ApplicationError, Synthesizer};
use synku::domain::{
    display_path, BehaviorResult, ComponentTree, ConfigMap, DiffOp, Scope, Secret, Trace,
};
use synku::util::testing;

fn label_team(scope: &mut Scope<'_>) -> BehaviorResult {
    for draft in scope.drafts_mut() {
        let metadata = draft.metadata_mut();
        let labels = metadata
            .entry("labels")
            .or_insert_with(|| json!({}))
            .as_object_mut()
            .ok_or("labels is not an object")?;
        labels.insert("team".into(), json!("x"));
    }
    Ok(())
}

/// app (ConfigMap) -> a (ConfigMap), b (Secret)
fn three_component_tree() -> ComponentTree {
    let mut tree = ComponentTree::new("app");
    let root = tree.root();
    tree.component(root)
        .unwrap()
        .draft(&ConfigMap, json!({"data": {"k": "v"}}))
        .unwrap();
    tree.component(root)
        .unwrap()
        .child("a")
        .unwrap()
        .draft(&ConfigMap, json!({}))
        .unwrap();
    tree.component(root)
        .unwrap()
        .child("b")
        .unwrap()
        .draft(&Secret, json!({}))
        .unwrap();
    tree
}

#[test]
fn given_nested_components_when_computing_long_name_then_joined_from_root() {
    // Arrange
    let mut tree = ComponentTree::new("app");
    let a = tree.add(tree.root(), "a").unwrap();
    let b = tree.add(a, "b").unwrap();

    // Act / Assert
    assert_eq!(tree.long_name(b).unwrap(), "app-a-b");
    assert_eq!(tree.long_name(tree.root()).unwrap(), "app");
    assert_eq!(tree.depth(b).unwrap(), 2);
}

#[test]
fn given_three_components_with_drafts_when_synthesizing_then_root_first_preorder() {
    testing::init_test_setup();
    // Arrange
    let tree = three_component_tree();

    // Act
    let synthesis = Synthesizer::new().synth(&tree).unwrap();

    // Assert
    let names: Vec<&str> = synthesis
        .iter()
        .map(|s| s.component.long_name.as_str())
        .collect();
    assert_eq!(names, ["app", "app-a", "app-b"]);
    assert!(synthesis.iter().all(|s| s.changes.is_empty()));
    assert_eq!(synthesis[0].manifests[0]["data"]["k"], "v");
}

#[test]
fn given_label_behavior_on_root_when_synthesizing_then_every_manifest_gets_traced_add() {
    // Arrange
    let mut tree = three_component_tree();
    let root = tree.root();
    let expected_line = line!() + 1;
    tree.component(root).unwrap().with(label_team);

    // Act
    let synthesis = Synthesizer::new().synth(&tree).unwrap();

    // Assert
    for synthesized in &synthesis {
        assert_eq!(synthesized.manifests[0]["metadata"]["labels"]["team"], "x");
        assert_eq!(synthesized.changes.len(), 1, "{}", synthesized.component.long_name);
        let change = &synthesized.changes[0];
        assert_eq!(change.diff.op(), DiffOp::Add);
        assert_eq!(display_path(change.diff.path()), "metadata.labels.team");
        assert!(change.trace.file().ends_with("synthesizer_test.rs"));
        assert_eq!(change.trace.line(), expected_line);
    }
}

#[test]
fn given_behavior_removing_field_when_synthesizing_then_delete_diff_with_old_value() {
    // Arrange
    let mut tree = ComponentTree::new("app");
    let root = tree.root();
    tree.component(root)
        .unwrap()
        .draft(&ConfigMap, json!({"data": {"keep": "1", "drop": "2"}}))
        .unwrap()
        .with(|scope| {
            for draft in scope.drafts_mut() {
                if let Some(data) = draft.body_mut()["data"].as_object_mut() {
                    data.remove("drop");
                }
            }
            Ok(())
        });

    // Act
    let synthesis = Synthesizer::new().synth(&tree).unwrap();

    // Assert
    let change = &synthesis[0].changes[0];
    assert_eq!(change.diff.op(), DiffOp::Delete);
    assert_eq!(display_path(change.diff.path()), "data.drop");
    assert!(matches!(
        &change.diff,
        synku::domain::Diff::Delete { old_value, .. } if *old_value == json!("2")
    ));
    assert_eq!(synthesis[0].manifests[0]["data"], json!({"keep": "1"}));
}

#[test]
fn given_overriding_behaviors_on_child_and_root_when_synthesizing_then_root_applies_last() {
    // Arrange
    let mut tree = ComponentTree::new("app");
    let root = tree.root();
    tree.component(root)
        .unwrap()
        .with_behavior(labels([("tier", "root")]));
    tree.component(root)
        .unwrap()
        .child("web")
        .unwrap()
        .draft(&ConfigMap, json!({}))
        .unwrap()
        .with_behavior(labels([("tier", "child")]));

    // Act
    let synthesis = Synthesizer::new().synth(&tree).unwrap();

    // Assert
    assert_eq!(synthesis[0].manifests[0]["metadata"]["labels"]["tier"], "root");
    let ops: Vec<DiffOp> = synthesis[0].changes.iter().map(|c| c.diff.op()).collect();
    assert_eq!(ops, [DiffOp::Add, DiffOp::Update]);
}

#[test]
fn given_default_behavior_on_root_when_child_sets_value_then_child_value_survives() {
    // Arrange
    let mut tree = ComponentTree::new("app");
    let root = tree.root();
    tree.component(root)
        .unwrap()
        .with_behavior(default_labels([("tier", "root")]));
    tree.component(root)
        .unwrap()
        .child("web")
        .unwrap()
        .draft(&ConfigMap, json!({}))
        .unwrap()
        .with_behavior(labels([("tier", "child")]));

    // Act
    let synthesis = Synthesizer::new().synth(&tree).unwrap();

    // Assert
    assert_eq!(synthesis[0].manifests[0]["metadata"]["labels"]["tier"], "child");
    assert_eq!(synthesis[0].changes.len(), 1);
}

#[test]
fn given_same_tree_when_synthesizing_twice_then_identical_results() {
    // Arrange
    let mut tree = three_component_tree();
    let root = tree.root();
    tree.component(root).unwrap().with(label_team);

    // Act
    let first = Synthesizer::new().synth(&tree).unwrap();
    let second = Synthesizer::new().synth(&tree).unwrap();

    // Assert
    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.manifests, b.manifests);
        assert_eq!(a.changes, b.changes);
    }
    // drafts stay untouched
    let root_draft = tree.get(root).unwrap().drafts()[0].body();
    assert!(root_draft.get("metadata").is_none());
}

#[test]
fn given_parallel_mode_when_synthesizing_then_same_output_as_sequential() {
    // Arrange
    let mut tree = three_component_tree();
    let root = tree.root();
    for name in ["c", "d", "e"] {
        tree.component(root)
            .unwrap()
            .child(name)
            .unwrap()
            .draft(&ConfigMap, json!({}))
            .unwrap();
    }
    tree.component(root).unwrap().with(label_team);

    // Act
    let sequential = Synthesizer::new().synth(&tree).unwrap();
    let parallel = Synthesizer::new().parallel(true).synth(&tree).unwrap();

    // Assert
    let names = |s: &synku::application::Synthesis| -> Vec<String> {
        s.iter().map(|c| c.component.long_name.clone()).collect()
    };
    assert_eq!(names(&sequential), names(&parallel));
    for (a, b) in sequential.iter().zip(&parallel) {
        assert_eq!(a.manifests, b.manifests);
        assert_eq!(a.changes, b.changes);
    }
}

#[test]
fn given_failing_behavior_when_synthesizing_then_error_names_component_and_trace() {
    // Arrange
    let mut tree = ComponentTree::new("app");
    let root = tree.root();
    let trace = Trace::new("deploy/app.rs", 12, 5).unwrap();
    tree.component(root)
        .unwrap()
        .child("db")
        .unwrap()
        .draft(&ConfigMap, json!({}))
        .unwrap()
        .with_traced(|_| Err("boom".into()), trace.clone());

    // Act
    let err = Synthesizer::new().synth(&tree).unwrap_err();

    // Assert
    match err {
        ApplicationError::Behavior {
            component,
            trace: failed_at,
            source,
        } => {
            assert_eq!(component, "app-db");
            assert_eq!(failed_at, trace);
            assert_eq!(source.to_string(), "boom");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn given_behavior_replacing_whole_manifest_when_synthesizing_then_provenance_error() {
    // Arrange
    let mut tree = ComponentTree::new("app");
    let root = tree.root();
    tree.component(root)
        .unwrap()
        .draft(&ConfigMap, json!({}))
        .unwrap()
        .with(|scope| {
            for draft in scope.drafts_mut() {
                *draft.body_mut() = json!("replaced");
            }
            Ok(())
        });

    // Act
    let err = Synthesizer::new().synth(&tree).unwrap_err();

    // Assert
    assert!(matches!(
        err,
        ApplicationError::ProvenanceInvariant { manifest_index: 0, .. }
    ));
}

#[test]
fn given_subtree_synthesis_when_ancestor_has_behavior_then_inherited_behavior_applies() {
    // Arrange
    let mut tree = three_component_tree();
    let root = tree.root();
    tree.component(root).unwrap().with(label_team);
    let a = tree.children(root).unwrap()[0];

    // Act
    let synthesis = Synthesizer::new().synth_from(&tree, a).unwrap();

    // Assert
    assert_eq!(synthesis.len(), 1);
    assert_eq!(synthesis[0].component.long_name, "app-a");
    assert_eq!(synthesis[0].manifests[0]["metadata"]["labels"]["team"], "x");
}

#[test]
fn given_component_without_drafts_when_synthesizing_then_absent_from_output() {
    // Arrange
    let mut tree = ComponentTree::new("app");
    let root = tree.root();
    tree.component(root).unwrap().with(|_| Err("never runs".into()));
    tree.add(root, "empty").unwrap();

    // Act
    let synthesis = Synthesizer::new().synth(&tree).unwrap();

    // Assert
    assert!(synthesis.is_empty());
}
