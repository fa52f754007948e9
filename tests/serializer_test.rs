//! Integration tests for YAML stream framing and provenance comments.

use pretty_assertions::assert_eq;
use serde_json::json;

use synku::application::behaviors::default_name;
use synku::application::Synthesizer;
use synku::domain::{ComponentTree, ConfigMap, Secret, Trace};
use synku::infrastructure::{KeyOrder, ManifestWriter, Serializer, TracedSerializer};

fn trace(line: u32) -> Trace {
    Trace::new("deploy/app.rs", line, 1).unwrap()
}

#[test]
fn given_two_components_when_serializing_then_framed_with_depth_markers() {
    // Arrange
    let mut tree = ComponentTree::new("app");
    let root = tree.root();
    tree.component(root)
        .unwrap()
        .draft(&ConfigMap, json!({"data": {"mode": "fast"}}))
        .unwrap()
        .with_behavior(default_name(None));
    tree.component(root)
        .unwrap()
        .child("db")
        .unwrap()
        .draft(&ConfigMap, json!({}))
        .unwrap()
        .draft(&Secret, json!({"metadata": {"name": "creds"}}))
        .unwrap();
    let synthesis = Synthesizer::new().synth(&tree).unwrap();

    // Act
    let text = Serializer::default().render(&synthesis).unwrap();

    // Assert
    assert_eq!(
        text,
        "\
---
#> app
apiVersion: v1
kind: ConfigMap
metadata:
  name: app
data:
  mode: fast
#< app


---
#>> app-db
apiVersion: v1
kind: ConfigMap
metadata:
  name: app-db

---
apiVersion: v1
kind: Secret
metadata:
  name: creds
#<< app-db
"
    );
}

#[test]
fn given_custom_key_order_when_serializing_then_listed_keys_first() {
    // Arrange
    let mut tree = ComponentTree::new("app");
    let root = tree.root();
    tree.component(root)
        .unwrap()
        .draft(&ConfigMap, json!({"data": {"b": "2", "a": "1"}, "immutable": true}))
        .unwrap();
    let synthesis = Synthesizer::new().synth(&tree).unwrap();

    // Act
    let text = Serializer::new(KeyOrder::new(["kind", "immutable"]))
        .render(&synthesis)
        .unwrap();

    // Assert
    assert_eq!(
        text,
        "---\n#> app\nkind: ConfigMap\nimmutable: true\napiVersion: v1\ndata:\n  a: '1'\n  b: '2'\n#< app\n"
    );
}

#[test]
fn given_added_label_when_traced_serializing_then_comment_above_leaf() {
    // Arrange
    let mut tree = ComponentTree::new("app");
    let root = tree.root();
    tree.component(root)
        .unwrap()
        .draft(&ConfigMap, json!({}))
        .unwrap()
        .with_traced(
            |scope| {
                for draft in scope.drafts_mut() {
                    draft
                        .metadata_mut()
                        .insert("labels".into(), json!({"team": "x"}));
                }
                Ok(())
            },
            trace(10),
        );
    let synthesis = Synthesizer::new().synth(&tree).unwrap();

    // Act
    let text = TracedSerializer::default().render(&synthesis).unwrap();

    // Assert
    assert_eq!(
        text,
        "\
---
#> app
apiVersion: v1
kind: ConfigMap
metadata:
  labels:
    # add [x] deploy/app.rs:10
    team: x
#< app
"
    );
}

#[test]
fn given_update_and_delete_when_traced_serializing_then_comments_on_key_and_parent() {
    // Arrange
    let mut tree = ComponentTree::new("app");
    let root = tree.root();
    tree.component(root)
        .unwrap()
        .draft(
            &ConfigMap,
            json!({"metadata": {"name": "old"}, "data": {"keep": "k", "drop": "d"}}),
        )
        .unwrap()
        .with_traced(
            |scope| {
                for draft in scope.drafts_mut() {
                    draft.metadata_mut().insert("name".into(), json!("new"));
                    if let Some(data) = draft.body_mut()["data"].as_object_mut() {
                        data.remove("drop");
                    }
                }
                Ok(())
            },
            trace(20),
        );
    let synthesis = Synthesizer::new().synth(&tree).unwrap();

    // Act
    let text = TracedSerializer::default().render(&synthesis).unwrap();

    // Assert
    assert_eq!(
        text,
        "\
---
#> app
apiVersion: v1
kind: ConfigMap
metadata:
  # update [new] deploy/app.rs:20
  name: new
# delete drop [d] deploy/app.rs:20
data:
  keep: k
#< app
"
    );
}

#[test]
fn given_removed_top_level_key_when_traced_serializing_then_comment_on_document() {
    // Arrange
    let mut tree = ComponentTree::new("app");
    let root = tree.root();
    tree.component(root)
        .unwrap()
        .draft(&ConfigMap, json!({"metadata": {"name": "cm"}, "immutable": true}))
        .unwrap()
        .with_traced(
            |scope| {
                for draft in scope.drafts_mut() {
                    if let Some(body) = draft.body_mut().as_object_mut() {
                        body.remove("immutable");
                    }
                }
                Ok(())
            },
            trace(30),
        );
    let synthesis = Synthesizer::new().synth(&tree).unwrap();

    // Act
    let text = TracedSerializer::default().render(&synthesis).unwrap();

    // Assert
    assert_eq!(
        text,
        "\
---
#> app
# delete immutable [true] deploy/app.rs:30
apiVersion: v1
kind: ConfigMap
metadata:
  name: cm
#< app
"
    );
}

#[test]
fn given_no_changes_when_traced_serializing_then_same_as_plain() {
    // Arrange
    let mut tree = ComponentTree::new("app");
    let root = tree.root();
    tree.component(root)
        .unwrap()
        .draft(
            &ConfigMap,
            json!({"metadata": {"name": "cm"}, "data": {"script": "echo a\necho b\n"}}),
        )
        .unwrap();
    let synthesis = Synthesizer::new().synth(&tree).unwrap();

    // Act
    let plain = Serializer::default().render(&synthesis).unwrap();
    let traced = TracedSerializer::default().render(&synthesis).unwrap();

    // Assert
    assert_eq!(plain, traced);
}

#[test]
fn given_empty_synthesis_when_serializing_then_empty_output() {
    let text = Serializer::default().render(&Vec::new()).unwrap();
    assert_eq!(text, "");
}

#[test]
fn given_added_key_with_newline_when_tracing_then_output_parses_back_to_manifest() {
    // Arrange
    let mut tree = ComponentTree::new("app");
    let root = tree.root();
    tree.component(root)
        .unwrap()
        .draft(&ConfigMap, json!({"metadata": {"name": "cfg"}}))
        .unwrap()
        .with(|scope: &mut synku::domain::Scope<'_>| {
            for draft in scope.drafts_mut() {
                draft.body_mut()["data"] = json!({"multi\nline key": "v"});
            }
            Ok(())
        });
    let synthesis = Synthesizer::new().synth(&tree).unwrap();

    // Act
    let text = TracedSerializer::default().render(&synthesis).unwrap();

    // Assert
    let body: String = text
        .lines()
        .filter(|l| *l != "---" && !l.starts_with("#>") && !l.starts_with("#<"))
        .map(|l| format!("{l}\n"))
        .collect();
    let reparsed: serde_json::Value = serde_yaml::from_str(&body).unwrap();
    assert_eq!(reparsed, synthesis[0].manifests[0]);
    assert!(text.contains("  \"multi\\nline key\": v\n"), "{text}");
}
