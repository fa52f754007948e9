//! Demo release: a web frontend with its configuration.
//!
//! Context values (`--set key=value`, `[context]` in synku.toml or
//! `SYNKU_CONTEXT__<KEY>`): `environment` (default `development`),
//! `image` (default `nginx`), `namespace` (default `webapp`).

use serde_json::json;

use synku::application::behaviors::{
    annotations, container_env, default_namespace, default_resources, when,
};
use synku::application::{ApplicationResult, SimpleApp, SimpleAppOptions};
use synku::cli;
use synku::config::Settings;
use synku::domain::{ComponentTree, ConfigMap};

fn build(settings: &Settings) -> ApplicationResult<ComponentTree> {
    let context = |key: &str, default: &str| {
        settings
            .context
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    };
    let environment = context("environment", "development");
    let production = environment == "production";
    let log_level = if production { "info" } else { "debug" };

    let mut tree = settings.release("webapp")?;
    tree.component(tree.root())?
        .with_behavior(default_namespace(&context("namespace", "webapp")))
        .with_behavior(container_env("APP_ENV", &environment))
        .with_behavior(when(
            production,
            annotations([("prometheus.io/scrape", "true")]),
        ));

    let frontend = tree
        .component(tree.root())?
        .child("web")?
        .draft(&ConfigMap, json!({"data": {"LOG_LEVEL": log_level}}))?
        .add_blueprint(
            "frontend",
            SimpleApp::with_options(SimpleAppOptions {
                image: context("image", "nginx"),
                replicas: if production { 3 } else { 1 },
                ..SimpleAppOptions::default()
            }),
        )?;
    tree.component(frontend)?.with_behavior(default_resources(
        [("cpu", "100m"), ("memory", "128Mi")],
        [("memory", "256Mi")],
    ));

    Ok(tree)
}

fn main() {
    std::process::exit(cli::run(build));
}

#[cfg(test)]
mod tests {
    use super::*;
    use synku::application::Synthesizer;
    use synku::util::testing;

    #[test]
    fn given_production_context_when_building_then_demo_tree_synthesizes() {
        testing::init_test_setup();
        let mut settings = Settings::default();
        settings
            .context
            .insert("environment".into(), "production".into());

        let tree = build(&settings).unwrap();
        let synthesis = Synthesizer::new().synth(&tree).unwrap();

        let names: Vec<&str> = synthesis
            .iter()
            .map(|s| s.component.long_name.as_str())
            .collect();
        assert_eq!(names, ["webapp-web", "webapp-web-frontend"]);
        let deployment = &synthesis[1].manifests[0];
        assert_eq!(deployment["spec"]["replicas"], 3);
        assert_eq!(deployment["metadata"]["namespace"], "webapp");
        assert_eq!(
            deployment["spec"]["template"]["spec"]["containers"][0]["env"][0]["value"],
            "production"
        );
    }
}
