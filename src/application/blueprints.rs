//! Reusable component shapes.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::application::behaviors::default_name;
use crate::domain::{
    Blueprint, ComponentMut, Deployment, DomainError, DomainResult, ManifestType, Service,
};

/// Options of a [`SimpleApp`]; field defaults follow common single-container services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimpleAppOptions {
    pub image: String,
    pub tag: String,
    pub replicas: u32,
    pub container_port: u16,
    pub port: u16,
    pub revision_history_limit: u32,
    pub match_label_key: String,
    /// Container `resources` block, copied verbatim.
    pub resources: Option<Value>,
}

impl Default for SimpleAppOptions {
    fn default() -> Self {
        Self {
            image: String::new(),
            tag: "latest".into(),
            replicas: 2,
            container_port: 8080,
            port: 80,
            revision_history_limit: 5,
            match_label_key: "synku/app".into(),
            resources: None,
        }
    }
}

/// A Deployment fronted by a ClusterIP Service.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleApp {
    options: SimpleAppOptions,
}

impl SimpleApp {
    pub fn new(image: impl Into<String>) -> Self {
        Self::with_options(SimpleAppOptions {
            image: image.into(),
            ..SimpleAppOptions::default()
        })
    }

    pub fn with_options(options: SimpleAppOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SimpleAppOptions {
        &self.options
    }
}

impl Blueprint for SimpleApp {
    fn build(self, component: &mut ComponentMut<'_>) -> DomainResult<()> {
        let id = component.id();
        let name = component.tree().name(id)?.to_string();
        let long_name = component.tree().long_name(id)?;
        let o = self.options;

        if o.image.trim().is_empty() {
            return Err(DomainError::ManifestConstruction {
                component: long_name,
                kind: Deployment.kind().to_string(),
                reason: "image must not be empty".to_string(),
            });
        }

        let match_labels = json!({ o.match_label_key.clone(): long_name });
        let mut container = json!({
            "name": name,
            "image": format!("{}:{}", o.image, o.tag),
            "ports": [{"protocol": "TCP", "containerPort": o.container_port}],
        });
        if let Some(resources) = o.resources {
            container["resources"] = resources;
        }

        component
            .draft(
                &Deployment,
                json!({
                    "spec": {
                        "replicas": o.replicas,
                        "revisionHistoryLimit": o.revision_history_limit,
                        "selector": {"matchLabels": match_labels},
                        "template": {
                            "metadata": {"labels": match_labels},
                            "spec": {"containers": [container]},
                        },
                    }
                }),
            )?
            .draft(
                &Service,
                json!({
                    "spec": {
                        "type": "ClusterIP",
                        "selector": match_labels,
                        "ports": [{"port": o.port, "targetPort": o.container_port}],
                    }
                }),
            )?
            .with_behavior(default_name(None));
        Ok(())
    }
}
