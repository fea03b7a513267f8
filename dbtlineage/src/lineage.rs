use std::collections::{BTreeMap, HashMap};

use crate::manifest::{Manifest, ModelNode};
use crate::models::{LineageEdgeSet, Model, ModelColumn, Source};

const DEFAULT_NAMESPACE: &str = "default";

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn tests_for(manifest: &Manifest, model_id: &str) -> Vec<String> {
    let attached: Vec<String> = manifest
        .tests
        .iter()
        .filter(|(_, test)| test.attached_node.as_deref() == Some(model_id))
        .map(|(_, test)| test.test_name())
        .collect();
    if !attached.is_empty() {
        return attached;
    }

    manifest
        .test_nodes()
        .filter(|(_, test)| test.depends_on.nodes.iter().any(|dep| dep == model_id))
        .map(|(_, test)| test.test_name())
        .collect()
}

fn to_model(manifest: &Manifest, id: &str, node: &ModelNode) -> Model {
    let columns = node
        .columns
        .iter()
        .map(|(key, column)| ModelColumn {
            name: column.name.clone().unwrap_or_else(|| key.clone()),
            data_type: non_empty(&column.data_type)
                .map(str::to_uppercase)
                .unwrap_or_else(|| "STRING".to_string()),
            description: column.description.clone().unwrap_or_default(),
        })
        .collect();

    Model {
        unique_id: id.to_string(),
        name: node.name.clone(),
        database: non_empty(&node.config.database)
            .or(non_empty(&node.database))
            .unwrap_or(DEFAULT_NAMESPACE)
            .to_string(),
        schema: non_empty(&node.config.schema)
            .or(non_empty(&node.schema))
            .unwrap_or(DEFAULT_NAMESPACE)
            .to_string(),
        alias: non_empty(&node.alias).unwrap_or(&node.name).to_string(),
        description: node.description.clone().unwrap_or_default(),
        columns,
        depends_on: node.depends_on.nodes.clone(),
        tags: node.tags.clone(),
        tests: tests_for(manifest, id),
        materialization: non_empty(&node.config.materialized)
            .unwrap_or("view")
            .to_string(),
        raw_query: node.raw_code.clone().or_else(|| node.raw_sql.clone()),
        compiled_query: node.compiled_code.clone().or_else(|| node.compiled_sql.clone()),
    }
}

/// Models of the manifest, in manifest order.
pub fn extract_models(manifest: &Manifest) -> Vec<Model> {
    let models: Vec<Model> = manifest
        .models()
        .map(|(id, node)| to_model(manifest, id, node))
        .collect();
    log::info!("extracted {} model(s)", models.len());
    models
}

pub fn extract_sources(manifest: &Manifest) -> BTreeMap<String, Source> {
    manifest
        .sources
        .iter()
        .map(|(id, node)| {
            let source = Source {
                unique_id: id.clone(),
                name: node.name.clone(),
                source_name: node.source_name.clone().unwrap_or_default(),
                database: non_empty(&node.database).unwrap_or(DEFAULT_NAMESPACE).to_string(),
                schema: non_empty(&node.schema).unwrap_or(DEFAULT_NAMESPACE).to_string(),
                description: node.description.clone().unwrap_or_default(),
            };
            (id.clone(), source)
        })
        .collect()
}

fn qualified(service: &str, database: &str, schema: &str, table: &str) -> String {
    format!(
        "{service}.{}.{}.{table}",
        database.to_uppercase(),
        schema.to_lowercase()
    )
}

pub fn model_fqn(model: &Model, service: &str) -> String {
    qualified(service, &model.database, &model.schema, &model.alias)
}

pub fn source_fqn(source: &Source, service: &str) -> String {
    qualified(service, &source.database, &source.schema, &source.name)
}

/// Upstream and downstream FQNs of `model`. Dependencies that are neither a
/// model nor a source are dropped and reported in `unresolved`.
pub fn build_edges(
    model: &Model,
    all_models: &[Model],
    sources: &BTreeMap<String, Source>,
    service: &str,
) -> LineageEdgeSet {
    let mut edges = LineageEdgeSet::default();

    for dependency in &model.depends_on {
        let fqn = all_models
            .iter()
            .find(|m| &m.unique_id == dependency)
            .map(|m| model_fqn(m, service))
            .or_else(|| sources.get(dependency).map(|s| source_fqn(s, service)));

        match fqn {
            Some(fqn) if !edges.upstream.contains(&fqn) => edges.upstream.push(fqn),
            Some(_) => {}
            None => {
                log::warn!(
                    "{}: dependency {dependency} is neither a model nor a source",
                    model.unique_id
                );
                if !edges.unresolved.contains(dependency) {
                    edges.unresolved.push(dependency.clone());
                }
            }
        }
    }

    for other in all_models {
        if other.unique_id != model.unique_id && other.depends_on.contains(&model.unique_id) {
            let fqn = model_fqn(other, service);
            if !edges.downstream.contains(&fqn) {
                edges.downstream.push(fqn);
            }
        }
    }
    edges
}

/// Models and sources of one manifest bound to a target service.
#[derive(Debug, Clone)]
pub struct LineageGraph {
    service: String,
    models: Vec<Model>,
    sources: BTreeMap<String, Source>,
    index: HashMap<String, usize>,
}

impl LineageGraph {
    pub fn from_manifest(manifest: &Manifest, service: impl Into<String>) -> Self {
        let models = extract_models(manifest);
        let sources = extract_sources(manifest);
        let index = models
            .iter()
            .enumerate()
            .map(|(i, m)| (m.unique_id.clone(), i))
            .collect();
        Self {
            service: service.into(),
            models,
            sources,
            index,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn models(&self) -> &[Model] {
        &self.models
    }

    pub fn sources(&self) -> &BTreeMap<String, Source> {
        &self.sources
    }

    pub fn model(&self, unique_id: &str) -> Option<&Model> {
        self.index.get(unique_id).map(|&i| &self.models[i])
    }

    pub fn fqn(&self, model: &Model) -> String {
        model_fqn(model, &self.service)
    }

    pub fn edges(&self, model: &Model) -> LineageEdgeSet {
        build_edges(model, &self.models, &self.sources, &self.service)
    }
}
