//! Typed view over a dbt `manifest.json`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{LineageError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManifestMetadata {
    #[serde(default)]
    pub dbt_version: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub generated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DependsOn {
    #[serde(default)]
    pub nodes: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub materialized: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ColumnNode {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub data_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelNode {
    pub name: String,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Declared columns in manifest order.
    #[serde(default, deserialize_with = "ordered_entries")]
    pub columns: Vec<(String, ColumnNode)>,
    #[serde(default)]
    pub depends_on: DependsOn,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub config: NodeConfig,
    #[serde(default)]
    pub raw_code: Option<String>,
    #[serde(default)]
    pub raw_sql: Option<String>,
    #[serde(default)]
    pub compiled_code: Option<String>,
    #[serde(default)]
    pub compiled_sql: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestMetadata {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestNode {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub attached_node: Option<String>,
    #[serde(default)]
    pub depends_on: DependsOn,
    #[serde(default)]
    pub test_metadata: Option<TestMetadata>,
}

impl TestNode {
    /// Generic test name, `custom_test` for singular tests.
    pub fn test_name(&self) -> String {
        self.test_metadata
            .as_ref()
            .and_then(|m| m.name.clone())
            .unwrap_or_else(|| "custom_test".to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceNode {
    pub name: String,
    #[serde(default)]
    pub source_name: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ManifestNode {
    Model(ModelNode),
    Test(TestNode),
    /// Any other resource type (seed, snapshot, analysis, ...).
    Other(String),
}

#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub metadata: ManifestMetadata,
    /// Nodes keyed by `unique_id`, in manifest order.
    pub nodes: Vec<(String, ManifestNode)>,
    pub sources: BTreeMap<String, SourceNode>,
    /// Legacy top-level `tests` collection.
    pub tests: Vec<(String, TestNode)>,
}

fn ordered_entries<'de, D, T>(deserializer: D) -> std::result::Result<Vec<(String, T)>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let map = Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
    map.into_iter()
        .map(|(key, value)| {
            serde_json::from_value(value)
                .map(|item| (key.clone(), item))
                .map_err(|e| de::Error::custom(format!("{key}: {e}")))
        })
        .collect()
}

/// Malformed entries are logged and dropped so one bad node does not sink
/// the whole manifest.
fn node_from_value<T: DeserializeOwned>(id: &str, value: Value) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(node) => Some(node),
        Err(e) => {
            log::warn!("skipping malformed manifest entry {id}: {e}");
            None
        }
    }
}

impl Manifest {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LineageError::NotFound(path.to_path_buf()));
        }
        let text = fs::read_to_string(path)?;
        let manifest = Self::from_json(&text)?;

        log::info!(
            "loaded manifest {}: {} node(s), {} source(s), dbt {} project {}",
            path.display(),
            manifest.nodes.len(),
            manifest.sources.len(),
            manifest.metadata.dbt_version.as_deref().unwrap_or("?"),
            manifest.metadata.project_name.as_deref().unwrap_or("?")
        );
        Ok(manifest)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(text)?;
        let Value::Object(mut document) = document else {
            return Err(LineageError::InvalidFormat(
                "manifest is not a JSON object".into(),
            ));
        };

        let metadata = document
            .remove("metadata")
            .ok_or_else(|| LineageError::InvalidFormat("missing 'metadata'".into()))?;
        let metadata: ManifestMetadata = serde_json::from_value(metadata)
            .map_err(|e| LineageError::InvalidFormat(format!("metadata: {e}")))?;

        let Some(Value::Object(raw_nodes)) = document.remove("nodes") else {
            return Err(LineageError::InvalidFormat("missing 'nodes'".into()));
        };

        let mut nodes = Vec::with_capacity(raw_nodes.len());
        for (id, value) in raw_nodes {
            let resource_type = value
                .get("resource_type")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let node = match resource_type.as_str() {
                "model" => node_from_value(&id, value).map(ManifestNode::Model),
                "test" => node_from_value(&id, value).map(ManifestNode::Test),
                _ => Some(ManifestNode::Other(resource_type)),
            };
            if let Some(node) = node {
                nodes.push((id, node));
            }
        }

        let mut sources = BTreeMap::new();
        if let Some(Value::Object(raw_sources)) = document.remove("sources") {
            for (id, value) in raw_sources {
                if let Some(source) = node_from_value::<SourceNode>(&id, value) {
                    sources.insert(id, source);
                }
            }
        }

        let mut tests = Vec::new();
        if let Some(Value::Object(raw_tests)) = document.remove("tests") {
            for (id, value) in raw_tests {
                if let Some(test) = node_from_value::<TestNode>(&id, value) {
                    tests.push((id, test));
                }
            }
        }

        Ok(Self {
            metadata,
            nodes,
            sources,
            tests,
        })
    }

    pub fn models(&self) -> impl Iterator<Item = (&str, &ModelNode)> {
        self.nodes.iter().filter_map(|(id, node)| match node {
            ManifestNode::Model(model) => Some((id.as_str(), model)),
            _ => None,
        })
    }

    pub fn test_nodes(&self) -> impl Iterator<Item = (&str, &TestNode)> {
        self.nodes.iter().filter_map(|(id, node)| match node {
            ManifestNode::Test(test) => Some((id.as_str(), test)),
            _ => None,
        })
    }
}
