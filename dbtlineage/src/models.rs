use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelColumn {
    pub name: String,
    /// Upper-cased declared type, `STRING` when undeclared.
    pub data_type: String,
    pub description: String,
}

/// A dbt model flattened out of the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Model {
    pub unique_id: String,
    pub name: String,
    pub database: String,
    pub schema: String,
    pub alias: String,
    pub description: String,
    pub columns: Vec<ModelColumn>,
    pub depends_on: Vec<String>,
    pub tags: Vec<String>,
    /// Names of the tests attached to this model.
    pub tests: Vec<String>,
    pub materialization: String,
    pub raw_query: Option<String>,
    pub compiled_query: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    pub unique_id: String,
    pub name: String,
    pub source_name: String,
    pub database: String,
    pub schema: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LineageEdgeSet {
    pub upstream: Vec<String>,
    pub downstream: Vec<String>,
    /// Dependency ids that matched neither a model nor a source.
    pub unresolved: Vec<String>,
}
