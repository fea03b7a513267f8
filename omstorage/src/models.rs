use dremiofetcher::{Column, DataType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDatabase {
    pub name: String,
    pub display_name: String,
    pub description: String,
    /// FQN of the owning database service.
    pub service: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSchema {
    pub name: String,
    pub display_name: String,
    pub description: String,
    /// FQN of the parent database.
    pub database: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTable {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub table_type: String,
    pub columns: Vec<ColumnPayload>,
    /// FQN of the parent schema.
    pub database_schema: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnPayload {
    pub name: String,
    pub data_type: DataType,
    pub data_length: u32,
    pub ordinal_position: u32,
    pub description: String,
}

impl From<&Column> for ColumnPayload {
    fn from(column: &Column) -> Self {
        Self {
            name: column.name.clone(),
            data_type: column.data_type,
            data_length: 1,
            ordinal_position: column.ordinal_position,
            description: column.description.clone(),
        }
    }
}

impl CreateDatabase {
    pub fn new(name: &str, description: impl Into<String>, service: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: name.to_string(),
            description: description.into(),
            service: service.to_string(),
        }
    }
}

impl CreateSchema {
    pub fn new(name: &str, description: impl Into<String>, database_fqn: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: name.to_string(),
            description: description.into(),
            database: database_fqn.to_string(),
        }
    }
}

impl CreateTable {
    pub fn new(
        name: &str,
        description: impl Into<String>,
        columns: Vec<ColumnPayload>,
        schema_fqn: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            display_name: name.to_string(),
            description: description.into(),
            table_type: "Regular".to_string(),
            columns,
            database_schema: schema_fqn.to_string(),
        }
    }
}

/// What the repository answered to an upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub fqn: String,
    /// `false` when the entity already existed and was updated in place.
    pub created: bool,
}

/// Upstream and downstream neighbours of one entity, as FQNs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityLineage {
    pub upstream: Vec<String>,
    pub downstream: Vec<String>,
}

/// Narrows a table listing to one database and/or schema of the service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableFilter {
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
}
