use serde::{Deserialize, Serialize};
use std::fmt;

/// Catalog item exactly as one of the catalog endpoints returned it.
///
/// The root listing describes containers with `type` + `containerType`, while
/// `by-path` and `by-id` lookups use a single `entityType`. Both shapes land
/// here and are reconciled by [`crate::mapper::normalize_kind`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNode {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub path: Vec<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RawNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<RawField>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawField {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub field_type: RawFieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawFieldType {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RootListing {
    #[serde(default)]
    pub data: Vec<RawNode>,
}

/// The closed taxonomy every catalog item is normalized into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Space,
    Home,
    Source,
    Folder,
    Dataset,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Space => "space",
            ResourceKind::Home => "home",
            ResourceKind::Source => "source",
            ResourceKind::Folder => "folder",
            ResourceKind::Dataset => "dataset",
        }
    }

    pub fn is_container(&self) -> bool {
        !matches!(self, ResourceKind::Dataset)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column types understood by the target repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    Int,
    Bigint,
    Float,
    Double,
    Varchar,
    Char,
    Text,
    String,
    Boolean,
    Date,
    Time,
    Timestamp,
    Decimal,
    Numeric,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Int => "INT",
            DataType::Bigint => "BIGINT",
            DataType::Float => "FLOAT",
            DataType::Double => "DOUBLE",
            DataType::Varchar => "VARCHAR",
            DataType::Char => "CHAR",
            DataType::Text => "TEXT",
            DataType::String => "STRING",
            DataType::Boolean => "BOOLEAN",
            DataType::Date => "DATE",
            DataType::Time => "TIME",
            DataType::Timestamp => "TIMESTAMP",
            DataType::Decimal => "DECIMAL",
            DataType::Numeric => "NUMERIC",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub description: String,
    pub ordinal_position: u32,
}

/// One node found during a discovery pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogResource {
    pub id: String,
    pub path: Vec<String>,
    pub kind: ResourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    schema: Option<Vec<Column>>,
}

impl CatalogResource {
    pub fn container(id: impl Into<String>, path: Vec<String>, kind: ResourceKind) -> Self {
        debug_assert!(kind.is_container());
        Self {
            id: id.into(),
            path,
            kind,
            schema: None,
        }
    }

    pub fn dataset(id: impl Into<String>, path: Vec<String>, columns: Vec<Column>) -> Self {
        Self {
            id: id.into(),
            path,
            kind: ResourceKind::Dataset,
            schema: Some(columns),
        }
    }

    /// Columns of a dataset; containers never carry a schema.
    pub fn schema(&self) -> Option<&[Column]> {
        self.schema.as_deref()
    }

    pub fn columns(&self) -> &[Column] {
        self.schema().unwrap_or(&[])
    }

    pub fn name(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or("")
    }

    pub fn full_path(&self) -> String {
        self.path.join(".")
    }
}
