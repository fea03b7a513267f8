//! Folds a flat discovery result into the database / schema / table tree the
//! metadata repository expects.

use std::collections::BTreeMap;

use dremiofetcher::{CatalogResource, ResourceKind};

/// Schema name used for datasets sitting directly under a top-level container.
pub const DEFAULT_SCHEMA: &str = "default";

#[derive(Debug, Default, PartialEq)]
pub struct Hierarchy<'a> {
    pub databases: BTreeMap<String, Database<'a>>,
}

#[derive(Debug, PartialEq)]
pub struct Database<'a> {
    pub name: String,
    pub schemas: BTreeMap<String, Schema<'a>>,
}

#[derive(Debug, PartialEq)]
pub struct Schema<'a> {
    pub name: String,
    /// Datasets of this schema, sorted by path.
    pub tables: Vec<&'a CatalogResource>,
}

impl<'a> Hierarchy<'a> {
    fn database(&mut self, name: &str) -> &mut Database<'a> {
        self.databases
            .entry(name.to_string())
            .or_insert_with(|| Database {
                name: name.to_string(),
                schemas: BTreeMap::new(),
            })
    }

    fn schema(&mut self, database: &str, schema: &str) -> &mut Schema<'a> {
        self.database(database)
            .schemas
            .entry(schema.to_string())
            .or_insert_with(|| Schema {
                name: schema.to_string(),
                tables: Vec::new(),
            })
    }

    pub fn schema_count(&self) -> usize {
        self.databases.values().map(|db| db.schemas.len()).sum()
    }

    pub fn table_count(&self) -> usize {
        self.databases
            .values()
            .flat_map(|db| db.schemas.values())
            .map(|schema| schema.tables.len())
            .sum()
    }
}

/// Builds the tree. Pure: the same set of resources always yields the same
/// tree, whatever order they arrive in.
pub fn organize(resources: &[CatalogResource]) -> Hierarchy<'_> {
    let mut hierarchy = Hierarchy::default();

    for resource in resources {
        let path = &resource.path;
        let Some(root) = path.first() else {
            continue;
        };

        match resource.kind {
            ResourceKind::Space | ResourceKind::Source if path.len() == 1 => {
                hierarchy.database(root);
            }
            ResourceKind::Folder if path.len() >= 2 => {
                hierarchy.schema(root, &path[1..].join("."));
            }
            ResourceKind::Dataset => {
                let schema = match path.len() {
                    1 => DEFAULT_SCHEMA.to_string(),
                    2 => path[1].clone(),
                    n => path[1..n - 1].join("."),
                };
                hierarchy.schema(root, &schema).tables.push(resource);
            }
            _ => {}
        }
    }

    for schema in hierarchy
        .databases
        .values_mut()
        .flat_map(|db| db.schemas.values_mut())
    {
        schema.tables.sort_by(|a, b| a.path.cmp(&b.path));
    }
    hierarchy
}
