use std::collections::HashMap;
use std::sync::Arc;

use dremiofetcher::mapper::map_data_type;
use omstorage::models::{ColumnPayload, CreateDatabase, CreateSchema, CreateTable};
use omstorage::MetadataRepository;
use serde::Serialize;

use crate::error::Result;
use crate::lineage::LineageGraph;
use crate::models::Model;

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestStats {
    pub models_processed: usize,
    pub tables_upserted: usize,
    pub lineage_created: usize,
    pub errors: Vec<String>,
}

impl IngestStats {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, message: String) {
        log::error!("{message}");
        self.errors.push(message);
    }
}

/// Pushes dbt models and their edges into the metadata repository.
pub struct LineageIngestor {
    repository: Arc<dyn MetadataRepository>,
}

impl LineageIngestor {
    pub fn new(repository: Arc<dyn MetadataRepository>) -> Self {
        Self { repository }
    }

    /// Upserts every model's table, then records one edge per upstream
    /// dependency of each table that made it in. In dry-run mode the same
    /// counts are computed without any write.
    pub async fn ingest(&self, graph: &LineageGraph, dry_run: bool) -> IngestStats {
        let mut stats = IngestStats::default();
        let mut containers: HashMap<String, String> = HashMap::new();
        let mut tables: Vec<(&Model, String)> = Vec::new();

        for model in graph.models() {
            stats.models_processed += 1;
            if dry_run {
                log::info!("[dry-run] table {}", graph.fqn(model));
                stats.tables_upserted += 1;
                tables.push((model, graph.fqn(model)));
                continue;
            }
            match self.upsert_model(graph, model, &mut containers).await {
                Ok(fqn) => {
                    stats.tables_upserted += 1;
                    tables.push((model, fqn));
                }
                Err(err) => stats.error(format!("model {}: {err}", model.unique_id)),
            }
        }

        for (model, table_fqn) in tables {
            for upstream in graph.edges(model).upstream {
                if dry_run {
                    log::info!("[dry-run] lineage {upstream} -> {table_fqn}");
                    stats.lineage_created += 1;
                    continue;
                }
                match self.repository.add_lineage(&upstream, &table_fqn).await {
                    Ok(()) => stats.lineage_created += 1,
                    Err(err) => stats.error(format!("lineage {upstream} -> {table_fqn}: {err}")),
                }
            }
        }

        log::info!(
            "lineage ingestion: {} model(s), {} table(s), {} edge(s), {} error(s)",
            stats.models_processed,
            stats.tables_upserted,
            stats.lineage_created,
            stats.errors.len()
        );
        stats
    }

    async fn upsert_model(
        &self,
        graph: &LineageGraph,
        model: &Model,
        containers: &mut HashMap<String, String>,
    ) -> Result<String> {
        let database = model.database.to_uppercase();
        let schema = model.schema.to_lowercase();

        let database_key = database.clone();
        let database_fqn = match containers.get(&database_key) {
            Some(fqn) => fqn.clone(),
            None => {
                let request = CreateDatabase::new(&database, "dbt database", graph.service());
                let fqn = self.repository.upsert_database(&request).await?.fqn;
                containers.insert(database_key, fqn.clone());
                fqn
            }
        };

        let schema_key = format!("{database}/{schema}");
        let schema_fqn = match containers.get(&schema_key) {
            Some(fqn) => fqn.clone(),
            None => {
                let request = CreateSchema::new(&schema, "dbt schema", &database_fqn);
                let fqn = self.repository.upsert_schema(&request).await?.fqn;
                containers.insert(schema_key, fqn.clone());
                fqn
            }
        };

        let columns = model
            .columns
            .iter()
            .enumerate()
            .map(|(i, column)| ColumnPayload {
                name: column.name.clone(),
                data_type: map_data_type(&column.data_type),
                data_length: 1,
                ordinal_position: i as u32 + 1,
                description: column.description.clone(),
            })
            .collect();
        let request =
            CreateTable::new(&model.alias, model.description.clone(), columns, &schema_fqn);
        let outcome = self.repository.upsert_table(&request).await?;
        log::debug!("model {} -> {}", model.unique_id, outcome.fqn);
        Ok(outcome.fqn)
    }
}
