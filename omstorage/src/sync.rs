use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dremiofetcher::{CancelToken, CatalogDiscovery, CatalogService, FetcherError};
use futures::stream::{self, StreamExt};
use serde::{Serialize, Serializer};

use crate::client::MetadataRepository;
use crate::config::SyncConfig;
use crate::errors::{Result, StorageError};
use crate::hierarchy::{self, Database, Hierarchy, Schema};
use crate::models::{ColumnPayload, CreateDatabase, CreateSchema, CreateTable, UpsertOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    Full,
    /// Not implemented yet: runs as [`SyncMode::Full`].
    Incremental,
    /// Discovers and organizes, counts what would be written, writes nothing.
    DryRun,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Full => "full",
            SyncMode::Incremental => "incremental",
            SyncMode::DryRun => "dry-run",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncMode {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(SyncMode::Full),
            "incremental" => Ok(SyncMode::Incremental),
            "dry-run" | "dry_run" | "dryrun" => Ok(SyncMode::DryRun),
            other => Err(StorageError::InvalidArg(format!("unknown sync mode '{other}'"))),
        }
    }
}

/// Outcome of one synchronization run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStats {
    pub mode: SyncMode,
    pub resources_discovered: usize,
    pub databases_created: usize,
    pub databases_updated: usize,
    pub schemas_created: usize,
    pub schemas_updated: usize,
    pub tables_created: usize,
    pub tables_updated: usize,
    pub errors: Vec<String>,
    /// Catalog nodes skipped during discovery.
    pub warnings: Vec<String>,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    #[serde(rename = "duration_secs", serialize_with = "duration_secs")]
    pub duration: Duration,
}

fn duration_secs<S>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

impl SyncStats {
    fn new(mode: SyncMode) -> Self {
        Self {
            mode,
            resources_discovered: 0,
            databases_created: 0,
            databases_updated: 0,
            schemas_created: 0,
            schemas_updated: 0,
            tables_created: 0,
            tables_updated: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
            cancelled: false,
            started_at: Utc::now(),
            duration: Duration::ZERO,
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && !self.cancelled
    }

    pub fn databases(&self) -> usize {
        self.databases_created + self.databases_updated
    }

    pub fn schemas(&self) -> usize {
        self.schemas_created + self.schemas_updated
    }

    pub fn tables(&self) -> usize {
        self.tables_created + self.tables_updated
    }

    fn merge(&mut self, branch: BranchStats) {
        self.databases_created += branch.databases_created;
        self.databases_updated += branch.databases_updated;
        self.schemas_created += branch.schemas_created;
        self.schemas_updated += branch.schemas_updated;
        self.tables_created += branch.tables_created;
        self.tables_updated += branch.tables_updated;
        self.errors.extend(branch.errors);
        self.cancelled |= branch.cancelled;
    }

    fn log_summary(&self) {
        log::info!(
            "sync ({}) finished in {:.1}s: {} resource(s) discovered",
            self.mode,
            self.duration.as_secs_f64(),
            self.resources_discovered
        );
        log::info!(
            "  databases: {} created, {} updated",
            self.databases_created,
            self.databases_updated
        );
        log::info!(
            "  schemas:   {} created, {} updated",
            self.schemas_created,
            self.schemas_updated
        );
        log::info!(
            "  tables:    {} created, {} updated",
            self.tables_created,
            self.tables_updated
        );
        if !self.warnings.is_empty() {
            log::warn!("  {} discovery warning(s)", self.warnings.len());
        }
        if !self.errors.is_empty() {
            log::warn!("  {} error(s)", self.errors.len());
        }
        if self.cancelled {
            log::warn!("  run was cancelled before completion");
        }
    }
}

/// Counters of one database branch, merged into [`SyncStats`] once the
/// branch is done.
#[derive(Debug, Default)]
struct BranchStats {
    databases_created: usize,
    databases_updated: usize,
    schemas_created: usize,
    schemas_updated: usize,
    tables_created: usize,
    tables_updated: usize,
    errors: Vec<String>,
    cancelled: bool,
}

impl BranchStats {
    fn error(&mut self, message: String) {
        log::error!("{message}");
        self.errors.push(message);
    }
}

fn count(outcome: &UpsertOutcome, created: &mut usize, updated: &mut usize) {
    if outcome.created {
        *created += 1;
    } else {
        *updated += 1;
    }
}

/// Mirrors the catalog structure into the metadata repository.
pub struct SyncEngine {
    catalog: Arc<dyn CatalogService>,
    repository: Arc<dyn MetadataRepository>,
    config: SyncConfig,
}

impl SyncEngine {
    pub fn new(
        catalog: Arc<dyn CatalogService>,
        repository: Arc<dyn MetadataRepository>,
        config: SyncConfig,
    ) -> Self {
        Self {
            catalog,
            repository,
            config,
        }
    }

    /// Runs one pass: authenticate, discover, organize, then upsert
    /// databases concurrently, each with its schemas and tables in order.
    ///
    /// Upsert failures are collected in [`SyncStats::errors`] and skip only
    /// the failed entity and its children. Authentication failures and an
    /// unreadable catalog root are returned as `Err`.
    pub async fn sync(&self, mode: SyncMode, cancel: &CancelToken) -> Result<SyncStats> {
        let started = Instant::now();
        let mut stats = SyncStats::new(mode);
        log::info!(
            "starting {mode} sync into service '{}'",
            self.config.service_name
        );
        if mode == SyncMode::Incremental {
            log::warn!("incremental sync is not supported yet, running a full pass");
        }

        self.catalog
            .login(&self.config.username, &self.config.password)
            .await?;

        let discovery = CatalogDiscovery::new(self.catalog.clone(), self.config.discovery.clone());
        let mut discovery = match discovery.discover_all(cancel).await {
            Ok(discovery) => discovery,
            Err(FetcherError::Cancelled) => {
                stats.cancelled = true;
                stats.duration = started.elapsed();
                stats.log_summary();
                return Ok(stats);
            }
            Err(err) => return Err(err.into()),
        };
        stats.resources_discovered = discovery.resources.len();
        stats.warnings = std::mem::take(&mut discovery.warnings);

        let tree = hierarchy::organize(&discovery.resources);
        log::info!(
            "organized into {} database(s), {} schema(s), {} table(s)",
            tree.databases.len(),
            tree.schema_count(),
            tree.table_count()
        );

        if mode == SyncMode::DryRun {
            Self::plan(&tree, &mut stats);
        } else {
            let concurrency = self.config.concurrency.max(1);
            let branches: Vec<BranchStats> = stream::iter(tree.databases.values())
                .map(|database| self.sync_database(database, cancel))
                .buffer_unordered(concurrency)
                .collect()
                .await;
            for branch in branches {
                stats.merge(branch);
            }
        }

        stats.duration = started.elapsed();
        stats.log_summary();
        Ok(stats)
    }

    /// Dry runs report every entity as something that would be created.
    fn plan(tree: &Hierarchy<'_>, stats: &mut SyncStats) {
        for database in tree.databases.values() {
            log::info!("[dry-run] database {}", database.name);
            for schema in database.schemas.values() {
                log::info!("[dry-run]   schema {} ({} table(s))", schema.name, schema.tables.len());
            }
        }
        stats.databases_created = tree.databases.len();
        stats.schemas_created = tree.schema_count();
        stats.tables_created = tree.table_count();
    }

    async fn sync_database(&self, database: &Database<'_>, cancel: &CancelToken) -> BranchStats {
        let mut branch = BranchStats::default();
        if cancel.is_cancelled() {
            branch.cancelled = true;
            return branch;
        }

        let request = CreateDatabase::new(
            &database.name,
            format!("Dremio {} space/source", database.name),
            &self.config.service_name,
        );
        let database_fqn = match self.repository.upsert_database(&request).await {
            Ok(outcome) => {
                log::debug!("database {} -> {}", database.name, outcome.fqn);
                count(&outcome, &mut branch.databases_created, &mut branch.databases_updated);
                outcome.fqn
            }
            Err(err) => {
                branch.error(format!("database {}: {err}", database.name));
                return branch;
            }
        };

        for schema in database.schemas.values() {
            if cancel.is_cancelled() {
                branch.cancelled = true;
                break;
            }
            self.sync_schema(&database_fqn, schema, cancel, &mut branch).await;
            if branch.cancelled {
                break;
            }
        }
        branch
    }

    async fn sync_schema(
        &self,
        database_fqn: &str,
        schema: &Schema<'_>,
        cancel: &CancelToken,
        branch: &mut BranchStats,
    ) {
        let request =
            CreateSchema::new(&schema.name, format!("Schema {}", schema.name), database_fqn);
        let schema_fqn = match self.repository.upsert_schema(&request).await {
            Ok(outcome) => {
                count(&outcome, &mut branch.schemas_created, &mut branch.schemas_updated);
                outcome.fqn
            }
            Err(err) => {
                branch.error(format!("schema {database_fqn}.{}: {err}", schema.name));
                return;
            }
        };

        for table in &schema.tables {
            if cancel.is_cancelled() {
                branch.cancelled = true;
                return;
            }
            let columns = table.columns().iter().map(ColumnPayload::from).collect();
            let request = CreateTable::new(
                table.name(),
                format!("Table {} from Dremio", table.name()),
                columns,
                &schema_fqn,
            );
            match self.repository.upsert_table(&request).await {
                Ok(outcome) => {
                    log::debug!("table {} -> {}", table.full_path(), outcome.fqn);
                    count(&outcome, &mut branch.tables_created, &mut branch.tables_updated);
                }
                Err(err) => branch.error(format!("table {}: {err}", table.full_path())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_parse_from_cli_spelling() {
        assert_eq!("full".parse::<SyncMode>().unwrap(), SyncMode::Full);
        assert_eq!("Incremental".parse::<SyncMode>().unwrap(), SyncMode::Incremental);
        assert_eq!("dry-run".parse::<SyncMode>().unwrap(), SyncMode::DryRun);
        assert!("partial".parse::<SyncMode>().is_err());
        assert_eq!(SyncMode::DryRun.to_string(), "dry-run");
    }

    #[test]
    fn success_requires_no_errors_and_no_cancellation() {
        let mut stats = SyncStats::new(SyncMode::Full);
        assert!(stats.is_success());

        stats.merge(BranchStats {
            tables_created: 2,
            tables_updated: 1,
            ..Default::default()
        });
        assert_eq!(stats.tables(), 3);
        assert!(stats.is_success());

        stats.cancelled = true;
        assert!(!stats.is_success());
        stats.cancelled = false;
        stats.merge(BranchStats {
            errors: vec!["table x: boom".into()],
            ..Default::default()
        });
        assert!(!stats.is_success());
    }

    #[test]
    fn stats_serialize_duration_as_seconds() {
        let mut stats = SyncStats::new(SyncMode::DryRun);
        stats.duration = Duration::from_millis(1500);
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["mode"], "dry-run");
        assert_eq!(value["duration_secs"], 1.5);
    }
}
