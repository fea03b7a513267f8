pub mod client;
pub mod config;
pub mod errors;
pub mod hierarchy;
pub mod lineage_check;
pub mod models;
pub mod sync;

pub use client::{MetadataRepository, OpenMetadataClient};
pub use config::{RepositoryConfig, SyncConfig};
pub use errors::{Result, StorageError};
pub use hierarchy::{organize, Hierarchy};
pub use lineage_check::{LineageCheckResult, LineageReport, LineageVerifier};
pub use models::{EntityLineage, TableFilter, UpsertOutcome};
pub use sync::{SyncEngine, SyncMode, SyncStats};
