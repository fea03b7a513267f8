//! dbt manifest parsing and model lineage.

pub mod error;
pub mod ingest;
pub mod lineage;
pub mod manifest;
pub mod models;

pub use error::{LineageError, Result};
pub use ingest::{IngestStats, LineageIngestor};
pub use lineage::{
    build_edges, extract_models, extract_sources, model_fqn, source_fqn, LineageGraph,
};
pub use manifest::{Manifest, ManifestNode};
pub use models::{LineageEdgeSet, Model, ModelColumn, Source};
