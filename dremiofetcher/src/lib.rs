pub mod cancel;
pub mod client;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod mapper;
pub mod models;

pub use crate::cancel::CancelToken;
pub use crate::client::{CatalogService, DremioClient};
pub use crate::config::DremioConfig;
pub use crate::error::{FetcherError, Result};
pub use crate::fetcher::{CatalogDiscovery, Discovery, DiscoveryParams};
pub use crate::models::{CatalogResource, Column, DataType, RawNode, ResourceKind};
