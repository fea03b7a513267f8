use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::Deserialize;

use crate::cancel::CancelToken;
use crate::client::CatalogService;
use crate::error::{FetcherError, Result};
use crate::mapper;
use crate::models::{CatalogResource, Column, RawNode, ResourceKind};

#[derive(Debug, Deserialize, Clone)]
pub struct DiscoveryParams {
    /// Containers deeper than this are recorded but not expanded.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_max_depth() -> usize {
    25
}

impl Default for DiscoveryParams {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

/// Result of one discovery pass: every reachable resource once, plus the
/// nodes that had to be skipped along the way.
#[derive(Debug, Default)]
pub struct Discovery {
    pub resources: Vec<CatalogResource>,
    pub warnings: Vec<String>,
}

impl Discovery {
    pub fn count_by_kind(&self) -> BTreeMap<ResourceKind, usize> {
        let mut counts = BTreeMap::new();
        for resource in &self.resources {
            *counts.entry(resource.kind).or_insert(0) += 1;
        }
        counts
    }
}

/// Walk state owned by a single pass.
struct Walk {
    visited: HashSet<Vec<String>>,
    stack: Vec<(RawNode, usize)>,
    discovery: Discovery,
}

impl Walk {
    fn push_children(&mut self, children: Vec<RawNode>, depth: usize) {
        for child in children.into_iter().rev() {
            self.stack.push((child, depth));
        }
    }

    fn warn(&mut self, message: String) {
        log::warn!("{message}");
        self.discovery.warnings.push(message);
    }
}

/// Crawls the catalog into a flat list of [`CatalogResource`]s.
pub struct CatalogDiscovery {
    client: Arc<dyn CatalogService>,
    params: DiscoveryParams,
}

impl CatalogDiscovery {
    pub fn new(client: Arc<dyn CatalogService>, params: DiscoveryParams) -> Self {
        Self { client, params }
    }

    /// Visits every reachable node exactly once, depth first in the order
    /// the API lists children.
    ///
    /// Only authentication failures, an unreadable root listing and
    /// cancellation end the pass early; anything else is recorded in
    /// [`Discovery::warnings`] and the walk moves on.
    pub async fn discover_all(&self, cancel: &CancelToken) -> Result<Discovery> {
        log::info!("starting catalog discovery (max depth {})", self.params.max_depth);
        let roots = self.client.root().await?;
        log::info!("catalog root lists {} item(s)", roots.len());

        let mut walk = Walk {
            visited: HashSet::new(),
            stack: Vec::new(),
            discovery: Discovery::default(),
        };
        walk.push_children(roots, 1);

        while let Some((node, depth)) = walk.stack.pop() {
            if cancel.is_cancelled() {
                log::warn!(
                    "discovery cancelled after {} resource(s)",
                    walk.discovery.resources.len()
                );
                return Err(FetcherError::Cancelled);
            }
            self.visit(node, depth, &mut walk).await?;
        }

        let discovery = walk.discovery;
        log::info!(
            "discovery finished: {} resource(s), {} warning(s), by kind {:?}",
            discovery.resources.len(),
            discovery.warnings.len(),
            discovery.count_by_kind()
        );
        Ok(discovery)
    }

    async fn visit(&self, node: RawNode, depth: usize, walk: &mut Walk) -> Result<()> {
        if node.path.is_empty() {
            walk.warn(format!("skipping catalog item '{}' without a path", node.id));
            return Ok(());
        }
        if !walk.visited.insert(node.path.clone()) {
            log::debug!("already visited {}", node.path.join("."));
            return Ok(());
        }

        let Some(kind) = mapper::normalize_kind(&node) else {
            walk.warn(format!(
                "skipping {}: unrecognised type {:?}/{:?}",
                node.path.join("."),
                node.node_type.as_deref().or(node.entity_type.as_deref()),
                node.container_type
            ));
            return Ok(());
        };

        log::debug!("[{:>7}] {}", kind.as_str(), node.path.join("."));

        if kind == ResourceKind::Dataset {
            let columns = self.dataset_columns(&node, walk).await?;
            walk.discovery
                .resources
                .push(CatalogResource::dataset(node.id, node.path, columns));
            return Ok(());
        }

        let resource = CatalogResource::container(node.id, node.path.clone(), kind);
        walk.discovery.resources.push(resource);

        if depth >= self.params.max_depth {
            walk.warn(format!(
                "not expanding {}: depth limit {} reached",
                node.path.join("."),
                self.params.max_depth
            ));
            return Ok(());
        }

        match self.client.by_path(&node.path).await {
            Ok(expanded) => {
                if !expanded.children.is_empty() {
                    log::debug!("  -> {} child(ren)", expanded.children.len());
                }
                walk.push_children(expanded.children, depth + 1);
            }
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => walk.warn(format!("cannot expand {}: {err}", node.path.join("."))),
        }
        Ok(())
    }

    /// One schema lookup per dataset: by id when known, by path otherwise.
    async fn dataset_columns(&self, node: &RawNode, walk: &mut Walk) -> Result<Vec<Column>> {
        let lookup = if node.id.is_empty() {
            self.client.by_path(&node.path).await
        } else {
            self.client.by_id(&node.id).await
        };

        match lookup {
            Ok(detail) => Ok(mapper::extract_columns(&detail.fields)),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                walk.warn(format!(
                    "no schema for dataset {}: {err}",
                    node.path.join(".")
                ));
                Ok(Vec::new())
            }
        }
    }
}
