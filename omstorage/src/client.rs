use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use crate::config::RepositoryConfig;
use crate::errors::{Result, StorageError};
use crate::models::{
    CreateDatabase, CreateSchema, CreateTable, EntityLineage, TableFilter, UpsertOutcome,
};

const PAGE_SIZE: usize = 1000;

/// Write and read access to the target metadata repository.
///
/// Every write is an idempotent create-or-update keyed by name within its
/// parent, so replaying a call never duplicates an entity.
#[async_trait]
pub trait MetadataRepository: Send + Sync {
    async fn upsert_database(&self, request: &CreateDatabase) -> Result<UpsertOutcome>;

    async fn upsert_schema(&self, request: &CreateSchema) -> Result<UpsertOutcome>;

    async fn upsert_table(&self, request: &CreateTable) -> Result<UpsertOutcome>;

    async fn get_lineage(
        &self,
        fqn: &str,
        upstream_depth: u32,
        downstream_depth: u32,
    ) -> Result<EntityLineage>;

    /// Records a table-to-table lineage edge.
    async fn add_lineage(&self, from_fqn: &str, to_fqn: &str) -> Result<()>;

    /// FQNs of the service's tables matching `filter`.
    async fn list_tables(&self, filter: &TableFilter) -> Result<Vec<String>>;

    /// Server version, used as a reachability probe.
    async fn health(&self) -> Result<String>;
}

pub struct OpenMetadataClient {
    http_client: reqwest::Client,
    base_url: Url,
    token: String,
    service_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntityBody {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    fully_qualified_name: Option<String>,
}

#[derive(Deserialize)]
struct TablePage {
    #[serde(default)]
    data: Vec<EntityBody>,
    #[serde(default)]
    paging: Option<Paging>,
}

#[derive(Deserialize)]
struct Paging {
    #[serde(default)]
    after: Option<String>,
}

#[derive(Deserialize)]
struct VersionBody {
    #[serde(default)]
    version: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LineageBody {
    #[serde(default)]
    entity: Option<EntityBody>,
    #[serde(default)]
    nodes: Vec<EntityBody>,
    #[serde(default)]
    upstream_edges: Vec<EdgeBody>,
    #[serde(default)]
    downstream_edges: Vec<EdgeBody>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EdgeBody {
    #[serde(default)]
    from_entity: Option<EdgeEndpoint>,
    #[serde(default)]
    to_entity: Option<EdgeEndpoint>,
}

/// Edge ends come either as a bare entity id or as an inline reference.
#[derive(Deserialize)]
#[serde(untagged)]
enum EdgeEndpoint {
    Id(String),
    Entity(EntityBody),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EntityReference<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    entity_type: &'a str,
}

impl OpenMetadataClient {
    pub fn new(config: &RepositoryConfig) -> Result<Self> {
        let base_url = Url::parse(config.api_url.trim_end_matches('/'))?;
        if base_url.cannot_be_a_base() {
            return Err(StorageError::Config(format!(
                "metadata api url '{}' cannot be used as a base",
                config.api_url
            )));
        }
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            http_client,
            base_url,
            token: config.token.clone(),
            service_name: config.service_name.clone(),
        })
    }

    fn endpoint<I>(&self, segments: I) -> Result<Url>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::Config(format!("bad metadata api url {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(AUTHORIZATION, format!("Bearer {}", self.token))
    }

    async fn put_entity<T>(&self, collection: &str, body: &T) -> Result<UpsertOutcome>
    where
        T: Serialize + Sync,
    {
        let url = self.endpoint(["v1", collection])?;
        let response = self.authorized(self.http_client.put(url)).json(body).send().await?;
        let created = response.status() == StatusCode::CREATED;
        let entity: EntityBody = read_json(response, collection).await?;
        let fqn = entity.fully_qualified_name.ok_or_else(|| StorageError::Api {
            endpoint: collection.to_string(),
            status: 200,
            body: "response carried no fullyQualifiedName".into(),
        })?;
        Ok(UpsertOutcome { fqn, created })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, what: &str) -> Result<T> {
        let response = self.authorized(self.http_client.get(url)).send().await?;
        read_json(response, what).await
    }

    async fn table_id(&self, fqn: &str) -> Result<String> {
        let url = self.endpoint(["v1", "tables", "name", fqn])?;
        let table: EntityBody = self.get_json(url, fqn).await?;
        table
            .id
            .ok_or_else(|| StorageError::NotFound(format!("table {fqn} has no id")))
    }

    fn qualify(&self, name: &str) -> String {
        if name.starts_with(&format!("{}.", self.service_name)) {
            name.to_string()
        } else {
            format!("{}.{}", self.service_name, name)
        }
    }
}

async fn read_json<T: DeserializeOwned>(response: Response, endpoint: &str) -> Result<T> {
    let status = response.status();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(StorageError::Unauthorized(
            format!("{endpoint}: HTTP {}", status.as_u16()),
        )),
        StatusCode::NOT_FOUND => Err(StorageError::NotFound(endpoint.to_string())),
        s if !s.is_success() => Err(StorageError::Api {
            endpoint: endpoint.to_string(),
            status: s.as_u16(),
            body: response.text().await.unwrap_or_default(),
        }),
        _ => Ok(response.json::<T>().await?),
    }
}

fn lineage_from_body(body: LineageBody) -> EntityLineage {
    let mut names: HashMap<String, String> = HashMap::new();
    for entity in body.entity.iter().chain(body.nodes.iter()) {
        if let (Some(id), Some(fqn)) = (&entity.id, &entity.fully_qualified_name) {
            names.insert(id.clone(), fqn.clone());
        }
    }

    let resolve = |endpoint: &Option<EdgeEndpoint>| -> Option<String> {
        match endpoint.as_ref()? {
            EdgeEndpoint::Id(id) => names.get(id).cloned(),
            EdgeEndpoint::Entity(entity) => entity
                .fully_qualified_name
                .clone()
                .filter(|fqn| !fqn.is_empty())
                .or_else(|| entity.id.as_ref().and_then(|id| names.get(id).cloned())),
        }
    };

    let mut lineage = EntityLineage::default();
    for edge in &body.upstream_edges {
        if let Some(fqn) = resolve(&edge.from_entity) {
            if !lineage.upstream.contains(&fqn) {
                lineage.upstream.push(fqn);
            }
        }
    }
    for edge in &body.downstream_edges {
        if let Some(fqn) = resolve(&edge.to_entity) {
            if !lineage.downstream.contains(&fqn) {
                lineage.downstream.push(fqn);
            }
        }
    }
    lineage
}

#[async_trait]
impl MetadataRepository for OpenMetadataClient {
    async fn upsert_database(&self, request: &CreateDatabase) -> Result<UpsertOutcome> {
        self.put_entity("databases", request).await
    }

    async fn upsert_schema(&self, request: &CreateSchema) -> Result<UpsertOutcome> {
        self.put_entity("databaseSchemas", request).await
    }

    async fn upsert_table(&self, request: &CreateTable) -> Result<UpsertOutcome> {
        self.put_entity("tables", request).await
    }

    async fn get_lineage(
        &self,
        fqn: &str,
        upstream_depth: u32,
        downstream_depth: u32,
    ) -> Result<EntityLineage> {
        let mut url = self.endpoint(["v1", "lineage", "table", "name", fqn])?;
        url.query_pairs_mut()
            .append_pair("upstreamDepth", &upstream_depth.to_string())
            .append_pair("downstreamDepth", &downstream_depth.to_string());
        let body: LineageBody = self.get_json(url, fqn).await?;
        Ok(lineage_from_body(body))
    }

    async fn add_lineage(&self, from_fqn: &str, to_fqn: &str) -> Result<()> {
        let from_id = self.table_id(from_fqn).await?;
        let to_id = self.table_id(to_fqn).await?;
        let body = json!({
            "edge": {
                "fromEntity": EntityReference { id: &from_id, entity_type: "table" },
                "toEntity": EntityReference { id: &to_id, entity_type: "table" },
            }
        });

        let url = self.endpoint(["v1", "lineage"])?;
        let response = self.authorized(self.http_client.put(url)).json(&body).send().await?;
        let status = response.status();
        if status.is_success() {
            log::debug!("lineage edge {from_fqn} -> {to_fqn} recorded");
            return Ok(());
        }
        Err(StorageError::Api {
            endpoint: "lineage".into(),
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        })
    }

    async fn list_tables(&self, filter: &TableFilter) -> Result<Vec<String>> {
        let mut tables = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let mut url = self.endpoint(["v1", "tables"])?;
            {
                let mut query = url.query_pairs_mut();
                query
                    .append_pair("service", &self.service_name)
                    .append_pair("limit", &PAGE_SIZE.to_string());
                if let Some(database) = &filter.database {
                    let database_fqn = self.qualify(database);
                    if let Some(schema) = &filter.schema {
                        query.append_pair("databaseSchema", &format!("{database_fqn}.{schema}"));
                    }
                    query.append_pair("database", &database_fqn);
                }
                if let Some(cursor) = &after {
                    query.append_pair("after", cursor);
                }
            }

            let page: TablePage = self.get_json(url, "tables").await?;
            tables.extend(page.data.into_iter().filter_map(|t| t.fully_qualified_name));

            after = page.paging.and_then(|p| p.after).filter(|a| !a.is_empty());
            if after.is_none() {
                break;
            }
        }

        log::debug!("listed {} table(s) for service {}", tables.len(), self.service_name);
        Ok(tables)
    }

    async fn health(&self) -> Result<String> {
        let url = self.endpoint(["v1", "system", "version"])?;
        let body: VersionBody = self.get_json(url, "system version").await?;
        Ok(body.version.unwrap_or_else(|| "unknown".into()))
    }
}
