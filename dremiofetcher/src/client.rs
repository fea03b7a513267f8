use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use url::Url;

use crate::config::DremioConfig;
use crate::error::{FetcherError, Result};
use crate::models::{RawNode, RootListing};

/// Prefix the catalog expects in front of the session token.
const AUTH_PREFIX: &str = "_dremio";

/// Raw access to the source catalog API. No business logic lives here.
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Opens a session; the token is attached to every later request.
    async fn login(&self, username: &str, password: &str) -> Result<String>;

    /// Top-level catalog listing.
    async fn root(&self) -> Result<Vec<RawNode>>;

    /// Looks an item up by its path segments.
    async fn by_path(&self, path: &[String]) -> Result<RawNode>;

    /// Looks an item up by its catalog id.
    async fn by_id(&self, id: &str) -> Result<RawNode>;

    /// Cheap reachability probe.
    async fn health(&self) -> Result<()>;
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(default)]
    token: Option<String>,
}

/// The `DremioClient`, responsible for authentication and raw calls against
/// the catalog REST API.
pub struct DremioClient {
    http_client: reqwest::Client,
    base_url: Url,
    token: RwLock<Option<String>>,
}

impl DremioClient {
    pub fn new(config: &DremioConfig) -> Result<Self> {
        let base_url = Url::parse(config.url.trim_end_matches('/'))?;
        if base_url.cannot_be_a_base() {
            return Err(FetcherError::InvalidParam(format!(
                "catalog url '{}' cannot be used as a base",
                config.url
            )));
        }
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            http_client,
            base_url,
            token: RwLock::new(None),
        })
    }

    fn endpoint<I>(&self, segments: I) -> Result<Url>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetcherError::InvalidParam(format!("bad catalog url {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.token.read().await.as_deref() {
            Some(token) => builder.header(AUTHORIZATION, format!("{AUTH_PREFIX}{token}")),
            None => builder,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, what: &str) -> Result<T> {
        let request = self.authorized(self.http_client.get(url)).await;
        let response = request.send().await?;
        read_json(response, what).await
    }
}

async fn read_json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T> {
    let status = response.status();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(FetcherError::Forbidden(format!(
            "{what}: HTTP {}",
            status.as_u16()
        ))),
        StatusCode::NOT_FOUND => Err(FetcherError::NotFound(what.to_string())),
        s if !s.is_success() => Err(FetcherError::Api {
            status: s.as_u16(),
            body: response.text().await.unwrap_or_default(),
        }),
        _ => Ok(response.json::<T>().await?),
    }
}

#[async_trait]
impl CatalogService for DremioClient {
    async fn login(&self, username: &str, password: &str) -> Result<String> {
        let url = self.endpoint(["apiv2", "login"])?;
        let response = self
            .http_client
            .post(url)
            .json(&json!({ "userName": username, "password": password }))
            .send()
            .await
            .map_err(|err| FetcherError::Authentication(err.to_string()))?;

        let body: LoginResponse = match read_json(response, "login").await {
            Ok(body) => body,
            Err(FetcherError::Forbidden(msg)) => return Err(FetcherError::Authentication(msg)),
            Err(err) => return Err(FetcherError::Authentication(err.to_string())),
        };
        let token = body
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                FetcherError::Authentication("login response carried no token".into())
            })?;

        *self.token.write().await = Some(token.clone());
        log::info!("authenticated against catalog {} as {}", self.base_url, username);
        Ok(token)
    }

    async fn root(&self) -> Result<Vec<RawNode>> {
        let url = self.endpoint(["api", "v3", "catalog"])?;
        // Without the root listing there is nothing left to walk.
        let listing: RootListing = match self.get_json(url, "catalog root").await {
            Ok(listing) => listing,
            Err(FetcherError::Forbidden(msg)) => return Err(FetcherError::Authentication(msg)),
            Err(err) => return Err(err),
        };
        Ok(listing.data)
    }

    async fn by_path(&self, path: &[String]) -> Result<RawNode> {
        if path.is_empty() {
            return Err(FetcherError::InvalidParam("empty catalog path".into()));
        }
        let segments = ["api", "v3", "catalog", "by-path"]
            .into_iter()
            .map(str::to_string)
            .chain(path.iter().cloned());
        let url = self.endpoint(segments)?;
        self.get_json(url, &path.join("/")).await
    }

    async fn by_id(&self, id: &str) -> Result<RawNode> {
        if id.is_empty() {
            return Err(FetcherError::InvalidParam("empty catalog id".into()));
        }
        let url = self.endpoint(["api", "v3", "catalog", id])?;
        self.get_json(url, id).await
    }

    async fn health(&self) -> Result<()> {
        let url = self.endpoint(["apiv2", "server_status"])?;
        let _: serde_json::Value = self.get_json(url, "server status").await?;
        Ok(())
    }
}
