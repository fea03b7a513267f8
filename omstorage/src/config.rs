use serde::Deserialize;
use std::time::Duration;

/// Where and how to reach the target metadata repository.
#[derive(Deserialize, Debug, Clone)]
pub struct RepositoryConfig {
    /// API root, e.g. `http://localhost:8585/api`.
    pub api_url: String,
    pub token: String,
    /// Database service every synchronized database belongs to.
    pub service_name: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl RepositoryConfig {
    pub fn new(
        api_url: impl Into<String>,
        token: impl Into<String>,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            api_url: api_url.into(),
            token: token.into(),
            service_name: service_name.into(),
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct SyncConfig {
    pub service_name: String,
    pub username: String,
    pub password: String,
    /// Databases upserted concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub discovery: dremiofetcher::DiscoveryParams,
}

fn default_concurrency() -> usize {
    4
}

impl SyncConfig {
    pub fn new(
        service_name: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            username: username.into(),
            password: password.into(),
            concurrency: default_concurrency(),
            discovery: Default::default(),
        }
    }
}
