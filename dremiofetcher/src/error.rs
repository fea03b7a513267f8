use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetcherError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// A single catalog item the session may not read.
    #[error("access denied: {0}")]
    Forbidden(String),

    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("catalog API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("discovery cancelled")]
    Cancelled,
}

impl FetcherError {
    /// Errors that must stop a whole run instead of skipping one node.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FetcherError::Authentication(_) | FetcherError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, FetcherError>;
