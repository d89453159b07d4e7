//! Template source abstraction.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("unsupported template scheme `{scheme}`")]
    UnsupportedScheme { scheme: String },
    #[error("template request failed: {0}")]
    Transport(String),
    #[error("template source answered with status {status}")]
    Status { status: u16 },
    #[error("template exceeds {limit} bytes")]
    TooLarge { limit: usize },
    #[error("template file could not be read: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolves a template URI into raw bytes.
#[async_trait]
pub trait TemplateFetcher: Send + Sync {
    async fn fetch(&self, uri: &Url) -> Result<Bytes, FetchError>;
}
