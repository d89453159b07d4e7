//! Template fetcher for `http`, `https` and `file` URLs.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::Client;
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument};
use url::Url;

use crate::application::templates::{FetchError, TemplateFetcher};
use crate::config::TemplateSettings;

use super::error::InfraError;

#[derive(Clone, Debug)]
pub struct HttpTemplateFetcher {
    client: Client,
    max_bytes: usize,
}

impl HttpTemplateFetcher {
    pub fn new(settings: &TemplateSettings) -> Result<Self, InfraError> {
        let max_bytes = usize::try_from(settings.max_bytes.get()).unwrap_or(usize::MAX);
        Self::with_limits(settings.timeout, max_bytes)
    }

    pub fn with_limits(timeout: Duration, max_bytes: usize) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::configuration(format!("template client: {err}")))?;
        Ok(Self { client, max_bytes })
    }

    pub fn user_agent() -> &'static str {
        concat!("docasm/", env!("CARGO_PKG_VERSION"))
    }

    async fn fetch_http(&self, uri: &Url) -> Result<Bytes, FetchError> {
        let mut response = self
            .client
            .get(uri.clone())
            .send()
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        if let Some(length) = response.content_length() {
            if length > self.max_bytes as u64 {
                return Err(FetchError::TooLarge {
                    limit: self.max_bytes,
                });
            }
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))?
        {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body.freeze())
    }

    async fn fetch_file(&self, uri: &Url) -> Result<Bytes, FetchError> {
        let path = uri.to_file_path().map_err(|()| {
            FetchError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("`{uri}` does not name a local file"),
            ))
        })?;

        // Reported sizes can be stale or zero, so the cap applies to the read.
        let file = tokio::fs::File::open(&path).await?;
        let mut body = Vec::new();
        file.take((self.max_bytes as u64).saturating_add(1))
            .read_to_end(&mut body)
            .await?;
        if body.len() > self.max_bytes {
            return Err(FetchError::TooLarge {
                limit: self.max_bytes,
            });
        }
        Ok(Bytes::from(body))
    }
}

#[async_trait]
impl TemplateFetcher for HttpTemplateFetcher {
    #[instrument(skip(self, uri), fields(uri = %uri))]
    async fn fetch(&self, uri: &Url) -> Result<Bytes, FetchError> {
        let body = match uri.scheme() {
            "http" | "https" => self.fetch_http(uri).await?,
            "file" => self.fetch_file(uri).await?,
            other => {
                return Err(FetchError::UnsupportedScheme {
                    scheme: other.to_string(),
                });
            }
        };
        debug!(bytes = body.len(), "template fetched");
        Ok(body)
    }
}
