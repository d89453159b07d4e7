//! Materializes documents for the cache.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::application::repos::{DocumentsRepo, RepoError};
use crate::application::templates::{FetchError, TemplateFetcher};
use crate::domain::entities::Document;

use super::keys::DocumentKey;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("no document matches {key}")]
    NotFound { key: DocumentKey },
    #[error("document store lookup for {key} failed")]
    Store {
        key: DocumentKey,
        #[source]
        source: RepoError,
    },
    #[error("template `{uri}` for {key} could not be fetched")]
    Template {
        key: DocumentKey,
        uri: Url,
        #[source]
        source: FetchError,
    },
    #[error("loading {key} exceeded {timeout:?}")]
    Timeout { key: DocumentKey, timeout: Duration },
    #[error("loading {key} was aborted: {reason}")]
    Aborted { key: DocumentKey, reason: String },
}

impl LoaderError {
    pub fn key(&self) -> &DocumentKey {
        match self {
            Self::NotFound { key }
            | Self::Store { key, .. }
            | Self::Template { key, .. }
            | Self::Timeout { key, .. }
            | Self::Aborted { key, .. } => key,
        }
    }
}

/// Resolves a key into a fully populated [`Document`].
///
/// Implementations must not touch the cache; the cache decides what to keep.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    async fn load(&self, key: &DocumentKey) -> Result<Document, LoaderError>;
}

/// Loader backed by the document store and a template fetcher: one store
/// query, then one fetch when the record names a template.
#[derive(Clone)]
pub struct StoreDocumentLoader {
    documents: Arc<dyn DocumentsRepo>,
    templates: Arc<dyn TemplateFetcher>,
}

impl StoreDocumentLoader {
    pub fn new(documents: Arc<dyn DocumentsRepo>, templates: Arc<dyn TemplateFetcher>) -> Self {
        Self {
            documents,
            templates,
        }
    }
}

#[async_trait]
impl DocumentLoader for StoreDocumentLoader {
    #[instrument(skip(self, key), fields(key = %key))]
    async fn load(&self, key: &DocumentKey) -> Result<Document, LoaderError> {
        let found = match key {
            DocumentKey::Id(id) => self.documents.find_by_id(*id).await,
            DocumentKey::Name(name) => self.documents.find_by_name(name).await,
        }
        .map_err(|source| LoaderError::Store {
            key: key.clone(),
            source,
        })?;

        let Some(document) = found else {
            return Err(LoaderError::NotFound { key: key.clone() });
        };

        let Some(uri) = document.template_uri.clone() else {
            debug!(document_id = document.id, "document has no template");
            return Ok(document.with_template(Bytes::new()));
        };

        let template =
            self.templates
                .fetch(&uri)
                .await
                .map_err(|source| LoaderError::Template {
                    key: key.clone(),
                    uri: uri.clone(),
                    source,
                })?;

        debug!(
            document_id = document.id,
            template_uri = %uri,
            template_bytes = template.len(),
            "template attached"
        );
        Ok(document.with_template(template))
    }
}
