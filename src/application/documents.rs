//! Document reads through the cache, and writes that keep it consistent.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::application::repos::{
    CreateDocumentParams, DocumentsRepo, DocumentsWriteRepo, RepoError, UpdateDocumentParams,
};
use crate::cache::{CacheError, DocumentCache, DocumentKey, LoaderError};
use crate::domain::documents::{DocumentPatch, NewDocument};
use crate::domain::entities::Document;
use crate::domain::error::DomainError;

#[derive(Debug, Error)]
pub enum DocumentServiceError {
    #[error("no document matches {key}")]
    NotFound { key: DocumentKey },
    #[error("failed to load {key}")]
    LoadFailure {
        key: DocumentKey,
        #[source]
        source: Arc<LoaderError>,
    },
    #[error("a document named `{name}` already exists")]
    Conflict { name: String },
    #[error("document {id} was modified concurrently")]
    StaleVersion { id: i64 },
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<CacheError> for DocumentServiceError {
    fn from(error: CacheError) -> Self {
        match error {
            CacheError::NotFound { key } => Self::NotFound { key },
            CacheError::LoadFailure { key, source } => Self::LoadFailure { key, source },
        }
    }
}

/// Entry point for reading and mutating documents.
///
/// Reads by key go through the [`DocumentCache`]. Writes go to the store and,
/// once committed, invalidate every key that could address the old or new
/// record.
#[derive(Clone)]
pub struct DocumentService {
    reader: Arc<dyn DocumentsRepo>,
    writer: Arc<dyn DocumentsWriteRepo>,
    cache: DocumentCache,
}

impl DocumentService {
    pub fn new(
        reader: Arc<dyn DocumentsRepo>,
        writer: Arc<dyn DocumentsWriteRepo>,
        cache: DocumentCache,
    ) -> Self {
        Self {
            reader,
            writer,
            cache,
        }
    }

    pub fn cache(&self) -> &DocumentCache {
        &self.cache
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: NewDocument) -> Result<Document, DocumentServiceError> {
        let valid = input.validate()?;
        let name = valid.name.clone();

        let document = self
            .writer
            .create_document(CreateDocumentParams {
                name: valid.name,
                description: valid.description,
                template_uri: valid.template_uri,
            })
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => DocumentServiceError::Conflict { name },
                other => other.into(),
            })?;

        info!(document_id = document.id, name = %document.name, "document created");
        Ok(document)
    }

    /// Resolves `key` through the cache, loading the template on a miss.
    pub async fn find(&self, key: &DocumentKey) -> Result<Arc<Document>, DocumentServiceError> {
        Ok(self.cache.get_or_load(key).await?)
    }

    /// Cache-only lookup.
    pub fn find_cached(&self, key: &DocumentKey) -> Option<Arc<Document>> {
        self.cache.peek(key)
    }

    /// Store listing ordered by id; entries carry no template content.
    pub async fn list(&self, limit: u32, offset: u64) -> Result<Vec<Document>, DocumentServiceError> {
        Ok(self.reader.list_documents(limit, offset).await?)
    }

    pub async fn count(&self) -> Result<u64, DocumentServiceError> {
        Ok(self.reader.count_documents().await?)
    }

    /// Applies the fields of `patch` that differ from the stored record.
    ///
    /// An empty or no-op patch returns the stored record without writing.
    #[instrument(skip(self, patch))]
    pub async fn update(
        &self,
        id: i64,
        patch: DocumentPatch,
    ) -> Result<Document, DocumentServiceError> {
        let existing = self
            .reader
            .find_by_id(id)
            .await?
            .ok_or(DocumentServiceError::NotFound {
                key: DocumentKey::id(id),
            })?;

        let Some(changes) = patch.resolve(&existing)? else {
            debug!(document_id = id, "patch leaves document unchanged");
            return Ok(existing);
        };
        let name = changes.name.clone();

        let updated = self
            .writer
            .update_document(UpdateDocumentParams {
                id,
                expected_version: existing.version,
                name: changes.name,
                description: changes.description,
                template_uri: changes.template_uri,
            })
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => DocumentServiceError::Conflict { name },
                RepoError::StaleVersion { id, .. } => DocumentServiceError::StaleVersion { id },
                RepoError::NotFound => DocumentServiceError::NotFound {
                    key: DocumentKey::id(id),
                },
                other => other.into(),
            })?;

        self.invalidate_document(&existing);
        if updated.name != existing.name {
            self.cache.invalidate(&DocumentKey::name(updated.name.clone()));
        }

        info!(
            document_id = updated.id,
            version = updated.version,
            "document updated"
        );
        Ok(updated)
    }

    /// Deletes the record addressed by `key` and returns it.
    #[instrument(skip(self, key), fields(key = %key))]
    pub async fn delete(&self, key: &DocumentKey) -> Result<Document, DocumentServiceError> {
        let found = match key {
            DocumentKey::Id(id) => self.reader.find_by_id(*id).await?,
            DocumentKey::Name(name) => self.reader.find_by_name(name).await?,
        };
        let existing = found.ok_or_else(|| DocumentServiceError::NotFound { key: key.clone() })?;

        let deleted = self
            .writer
            .delete_document(existing.id)
            .await
            .map_err(|err| match err {
                RepoError::NotFound => DocumentServiceError::NotFound { key: key.clone() },
                other => other.into(),
            })?;

        self.invalidate_document(&deleted);
        if deleted.name != existing.name {
            self.cache.invalidate(&DocumentKey::name(existing.name.clone()));
        }

        info!(document_id = deleted.id, name = %deleted.name, "document deleted");
        Ok(deleted)
    }

    fn invalidate_document(&self, document: &Document) {
        for key in DocumentKey::for_document(document) {
            self.cache.invalidate(&key);
        }
    }
}
