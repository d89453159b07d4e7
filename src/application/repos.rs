//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::domain::entities::Document;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("document {id} changed concurrently (expected version {expected})")]
    StaleVersion { id: i64, expected: i32 },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CreateDocumentParams {
    pub name: String,
    pub description: Option<String>,
    pub template_uri: Option<Url>,
}

#[derive(Debug, Clone)]
pub struct UpdateDocumentParams {
    pub id: i64,
    pub expected_version: i32,
    pub name: String,
    pub description: Option<String>,
    pub template_uri: Option<Url>,
}

/// Read side of the document store. Records returned here never carry
/// template content.
#[async_trait]
pub trait DocumentsRepo: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Document>, RepoError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<Document>, RepoError>;

    async fn list_documents(&self, limit: u32, offset: u64) -> Result<Vec<Document>, RepoError>;

    async fn count_documents(&self) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait DocumentsWriteRepo: Send + Sync {
    /// Inserts a record with version 0. A taken name yields
    /// [`RepoError::Duplicate`].
    async fn create_document(&self, params: CreateDocumentParams) -> Result<Document, RepoError>;

    /// Applies `params` only if the stored version still equals
    /// `expected_version`, bumping the version by one.
    async fn update_document(&self, params: UpdateDocumentParams) -> Result<Document, RepoError>;

    async fn delete_document(&self, id: i64) -> Result<Document, RepoError>;
}
