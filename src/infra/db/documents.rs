use async_trait::async_trait;
use sqlx::FromRow;
use time::OffsetDateTime;
use url::Url;

use crate::application::repos::{
    CreateDocumentParams, DocumentsRepo, DocumentsWriteRepo, RepoError, UpdateDocumentParams,
};
use crate::domain::entities::Document;

use super::{PostgresRepositories, map_sqlx_error};

const DOCUMENT_COLUMNS: &str =
    "id, name, description, template_uri, created_at, updated_at, version";

#[derive(FromRow)]
struct DocumentRow {
    id: i64,
    name: String,
    description: Option<String>,
    template_uri: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    version: i32,
}

impl TryFrom<DocumentRow> for Document {
    type Error = RepoError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        let template_uri = row
            .template_uri
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|err| {
                RepoError::from_persistence(format!(
                    "document {} has a malformed template uri: {err}",
                    row.id
                ))
            })?;

        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            template_uri,
            template: None,
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: row.version,
        })
    }
}

fn uri_text(uri: Option<&Url>) -> Option<&str> {
    uri.map(Url::as_str)
}

#[async_trait]
impl DocumentsRepo for PostgresRepositories {
    async fn find_by_id(&self, id: i64) -> Result<Option<Document>, RepoError> {
        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1");
        sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .map(Document::try_from)
            .transpose()
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Document>, RepoError> {
        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE name = $1");
        sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(name)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .map(Document::try_from)
            .transpose()
    }

    async fn list_documents(&self, limit: u32, offset: u64) -> Result<Vec<Document>, RepoError> {
        let offset = i64::try_from(offset).map_err(|_| RepoError::InvalidInput {
            message: format!("offset {offset} is out of range"),
        })?;
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY id ASC LIMIT $1 OFFSET $2"
        );
        sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(i64::from(limit))
            .bind(offset)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .into_iter()
            .map(Document::try_from)
            .collect()
    }

    async fn count_documents(&self) -> Result<u64, RepoError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Self::convert_count(count)
    }
}

#[async_trait]
impl DocumentsWriteRepo for PostgresRepositories {
    async fn create_document(&self, params: CreateDocumentParams) -> Result<Document, RepoError> {
        let sql = format!(
            "INSERT INTO documents (name, description, template_uri) \
             VALUES ($1, $2, $3) \
             RETURNING {DOCUMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(&params.name)
            .bind(params.description.as_deref())
            .bind(uri_text(params.template_uri.as_ref()))
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Document::try_from(row)
    }

    async fn update_document(&self, params: UpdateDocumentParams) -> Result<Document, RepoError> {
        let sql = format!(
            "UPDATE documents \
             SET name = $2, description = $3, template_uri = $4, \
                 version = version + 1, updated_at = now() \
             WHERE id = $1 AND version = $5 \
             RETURNING {DOCUMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(params.id)
            .bind(&params.name)
            .bind(params.description.as_deref())
            .bind(uri_text(params.template_uri.as_ref()))
            .bind(params.expected_version)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        match row {
            Some(row) => Document::try_from(row),
            None => {
                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM documents WHERE id = $1)")
                        .bind(params.id)
                        .fetch_one(self.pool())
                        .await
                        .map_err(map_sqlx_error)?;
                if exists {
                    Err(RepoError::StaleVersion {
                        id: params.id,
                        expected: params.expected_version,
                    })
                } else {
                    Err(RepoError::NotFound)
                }
            }
        }
    }

    async fn delete_document(&self, id: i64) -> Result<Document, RepoError> {
        let sql = format!("DELETE FROM documents WHERE id = $1 RETURNING {DOCUMENT_COLUMNS}");
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .ok_or(RepoError::NotFound)?;

        Document::try_from(row)
    }
}
