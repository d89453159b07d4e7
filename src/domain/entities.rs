//! Domain entities mirrored from persistent storage.

use bytes::Bytes;
use serde::Serialize;
use time::OffsetDateTime;
use url::Url;

/// A stored document and, when resolved through the document cache, the
/// template content fetched from its `template_uri`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_uri: Option<Url>,
    /// Never persisted. Only the cache loader fills this in.
    #[serde(skip)]
    pub template: Option<Bytes>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub version: i32,
}

impl Document {
    /// Attach fetched template content, consuming the record.
    pub fn with_template(mut self, template: Bytes) -> Self {
        self.template = Some(template);
        self
    }

    pub fn has_template(&self) -> bool {
        self.template.is_some()
    }

    /// Template content decoded as UTF-8, if present and valid.
    pub fn template_text(&self) -> Option<&str> {
        self.template
            .as_ref()
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
    }
}
