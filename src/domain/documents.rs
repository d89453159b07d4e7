//! Validation and patch rules for document writes.
//!
//! Everything here is pure: inputs come in as loosely-typed strings and leave
//! as normalised values ready for the store.

use url::Url;

use super::entities::Document;
use super::error::DomainError;

pub const MAX_NAME_LEN: usize = 255;

const ALLOWED_TEMPLATE_SCHEMES: [&str; 3] = ["http", "https", "file"];

/// Trim and validate a document name.
pub fn normalize_name(raw: &str) -> Result<String, DomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("name", "must not be empty"));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::validation(
            "name",
            format!("must be at most {MAX_NAME_LEN} characters"),
        ));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(DomainError::validation(
            "name",
            "must not contain control characters",
        ));
    }
    Ok(trimmed.to_string())
}

/// Blank descriptions are stored as absent.
pub fn normalize_description(raw: Option<String>) -> Option<String> {
    raw.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

/// Parse a template URI, accepting only schemes the template fetcher serves.
pub fn parse_template_uri(raw: &str) -> Result<Url, DomainError> {
    let trimmed = raw.trim();
    let url = Url::parse(trimmed).map_err(|err| {
        DomainError::validation("template_uri", format!("`{trimmed}` is not a URL: {err}"))
    })?;
    if !ALLOWED_TEMPLATE_SCHEMES.contains(&url.scheme()) {
        return Err(DomainError::validation(
            "template_uri",
            format!("unsupported scheme `{}`", url.scheme()),
        ));
    }
    Ok(url)
}

fn parse_optional_template_uri(raw: Option<String>) -> Result<Option<Url>, DomainError> {
    match raw {
        Some(value) if !value.trim().is_empty() => parse_template_uri(&value).map(Some),
        _ => Ok(None),
    }
}

/// Unvalidated input for creating a document.
#[derive(Debug, Clone, Default)]
pub struct NewDocument {
    pub name: String,
    pub description: Option<String>,
    pub template_uri: Option<String>,
}

/// A creation request that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidNewDocument {
    pub name: String,
    pub description: Option<String>,
    pub template_uri: Option<Url>,
}

impl NewDocument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_template_uri(mut self, uri: impl Into<String>) -> Self {
        self.template_uri = Some(uri.into());
        self
    }

    pub fn validate(self) -> Result<ValidNewDocument, DomainError> {
        Ok(ValidNewDocument {
            name: normalize_name(&self.name)?,
            description: normalize_description(self.description),
            template_uri: parse_optional_template_uri(self.template_uri)?,
        })
    }
}

/// Partial update. `None` leaves a field untouched; for the optional fields
/// `Some(None)` clears the stored value.
#[derive(Debug, Clone, Default)]
pub struct DocumentPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub template_uri: Option<Option<String>>,
}

/// Full set of mutable fields after a patch has been applied to a record.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChanges {
    pub name: String,
    pub description: Option<String>,
    pub template_uri: Option<Url>,
}

impl DocumentPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.template_uri.is_none()
    }

    /// Resolve the patch against the stored record.
    ///
    /// Returns `Ok(None)` when no field would change.
    pub fn resolve(self, existing: &Document) -> Result<Option<DocumentChanges>, DomainError> {
        let name = match self.name {
            Some(raw) => normalize_name(&raw)?,
            None => existing.name.clone(),
        };
        let description = match self.description {
            Some(raw) => normalize_description(raw),
            None => existing.description.clone(),
        };
        // Clearing is explicit; a blank replacement is rejected.
        let template_uri = match self.template_uri {
            Some(Some(raw)) if raw.trim().is_empty() => {
                return Err(DomainError::validation(
                    "template_uri",
                    "must not be blank; clear it explicitly instead",
                ));
            }
            Some(Some(raw)) => Some(parse_template_uri(&raw)?),
            Some(None) => None,
            None => existing.template_uri.clone(),
        };

        let unchanged = name == existing.name
            && description == existing.description
            && template_uri == existing.template_uri;
        if unchanged {
            return Ok(None);
        }

        Ok(Some(DocumentChanges {
            name,
            description,
            template_uri,
        }))
    }
}
