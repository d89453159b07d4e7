use std::sync::Arc;

use thiserror::Error;

use super::keys::DocumentKey;
use super::loader::LoaderError;

/// Outcome of a failed [`DocumentCache::get_or_load`](super::DocumentCache::get_or_load).
///
/// Cloneable so that every caller coalesced on one load receives the same
/// failure.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("no document matches {key}")]
    NotFound { key: DocumentKey },
    #[error("failed to load {key}")]
    LoadFailure {
        key: DocumentKey,
        #[source]
        source: Arc<LoaderError>,
    },
}

impl CacheError {
    pub fn key(&self) -> &DocumentKey {
        match self {
            Self::NotFound { key } | Self::LoadFailure { key, .. } => key,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<LoaderError> for CacheError {
    fn from(error: LoaderError) -> Self {
        match error {
            LoaderError::NotFound { key } => Self::NotFound { key },
            other => Self::LoadFailure {
                key: other.key().clone(),
                source: Arc::new(other),
            },
        }
    }
}
