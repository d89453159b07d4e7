use std::error::Error as StdError;

use thiserror::Error;

use crate::application::documents::DocumentServiceError;
use crate::infra::error::InfraError;

/// Flattened error chain attached to failure logs.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self { source, messages }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Documents(#[from] DocumentServiceError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Process exit status for this failure class.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Documents(DocumentServiceError::Validation(_)) | AppError::Validation(_) => 2,
            AppError::Documents(DocumentServiceError::NotFound { .. }) => 3,
            AppError::Documents(DocumentServiceError::Conflict { .. })
            | AppError::Documents(DocumentServiceError::StaleVersion { .. }) => 4,
            AppError::Documents(DocumentServiceError::LoadFailure { .. })
            | AppError::Documents(DocumentServiceError::Repo(_))
            | AppError::Infra(_)
            | AppError::Unexpected(_) => 1,
        }
    }

    pub fn presentation_message(&self) -> &'static str {
        match self.exit_code() {
            2 => "Request could not be processed",
            3 => "Document not found",
            4 => "Document conflicts with the stored state",
            _ => match self {
                AppError::Documents(DocumentServiceError::LoadFailure { .. }) => {
                    "Document could not be loaded"
                }
                AppError::Infra(InfraError::Database { .. }) => "Database unavailable",
                AppError::Infra(InfraError::Configuration { .. }) => "Service misconfigured",
                AppError::Infra(InfraError::Telemetry(_)) => "Logging subsystem could not start",
                _ => "Unexpected error occurred",
            },
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport::from_error("application::error::AppError", self)
    }
}
