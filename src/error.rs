//! Error types for rozgar.

use thiserror::Error;

/// A single field-level validation failure, reported back to API callers.
#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub struct FieldError {
    /// Name of the offending field.
    pub field: String,
    /// Human-readable description of the problem.
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Main error type for rozgar.
#[derive(Error, Debug)]
pub enum RozgarError {
    #[error("Invalid coordinates: {0}")]
    InvalidCoordinate(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Too many requests")]
    RateLimited,

    #[error("Job '{0}' not found")]
    JobNotFound(String),

    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("Sender '{0}' is not registered")]
    UnregisteredSender(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("No database found. Run 'rozgar serve' once to create it.")]
    NoDatabase,

    #[error("Database is corrupted: {0}")]
    CorruptDatabase(String),

    #[error("Database schema version {db_version} is newer than supported version {supported_version}. Update rozgar.")]
    SchemaTooNew { db_version: u32, supported_version: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Result type alias for rozgar operations.
pub type Result<T> = std::result::Result<T, RozgarError>;
