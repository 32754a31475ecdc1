//! Error types for singledrive.

use thiserror::Error;

/// Common error type for singledrive.
#[derive(Error, Debug)]
pub enum DriveError {
    /// Malformed logical path or a traversal attempt.
    ///
    /// Raised before any mutation, so no state has changed.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Referenced node or file does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Destination path is already occupied.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Validation error for user input that is not a path.
    #[error("validation error: {0}")]
    Validation(String),

    /// Relational store error.
    ///
    /// The surrounding transaction has been rolled back.
    #[error("database error: {0}")]
    Database(String),

    /// Filesystem step failed and the whole operation was abandoned.
    ///
    /// Post-commit filesystem failures are not reported through this variant;
    /// they surface as a warning on an otherwise successful result.
    #[error("filesystem error: {0}")]
    Mirror(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive packaging error.
    #[error("archive error: {0}")]
    Archive(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for DriveError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return DriveError::Conflict(db_err.message().to_string());
            }
        }
        DriveError::Database(e.to_string())
    }
}

impl From<zip::result::ZipError> for DriveError {
    fn from(e: zip::result::ZipError) -> Self {
        DriveError::Archive(e.to_string())
    }
}

/// Result type alias for singledrive operations.
pub type Result<T> = std::result::Result<T, DriveError>;
