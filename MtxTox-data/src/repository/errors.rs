use thiserror::Error;

/// Error type for repository operations
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found error
    #[error("Patient not found: {0}")]
    NotFound(String),

    /// Malformed measurement rows
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Dataset could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
