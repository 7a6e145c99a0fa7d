#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Evidence already exists: {filename}")]
    DuplicateEvidence { filename: String },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Storage failure: {0}")]
    Storage(String),
}
