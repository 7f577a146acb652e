use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store file not found: {0}")]
    NotFound(std::path::PathBuf),

    #[error("store header is unreadable: {0}")]
    Corrupt(String),

    #[error("store has no '{0}' column")]
    MissingColumn(String),

    #[error("record is missing its source document tag")]
    Untagged,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}
