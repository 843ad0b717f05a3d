use thiserror::Error;

pub type Result<T> = std::result::Result<T, SnapshotError>;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported {artifact} schema version {found} (expected {expected})")]
    UnsupportedSchema {
        artifact: &'static str,
        found: String,
        expected: &'static str,
    },

    #[error("Invalid snapshot layout: {0}")]
    InvalidLayout(String),
}
