use thiserror::Error;

/// Why a single file could not be turned into a contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("source is not valid UTF-8")]
    InvalidUtf8,

    #[error("unsupported file type: {0}")]
    Unsupported(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ExtractError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
