use context_contract::EntryId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Bundle root not found: {0}")]
    UnresolvedRoot(EntryId),

    #[error("Invalid packing budget: {0}")]
    InvalidBudget(String),
}
