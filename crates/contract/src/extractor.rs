use crate::error::ExtractError;
use crate::id::EntryId;
use crate::model::ModuleSummary;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Per-file static analyzer.
///
/// Implementations must be pure: the same id and contents always produce the
/// same summary.
pub trait Extractor: Send + Sync {
    fn extract(&self, entry_id: &EntryId, contents: &str) -> Result<ModuleSummary, ExtractError>;

    /// Whether this extractor understands `path`. Files it rejects are never
    /// read.
    fn supports(&self, path: &Path) -> bool {
        let _ = path;
        true
    }
}

/// A file that was skipped because extraction failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionFailure {
    pub entry_id: EntryId,
    pub reason: String,
}

impl ExtractionFailure {
    #[must_use]
    pub fn new(entry_id: EntryId, err: &ExtractError) -> Self {
        Self {
            entry_id,
            reason: err.to_string(),
        }
    }
}
