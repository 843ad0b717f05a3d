use crate::error::{Result, SnapshotError};
use context_graph::{Bundle, BUNDLE_SCHEMA_VERSION};
use serde::{Deserialize, Serialize};

/// On-disk layout of a context file. Presentation only; never affects hashes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One pretty-printed JSON array of bundles.
    #[default]
    Json,
    /// One bundle per line.
    Ndjson,
}

impl OutputFormat {
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Json => "context.json",
            Self::Ndjson => "context.ndjson",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "ndjson" | "jsonl" => Some(Self::Ndjson),
            _ => None,
        }
    }
}

pub fn encode_bundles(bundles: &[&Bundle], format: OutputFormat) -> Result<Vec<u8>> {
    match format {
        OutputFormat::Json => {
            let mut bytes = serde_json::to_vec_pretty(bundles)?;
            bytes.push(b'\n');
            Ok(bytes)
        }
        OutputFormat::Ndjson => {
            let mut bytes = Vec::new();
            for bundle in bundles {
                serde_json::to_writer(&mut bytes, bundle)?;
                bytes.push(b'\n');
            }
            Ok(bytes)
        }
    }
}

/// Decode a context file, accepting either layout.
pub fn decode_bundles(bytes: &[u8]) -> Result<Vec<Bundle>> {
    let first = bytes.iter().find(|b| !b.is_ascii_whitespace());
    let bundles: Vec<Bundle> = match first {
        None => Vec::new(),
        Some(b'[') => serde_json::from_slice(bytes)?,
        Some(_) => {
            let mut out = Vec::new();
            for line in bytes.split(|b| *b == b'\n') {
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                out.push(serde_json::from_slice(line)?);
            }
            out
        }
    };

    if let Some(bad) = bundles
        .iter()
        .find(|b| b.schema_version != BUNDLE_SCHEMA_VERSION)
    {
        return Err(SnapshotError::UnsupportedSchema {
            artifact: "bundle",
            found: bad.schema_version.clone(),
            expected: BUNDLE_SCHEMA_VERSION,
        });
    }
    Ok(bundles)
}
