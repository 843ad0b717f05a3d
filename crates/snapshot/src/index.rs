use crate::error::Result;
use crate::format::{encode_bundles, OutputFormat};
use context_contract::EntryId;
use context_graph::{Bundle, Graph};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const INDEX_TYPE: &str = "ContextIndex";
pub const INDEX_SCHEMA_VERSION: &str = "0.1";
pub const INDEX_FILE_NAME: &str = "context_main.json";

/// Aggregate view of one full run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    #[serde(rename = "type")]
    pub kind: String,
    pub schema_version: String,
    pub project_root: String,
    pub created_at: u64,
    pub summary: IndexSummary,
    pub folders: Vec<FolderEntry>,
    #[serde(default)]
    pub roots: Vec<EntryId>,
    #[serde(default)]
    pub leaves: Vec<EntryId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cycles: Vec<Vec<EntryId>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSummary {
    pub total_bundles: usize,
    pub total_folders: usize,
    pub total_components: usize,
    pub total_nodes: usize,
    pub total_edges: usize,
    pub total_missing: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderEntry {
    pub path: String,
    /// Context file path relative to the output directory.
    pub context_file: String,
    pub bundles: usize,
    pub components: usize,
    pub is_root: bool,
    pub size: SizeEstimate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeEstimate {
    pub bytes: usize,
    pub tokens: usize,
}

impl SizeEstimate {
    #[must_use]
    pub const fn from_bytes(bytes: usize) -> Self {
        Self {
            bytes,
            tokens: bytes.div_ceil(4),
        }
    }
}

/// Bundles grouped by folder, each group sorted by root id.
#[must_use]
pub fn group_by_folder(bundles: &[Bundle]) -> BTreeMap<String, Vec<&Bundle>> {
    let mut groups: BTreeMap<String, Vec<&Bundle>> = BTreeMap::new();
    for bundle in bundles {
        groups.entry(bundle.folder()).or_default().push(bundle);
    }
    for group in groups.values_mut() {
        group.sort_by(|a, b| a.entry_id.cmp(&b.entry_id));
    }
    groups
}

/// Context file path for `folder`, relative to the output directory.
#[must_use]
pub fn context_file_for(folder: &str, format: OutputFormat) -> String {
    if folder == "." {
        format.file_name().to_string()
    } else {
        format!("{folder}/{}", format.file_name())
    }
}

impl Index {
    pub fn build(
        project_root: &str,
        bundles: &[Bundle],
        graph: &Graph,
        format: OutputFormat,
        created_at: u64,
    ) -> Result<Self> {
        let groups = group_by_folder(bundles);
        let mut folders = Vec::with_capacity(groups.len());
        for (path, group) in &groups {
            let encoded = encode_bundles(group, format)?;
            let components: BTreeSet<&EntryId> =
                group.iter().flat_map(|b| b.node_ids()).collect();
            folders.push(FolderEntry {
                path: path.clone(),
                context_file: context_file_for(path, format),
                bundles: group.len(),
                components: components.len(),
                is_root: path == ".",
                size: SizeEstimate::from_bytes(encoded.len()),
            });
        }

        let components: BTreeSet<&EntryId> = bundles.iter().flat_map(|b| b.node_ids()).collect();
        let missing: BTreeSet<&str> = bundles
            .iter()
            .flat_map(|b| b.meta.missing.iter().map(|m| m.name.as_str()))
            .collect();

        let summary = IndexSummary {
            total_bundles: bundles.len(),
            total_folders: folders.len(),
            total_components: components.len(),
            total_nodes: graph.node_count(),
            total_edges: graph.edge_count(),
            total_missing: missing.len(),
        };

        Ok(Self {
            kind: INDEX_TYPE.to_string(),
            schema_version: INDEX_SCHEMA_VERSION.to_string(),
            project_root: project_root.to_string(),
            created_at,
            summary,
            folders,
            roots: graph.roots().iter().cloned().collect(),
            leaves: graph.leaves().iter().cloned().collect(),
            cycles: graph.cycles(),
        })
    }
}
