use context_contract::{Contract, Digest, EntryId};
use serde::{Deserialize, Serialize};

pub const BUNDLE_TYPE: &str = "ContextBundle";
pub const BUNDLE_SCHEMA_VERSION: &str = "0.1";

/// Depth- and size-bounded dependency subgraph rooted at one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    #[serde(rename = "type")]
    pub kind: String,
    pub schema_version: String,
    pub entry_id: EntryId,
    pub depth: usize,
    /// Unix milliseconds.
    pub created_at: u64,
    pub bundle_hash: Digest,
    pub graph: BundleGraph,
    pub meta: BundleMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleGraph {
    pub nodes: Vec<BundleNode>,
    pub edges: Vec<BundleEdge>,
}

/// One packed module. `contract` is absent only for a node the packer had to
/// skip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleNode {
    pub entry_id: EntryId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<Contract>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BundleEdge {
    pub from: EntryId,
    pub to: EntryId,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MissingDep {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleMeta {
    #[serde(default)]
    pub missing: Vec<MissingDep>,
    pub source: String,
}

impl Bundle {
    pub fn node_ids(&self) -> impl Iterator<Item = &EntryId> {
        self.graph.nodes.iter().map(|n| &n.entry_id)
    }

    #[must_use]
    pub fn contains(&self, id: &EntryId) -> bool {
        self.graph.nodes.iter().any(|n| &n.entry_id == id)
    }

    pub fn contracts(&self) -> impl Iterator<Item = &Contract> {
        self.graph.nodes.iter().filter_map(|n| n.contract.as_ref())
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.nodes.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edges.len()
    }

    /// Folder grouping key: the root's directory, `.` for the project root.
    #[must_use]
    pub fn folder(&self) -> String {
        let dir = self.entry_id.dir();
        if dir.is_empty() {
            ".".to_string()
        } else {
            dir.to_string()
        }
    }
}
