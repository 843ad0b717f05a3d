use crate::bundle::{
    Bundle, BundleEdge, BundleGraph, BundleMeta, BundleNode, MissingDep, BUNDLE_SCHEMA_VERSION,
    BUNDLE_TYPE,
};
use crate::error::{GraphError, Result};
use crate::graph::Graph;
use context_contract::{bundle_hash, ContractStore, EntryId, NodeDigest};
use std::collections::BTreeSet;

pub const DEFAULT_MAX_DEPTH: usize = 2;
pub const DEFAULT_MAX_NODES: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackOptions {
    pub max_depth: usize,
    pub max_nodes: usize,
    /// Tool/version tag recorded in `meta.source`.
    pub source: String,
    /// Unix milliseconds stamped into `createdAt`.
    pub created_at: u64,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_nodes: DEFAULT_MAX_NODES,
            source: concat!("context-stamp@", env!("CARGO_PKG_VERSION")).to_string(),
            created_at: 0,
        }
    }
}

/// Packages bounded subgraphs of a [`Graph`] into [`Bundle`]s.
pub struct BundlePacker<'a> {
    graph: &'a Graph,
    store: &'a ContractStore,
}

impl<'a> BundlePacker<'a> {
    #[must_use]
    pub const fn new(graph: &'a Graph, store: &'a ContractStore) -> Self {
        Self { graph, store }
    }

    /// Breadth-first pack from `root`.
    ///
    /// Layer `d` holds the unvisited forward targets of layer `d - 1`. When a
    /// layer would overflow `max_nodes` its candidates are sorted by id and
    /// truncated, and traversal stops there. Visited nodes are never queued
    /// again, so cycles terminate.
    pub fn pack(&self, root: &EntryId, options: &PackOptions) -> Result<Bundle> {
        if options.max_nodes == 0 {
            return Err(GraphError::InvalidBudget(
                "max_nodes must be at least 1".to_string(),
            ));
        }
        let root = self
            .store
            .get(root)
            .map(|c| c.entry_id.clone())
            .filter(|id| self.graph.contains(id))
            .ok_or_else(|| GraphError::UnresolvedRoot(root.clone()))?;

        let mut visited: BTreeSet<EntryId> = BTreeSet::from([root.clone()]);
        let mut frontier = vec![root.clone()];

        for _ in 0..options.max_depth {
            let candidates: BTreeSet<EntryId> = frontier
                .iter()
                .flat_map(|id| self.graph.forward_edges(id))
                .filter(|id| !visited.contains(id))
                .collect();
            if candidates.is_empty() {
                break;
            }

            let remaining = options.max_nodes.saturating_sub(visited.len());
            if remaining == 0 {
                break;
            }
            let truncated = candidates.len() > remaining;
            let layer: Vec<EntryId> = candidates.into_iter().take(remaining).collect();
            if truncated {
                log::debug!(
                    "Bundle {root}: node budget {} reached, layer truncated",
                    options.max_nodes
                );
            }
            visited.extend(layer.iter().cloned());
            frontier = layer;
            if truncated {
                break;
            }
        }

        let mut edges = Vec::new();
        let mut missing = BTreeSet::new();
        for id in &visited {
            for target in self.graph.forward_edges(id) {
                if visited.contains(&target) {
                    edges.push(BundleEdge {
                        from: id.clone(),
                        to: target,
                    });
                }
            }
            if let Some(names) = self.graph.missing(id) {
                missing.extend(names.iter().cloned());
            }
        }
        edges.sort();

        let nodes: Vec<BundleNode> = visited
            .iter()
            .map(|id| {
                let contract = self.store.get(id).cloned();
                if contract.is_none() {
                    log::warn!("Bundle {root}: no contract for graph node {id}, node skipped");
                }
                BundleNode {
                    entry_id: id.clone(),
                    contract,
                }
            })
            .collect();

        let digest_inputs: Vec<(&EntryId, NodeDigest<'_>)> = nodes
            .iter()
            .map(|n| {
                let digest = n
                    .contract
                    .as_ref()
                    .map_or(NodeDigest::Skipped, |c| NodeDigest::Semantic(&c.semantic_hash));
                (&n.entry_id, digest)
            })
            .collect();
        let edge_inputs: Vec<(&EntryId, &EntryId)> = edges.iter().map(|e| (&e.from, &e.to)).collect();
        let hash = bundle_hash(&digest_inputs, &edge_inputs);

        Ok(Bundle {
            kind: BUNDLE_TYPE.to_string(),
            schema_version: BUNDLE_SCHEMA_VERSION.to_string(),
            entry_id: root,
            depth: options.max_depth,
            created_at: options.created_at,
            bundle_hash: hash,
            graph: BundleGraph { nodes, edges },
            meta: BundleMeta {
                missing: missing.into_iter().map(|name| MissingDep { name }).collect(),
                source: options.source.clone(),
            },
        })
    }

    /// Pack every root. A root that cannot be packed is reported and skipped;
    /// the rest proceed.
    pub fn pack_all<'r>(
        &self,
        roots: impl IntoIterator<Item = &'r EntryId>,
        options: &PackOptions,
    ) -> (Vec<Bundle>, Vec<GraphError>) {
        let mut bundles = Vec::new();
        let mut errors = Vec::new();
        for root in roots {
            match self.pack(root, options) {
                Ok(bundle) => bundles.push(bundle),
                Err(err) => {
                    log::warn!("Skipping bundle: {err}");
                    errors.push(err);
                }
            }
        }
        (bundles, errors)
    }
}
