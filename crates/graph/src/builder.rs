use crate::graph::Graph;
use crate::resolve::{ImportResolver, Resolution};
use context_contract::{ContractStore, EntryId};
use std::collections::{BTreeMap, BTreeSet};

/// Contract-level changes to fold into an existing graph.
#[derive(Debug, Clone, Default)]
pub struct GraphChanges {
    pub added: BTreeSet<EntryId>,
    pub modified: BTreeSet<EntryId>,
    pub removed: BTreeSet<EntryId>,
}

/// What an incremental relink touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelinkReport {
    /// Modules whose imports were resolved again.
    pub relinked: BTreeSet<EntryId>,
    /// Relinked modules whose missing set differs from before.
    pub missing_changed: BTreeSet<EntryId>,
    /// Relinked modules whose resolved dependencies differ from before.
    pub edges_changed: BTreeSet<EntryId>,
}

/// Builds the dependency graph from a contract store.
///
/// Each contract's declared imports are resolved exactly once; there is no
/// transitive walk here, so cycles need no special handling.
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    resolver: ImportResolver,
}

impl GraphBuilder {
    #[must_use]
    pub const fn new(resolver: ImportResolver) -> Self {
        Self { resolver }
    }

    #[must_use]
    pub fn resolver(&self) -> &ImportResolver {
        &self.resolver
    }

    pub fn build(&self, store: &ContractStore) -> Graph {
        let mut graph = Graph::new();

        // Phase 1: one node per contract
        for id in store.ids() {
            graph.add_node(id.clone());
        }

        // Phase 2: resolve declared imports
        for id in store.ids() {
            self.link(&mut graph, store, id);
        }

        graph.refresh_roots_and_leaves();

        log::info!(
            "Built dependency graph: {} nodes, {} edges, {} roots",
            graph.node_count(),
            graph.edge_count(),
            graph.roots().len()
        );

        graph
    }

    /// Fold contract changes into `graph` touching only affected modules:
    /// the changed ones, importers of removed modules, and importers whose
    /// resolution an added module satisfies or shadows.
    pub fn apply(&self, graph: &mut Graph, store: &ContractStore, changes: &GraphChanges) -> RelinkReport {
        let mut to_relink: BTreeSet<EntryId> = BTreeSet::new();

        for id in &changes.removed {
            to_relink.extend(graph.remove_node(id));
        }
        for id in &changes.added {
            graph.add_node(id.clone());
        }
        for id in &changes.added {
            to_relink.extend(graph.waiting_on(id));
        }
        to_relink.extend(changes.added.iter().cloned());
        to_relink.extend(changes.modified.iter().cloned());
        to_relink.retain(|id| store.contains(id));

        let before: BTreeMap<EntryId, (Vec<EntryId>, Option<BTreeSet<String>>)> = to_relink
            .iter()
            .map(|id| (id.clone(), (graph.forward_edges(id), graph.missing(id).cloned())))
            .collect();

        for id in &to_relink {
            self.link(graph, store, id);
        }
        graph.refresh_roots_and_leaves();

        let mut report = RelinkReport::default();
        for (id, (edges, missing)) in before {
            if graph.forward_edges(&id) != edges {
                report.edges_changed.insert(id.clone());
            }
            if missing.as_ref() != graph.missing(&id) {
                report.missing_changed.insert(id);
            }
        }
        report.relinked = to_relink;
        report
    }

    fn link(&self, graph: &mut Graph, store: &ContractStore, id: &EntryId) {
        let Some(contract) = store.get(id) else {
            return;
        };

        let mut targets = BTreeSet::new();
        let mut missing = BTreeSet::new();
        let mut pending = Vec::new();
        for specifier in contract.imports() {
            match self.resolver.resolve(id, specifier, store) {
                Resolution::Local {
                    target,
                    shadowed_by,
                } => {
                    targets.insert(target);
                    pending.extend(shadowed_by);
                }
                Resolution::Missing {
                    specifier,
                    candidates,
                } => {
                    missing.insert(specifier);
                    pending.extend(candidates);
                }
            }
        }
        pending.sort();
        pending.dedup();

        graph.set_links(id, targets, missing, pending);
    }
}
