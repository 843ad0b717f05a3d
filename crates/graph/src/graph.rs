use context_contract::EntryId;
use petgraph::algo::tarjan_scc;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

/// Module dependency graph.
///
/// Nodes are entry ids held in one arena; edges point from importer to
/// imported module. Cycles are allowed. Removal keeps other node indices
/// stable, which incremental updates rely on.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub(crate) graph: StableDiGraph<EntryId, ()>,
    index: HashMap<EntryId, NodeIndex>,
    missing: BTreeMap<EntryId, BTreeSet<String>>,
    /// candidate id key -> importers whose resolution changes if that module appears
    pending: HashMap<String, BTreeSet<EntryId>>,
    waiting: HashMap<EntryId, Vec<String>>,
    roots: BTreeSet<EntryId>,
    leaves: BTreeSet<EntryId>,
}

impl Graph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node if absent and return its index.
    pub fn add_node(&mut self, id: EntryId) -> NodeIndex {
        if let Some(&idx) = self.index.get(&id) {
            return idx;
        }
        let idx = self.graph.add_node(id.clone());
        self.index.insert(id, idx);
        idx
    }

    /// Remove a node with all its edges. Returns the modules that imported it.
    pub fn remove_node(&mut self, id: &EntryId) -> BTreeSet<EntryId> {
        let importers = self.reverse_edges(id).into_iter().collect();
        self.clear_pending(id);
        self.missing.remove(id);
        if let Some(idx) = self.index.remove(id) {
            self.graph.remove_node(idx);
        }
        importers
    }

    /// Replace the outgoing edges and missing set of `id`.
    ///
    /// `pending` lists the id keys that would change how `id` resolves if they
    /// appeared: every candidate of a missing specifier, and the candidates
    /// ahead of the match for a resolved one.
    pub(crate) fn set_links(
        &mut self,
        id: &EntryId,
        targets: BTreeSet<EntryId>,
        missing: BTreeSet<String>,
        pending: Vec<String>,
    ) {
        let from = self.add_node(id.clone());
        let stale: Vec<_> = self
            .graph
            .edges_directed(from, Direction::Outgoing)
            .map(|e| e.id())
            .collect();
        for edge in stale {
            self.graph.remove_edge(edge);
        }
        for target in targets {
            if let Some(&to) = self.index.get(&target) {
                self.graph.update_edge(from, to, ());
            }
        }

        if missing.is_empty() {
            self.missing.remove(id);
        } else {
            self.missing.insert(id.clone(), missing);
        }

        self.clear_pending(id);
        for key in &pending {
            self.pending.entry(key.clone()).or_default().insert(id.clone());
        }
        if !pending.is_empty() {
            self.waiting.insert(id.clone(), pending);
        }
    }

    fn clear_pending(&mut self, id: &EntryId) {
        if let Some(keys) = self.waiting.remove(id) {
            for key in keys {
                if let Some(set) = self.pending.get_mut(&key) {
                    set.remove(id);
                    if set.is_empty() {
                        self.pending.remove(&key);
                    }
                }
            }
        }
    }

    /// Importers with a specifier that `id` would satisfy or take over.
    #[must_use]
    pub fn waiting_on(&self, id: &EntryId) -> BTreeSet<EntryId> {
        self.pending.get(id.key()).cloned().unwrap_or_default()
    }

    /// Recompute roots and leaves in one pass over all nodes.
    pub fn refresh_roots_and_leaves(&mut self) {
        self.roots.clear();
        self.leaves.clear();
        for idx in self.graph.node_indices() {
            let id = &self.graph[idx];
            if self
                .graph
                .neighbors_directed(idx, Direction::Incoming)
                .next()
                .is_none()
            {
                self.roots.insert(id.clone());
            }
            if self
                .graph
                .neighbors_directed(idx, Direction::Outgoing)
                .next()
                .is_none()
            {
                self.leaves.insert(id.clone());
            }
        }
    }

    #[must_use]
    pub fn contains(&self, id: &EntryId) -> bool {
        self.index.contains_key(id)
    }

    /// Resolved local dependencies of `id`, sorted.
    #[must_use]
    pub fn forward_edges(&self, id: &EntryId) -> Vec<EntryId> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Modules importing `id`, sorted.
    #[must_use]
    pub fn reverse_edges(&self, id: &EntryId) -> Vec<EntryId> {
        self.neighbors(id, Direction::Incoming)
    }

    fn neighbors(&self, id: &EntryId, direction: Direction) -> Vec<EntryId> {
        let Some(&idx) = self.index.get(id) else {
            return Vec::new();
        };
        let mut out: Vec<EntryId> = self
            .graph
            .neighbors_directed(idx, direction)
            .map(|n| self.graph[n].clone())
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Unresolved import specifiers of `id`.
    #[must_use]
    pub fn missing(&self, id: &EntryId) -> Option<&BTreeSet<String>> {
        self.missing.get(id)
    }

    #[must_use]
    pub fn roots(&self) -> &BTreeSet<EntryId> {
        &self.roots
    }

    #[must_use]
    pub fn leaves(&self) -> &BTreeSet<EntryId> {
        &self.leaves
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn ids(&self) -> impl Iterator<Item = &EntryId> {
        self.index.keys()
    }

    /// All edges as sorted `(from, to)` pairs.
    #[must_use]
    pub fn edges(&self) -> Vec<(EntryId, EntryId)> {
        let mut out: Vec<_> = self
            .graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_endpoints(e))
            .map(|(from, to)| (self.graph[from].clone(), self.graph[to].clone()))
            .collect();
        out.sort();
        out
    }

    /// Modules that get their own bundle when no roots are configured.
    ///
    /// Every root, plus the smallest id of each import cycle that nothing
    /// outside the cycle depends on.
    #[must_use]
    pub fn entry_points(&self) -> BTreeSet<EntryId> {
        let mut points = self.roots.clone();
        for component in tarjan_scc(&self.graph) {
            let members: HashSet<NodeIndex> = component.iter().copied().collect();
            let has_outside_importer = component.iter().any(|&n| {
                self.graph
                    .neighbors_directed(n, Direction::Incoming)
                    .any(|p| !members.contains(&p))
            });
            if has_outside_importer {
                continue;
            }
            if let Some(first) = component.iter().map(|&n| &self.graph[n]).min() {
                points.insert(first.clone());
            }
        }
        points
    }

    /// Import cycles (strongly connected components of more than one module,
    /// or a module importing itself), each sorted.
    #[must_use]
    pub fn cycles(&self) -> Vec<Vec<EntryId>> {
        let mut out: Vec<Vec<EntryId>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|c| c.len() > 1 || self.graph.contains_edge(c[0], c[0]))
            .map(|c| {
                let mut ids: Vec<EntryId> = c.into_iter().map(|n| self.graph[n].clone()).collect();
                ids.sort();
                ids
            })
            .collect();
        out.sort();
        out
    }

    /// Modules that reach any of `seeds` within `max_depth` forward hops,
    /// with their shortest distance. Seeds themselves are at distance 0.
    #[must_use]
    pub fn reverse_reach(
        &self,
        seeds: &BTreeSet<EntryId>,
        max_depth: usize,
    ) -> BTreeMap<EntryId, usize> {
        let mut dist: BTreeMap<EntryId, usize> = BTreeMap::new();
        let mut queue = VecDeque::new();
        for seed in seeds {
            if let Some(&idx) = self.index.get(seed) {
                dist.insert(seed.clone(), 0);
                queue.push_back((idx, 0usize));
            }
        }

        while let Some((idx, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for parent in self.graph.neighbors_directed(idx, Direction::Incoming) {
                let id = &self.graph[parent];
                if !dist.contains_key(id) {
                    dist.insert(id.clone(), depth + 1);
                    queue.push_back((parent, depth + 1));
                }
            }
        }
        dist
    }
}
