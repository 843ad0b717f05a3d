use crate::error::{IndexerError, Result};
use crate::pipeline::{extract_all, select_roots, BuildReport, Extracted};
use crate::project::Project;
use context_contract::{ContractStore, EntryId, ExtractionFailure};
use context_graph::{Bundle, BundlePacker, Graph, GraphBuilder, GraphChanges};
use context_snapshot::unix_now_ms;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// A path reported by the file watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl FileChange {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// What one [`IncrementalCache::apply_changes`] call did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeReport {
    pub changed_files: Vec<String>,
    pub added: Vec<EntryId>,
    pub modified: Vec<EntryId>,
    pub removed: Vec<EntryId>,
    /// Files whose bytes matched the cached fileHash.
    pub unchanged: usize,
    pub failures: Vec<ExtractionFailure>,
    pub repacked: Vec<EntryId>,
    pub dropped: Vec<EntryId>,
    /// Output folders whose context file must be rewritten.
    pub touched_folders: BTreeSet<String>,
}

impl ChangeReport {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.repacked.is_empty() && self.dropped.is_empty()
    }

    /// Some module was added, re-extracted or removed. The graph totals in
    /// the index may have moved even when no bundle did.
    #[must_use]
    pub fn contracts_changed(&self) -> bool {
        !(self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty())
    }
}

/// Everything a watch session keeps between rebuilds.
///
/// Two layers: contracts keyed by id (reused while the file's bytes hash the
/// same) and bundles keyed by root (reused until something within the root's
/// depth changes). Owned by exactly one task at a time.
#[derive(Debug, Clone)]
pub struct IncrementalCache {
    store: ContractStore,
    graph: Graph,
    /// Sorted by root id.
    bundles: Vec<Bundle>,
    roots: BTreeSet<EntryId>,
    files: BTreeMap<EntryId, PathBuf>,
    failures: BTreeMap<EntryId, ExtractionFailure>,
    builder: GraphBuilder,
}

impl IncrementalCache {
    /// Full build from a fresh scan of the project.
    pub fn build(project: &Project) -> (Self, BuildReport) {
        let paths = project.scanner().scan();
        let mut cache = Self {
            store: ContractStore::new(),
            graph: Graph::new(),
            bundles: Vec::new(),
            roots: BTreeSet::new(),
            files: BTreeMap::new(),
            failures: BTreeMap::new(),
            builder: project.graph_builder(),
        };

        for item in extract_all(project, &paths) {
            match item {
                Extracted::Contract { contract, path } => {
                    cache.files.insert(contract.entry_id.clone(), path);
                    cache.store.insert(contract);
                }
                Extracted::Failed(failure) => {
                    log::warn!("Skipping {}: {}", failure.entry_id, failure.reason);
                    cache.failures.insert(failure.entry_id.clone(), failure);
                }
                // deleted between scan and read
                Extracted::Gone(_) => {}
            }
        }

        cache.graph = cache.builder.build(&cache.store);
        cache.roots = select_roots(project.config(), &cache.graph);

        let options = project.config().pack_options(unix_now_ms());
        let (bundles, errors) =
            BundlePacker::new(&cache.graph, &cache.store).pack_all(cache.roots.iter(), &options);
        cache.bundles = bundles;
        cache.bundles.sort_by(|a, b| a.entry_id.cmp(&b.entry_id));

        let report = BuildReport {
            files_scanned: paths.len(),
            contracts: cache.store.len(),
            bundles: cache.bundles.len(),
            failures: cache.failures.values().cloned().collect(),
            pack_errors: errors.iter().map(ToString::to_string).collect(),
            cycles: cache.graph.cycles().len(),
            ..BuildReport::default()
        };
        (cache, report)
    }

    /// Fold a batch of file changes into the cache.
    ///
    /// The file system is the source of truth: every path is re-read, a
    /// missing file is a removal whatever the reported kind, and a file whose
    /// bytes hash as before is skipped. A bundle is repacked only when
    /// something within its depth changed (contract, presence, resolved
    /// dependencies or missing set); every other bundle is left untouched.
    pub fn apply_changes(&mut self, project: &Project, changes: &[FileChange]) -> Result<ChangeReport> {
        let paths: Vec<PathBuf> = changes
            .iter()
            .map(|c| c.path.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter(|p| project.scanner().is_relevant(p))
            .collect();

        let mut report = ChangeReport {
            changed_files: paths
                .iter()
                .filter_map(|p| project.entry_id(p))
                .map(|id| id.as_str().to_string())
                .collect(),
            ..ChangeReport::default()
        };
        let mut delta = GraphChanges::default();

        for item in extract_all(project, &paths) {
            match item {
                Extracted::Contract { contract, path } => {
                    let id = contract.entry_id.clone();
                    self.failures.remove(&id);
                    self.files.insert(id.clone(), path);
                    match self.store.get(&id) {
                        Some(old) if old.file_hash == contract.file_hash => {
                            report.unchanged += 1;
                            continue;
                        }
                        Some(_) => delta.modified.insert(id),
                        None => delta.added.insert(id),
                    };
                    self.store.insert(contract);
                }
                Extracted::Failed(failure) => {
                    log::warn!("Skipping {}: {}", failure.entry_id, failure.reason);
                    let id = failure.entry_id.clone();
                    self.files.remove(&id);
                    if self.store.remove(&id).is_some() {
                        delta.removed.insert(id.clone());
                    }
                    report.failures.push(failure.clone());
                    self.failures.insert(id, failure);
                }
                Extracted::Gone(id) => {
                    self.files.remove(&id);
                    self.failures.remove(&id);
                    if self.store.remove(&id).is_some() {
                        delta.removed.insert(id);
                    }
                }
            }
        }

        report.added = delta.added.iter().cloned().collect();
        report.modified = delta.modified.iter().cloned().collect();
        report.removed = delta.removed.iter().cloned().collect();
        if delta.added.is_empty() && delta.modified.is_empty() && delta.removed.is_empty() {
            return Ok(report);
        }

        let depth = project.config().depth;
        let touched: BTreeSet<EntryId> = delta
            .added
            .iter()
            .chain(&delta.modified)
            .chain(&delta.removed)
            .cloned()
            .collect();

        // removed nodes are only reachable in the graph as it was
        let mut invalidated: BTreeSet<EntryId> =
            self.graph.reverse_reach(&touched, depth).into_keys().collect();
        let relink = self.builder.apply(&mut self.graph, &self.store, &delta);
        // importers that now resolve differently change every bundle reaching them
        let mut seeds = touched;
        seeds.extend(relink.missing_changed);
        seeds.extend(relink.edges_changed);
        invalidated.extend(self.graph.reverse_reach(&seeds, depth).into_keys());

        let roots = select_roots(project.config(), &self.graph);
        let to_pack: BTreeSet<EntryId> = roots
            .iter()
            .filter(|r| invalidated.contains(*r) || self.bundle_index(r).is_err())
            .cloned()
            .collect();

        let mut previous: BTreeMap<EntryId, Bundle> = BTreeMap::new();
        self.bundles.retain(|bundle| {
            let keep = roots.contains(&bundle.entry_id) && !to_pack.contains(&bundle.entry_id);
            if !keep {
                previous.insert(bundle.entry_id.clone(), bundle.clone());
            }
            keep
        });

        let options = project.config().pack_options(unix_now_ms());
        let (packed, errors) =
            BundlePacker::new(&self.graph, &self.store).pack_all(to_pack.iter(), &options);
        for err in &errors {
            log::warn!("Bundle not repacked: {err}");
        }

        for bundle in packed {
            previous.remove(&bundle.entry_id);
            report.touched_folders.insert(bundle.folder());
            report.repacked.push(bundle.entry_id.clone());
            self.insert_bundle(bundle);
        }
        for (id, bundle) in previous {
            report.touched_folders.insert(bundle.folder());
            report.dropped.push(id);
        }
        self.roots = roots;

        self.verify()?;
        log::debug!(
            "Applied {} changes: {} repacked, {} dropped",
            report.changed_files.len(),
            report.repacked.len(),
            report.dropped.len()
        );
        Ok(report)
    }

    #[must_use]
    pub const fn store(&self) -> &ContractStore {
        &self.store
    }

    #[must_use]
    pub const fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Current bundles, sorted by root id.
    #[must_use]
    pub fn bundles(&self) -> &[Bundle] {
        &self.bundles
    }

    #[must_use]
    pub fn bundle(&self, root: &EntryId) -> Option<&Bundle> {
        self.bundle_index(root).ok().map(|i| &self.bundles[i])
    }

    #[must_use]
    pub const fn roots(&self) -> &BTreeSet<EntryId> {
        &self.roots
    }

    /// Files currently failing extraction.
    pub fn failures(&self) -> impl Iterator<Item = &ExtractionFailure> {
        self.failures.values()
    }

    #[must_use]
    pub fn path_of(&self, id: &EntryId) -> Option<&PathBuf> {
        self.files.get(id)
    }

    fn bundle_index(&self, root: &EntryId) -> std::result::Result<usize, usize> {
        self.bundles.binary_search_by(|b| b.entry_id.cmp(root))
    }

    fn insert_bundle(&mut self, bundle: Bundle) {
        match self.bundle_index(&bundle.entry_id) {
            Ok(i) => self.bundles[i] = bundle,
            Err(i) => self.bundles.insert(i, bundle),
        }
    }

    /// Every bundle node must still be extracted, and the graph must hold
    /// exactly the extracted modules.
    fn verify(&self) -> Result<()> {
        if self.graph.node_count() != self.store.len() {
            return Err(IndexerError::CacheInconsistency(format!(
                "graph has {} nodes but {} contracts are stored",
                self.graph.node_count(),
                self.store.len()
            )));
        }
        for bundle in &self.bundles {
            if let Some(id) = bundle.node_ids().find(|id| !self.store.contains(id)) {
                return Err(IndexerError::CacheInconsistency(format!(
                    "bundle {} references {id}, which is no longer extracted",
                    bundle.entry_id
                )));
            }
        }
        Ok(())
    }
}
