use crate::cache::IncrementalCache;
use crate::config::ContextConfig;
use crate::error::{IndexerError, Result};
use crate::project::Project;
use context_contract::{Contract, EntryId, ExtractError, ExtractionFailure};
use context_graph::Graph;
use context_snapshot::{unix_now_ms, Index, WriteStats};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Outcome of reading and extracting one path.
#[derive(Debug)]
pub(crate) enum Extracted {
    Contract { contract: Contract, path: PathBuf },
    Failed(ExtractionFailure),
    /// The file no longer exists.
    Gone(EntryId),
}

/// Read and extract one file. `None` for paths outside the project root or
/// rejected by the extractor.
pub(crate) fn extract_one(project: &Project, path: &Path) -> Option<Extracted> {
    let entry_id = project.entry_id(path)?;
    if !project.extractor().supports(path) {
        log::debug!("Extractor does not handle {entry_id}, skipping");
        return None;
    }

    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Some(Extracted::Gone(entry_id)),
        Err(err) => {
            let err = ExtractError::Io(err.to_string());
            return Some(Extracted::Failed(ExtractionFailure::new(entry_id, &err)));
        }
    };
    let Ok(text) = std::str::from_utf8(&bytes) else {
        return Some(Extracted::Failed(ExtractionFailure::new(
            entry_id,
            &ExtractError::InvalidUtf8,
        )));
    };

    match project.extractor().extract(&entry_id, text) {
        Ok(summary) => {
            let snippet = project.config().include_code.snippet(text);
            let contract = Contract::build(entry_id, &bytes, summary, snippet);
            Some(Extracted::Contract {
                contract,
                path: path.to_path_buf(),
            })
        }
        Err(err) => Some(Extracted::Failed(ExtractionFailure::new(entry_id, &err))),
    }
}

/// Extract many files in parallel. Files are independent, so the only shared
/// state is the read-only project.
pub(crate) fn extract_all(project: &Project, paths: &[PathBuf]) -> Vec<Extracted> {
    paths
        .par_iter()
        .filter_map(|path| extract_one(project, path))
        .collect()
}

/// Bundle roots: the configured ones when given, otherwise the graph's entry
/// points. Configured roots missing from the graph are kept so packing
/// reports them.
#[must_use]
pub fn select_roots(config: &ContextConfig, graph: &Graph) -> BTreeSet<EntryId> {
    if config.roots.is_empty() {
        graph.entry_points()
    } else {
        config.roots.iter().map(|r| EntryId::new(r)).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
    pub files_scanned: usize,
    pub contracts: usize,
    pub bundles: usize,
    pub failures: Vec<ExtractionFailure>,
    /// Roots that could not be packed, with the reason.
    pub pack_errors: Vec<String>,
    pub cycles: usize,
    pub files_written: usize,
    pub bytes_written: usize,
    pub duration_ms: u64,
}

/// One-shot build: scan, extract, link, pack and write every artifact.
///
/// Per-file and per-root failures are collected in the report; only failure
/// to write the output is an error.
pub async fn build_project(project: &Project) -> Result<BuildReport> {
    let started = Instant::now();
    log::info!("Building context for {}", project.root().display());

    let job = project.clone();
    let (cache, mut report) = tokio::task::spawn_blocking(move || IncrementalCache::build(&job))
        .await
        .map_err(|e| IndexerError::Other(format!("build task failed: {e}")))?;

    let stats = write_snapshot(project, &cache, None).await?;
    report.files_written = stats.files_written;
    report.bytes_written = stats.bytes_written;
    report.duration_ms = elapsed_ms(started);

    log::info!(
        "Build finished: {} bundles from {} contracts in {} ms ({} failures)",
        report.bundles,
        report.contracts,
        report.duration_ms,
        report.failures.len()
    );
    Ok(report)
}

/// Write the cache's bundles and a fresh index. With `folders`, only those
/// folders' context files are rewritten.
pub async fn write_snapshot(
    project: &Project,
    cache: &IncrementalCache,
    folders: Option<&BTreeSet<String>>,
) -> Result<WriteStats> {
    let index = Index::build(
        &project.root().to_string_lossy(),
        cache.bundles(),
        cache.graph(),
        project.config().format,
        unix_now_ms(),
    )?;
    let writer = project.writer();
    let stats = match folders {
        Some(folders) => writer.write_folders(cache.bundles(), folders, &index).await?,
        None => writer.write(cache.bundles(), &index).await?,
    };
    log::debug!(
        "Wrote {} context files ({} bytes) to {}",
        stats.files_written,
        stats.bytes_written,
        writer.out_dir().display()
    );
    Ok(stats)
}

pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
