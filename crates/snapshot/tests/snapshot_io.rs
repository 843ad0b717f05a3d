//! Round-trips through the on-disk snapshot layout

use context_contract::{Contract, ContractStore, EntryId, ModuleSummary, VersionFingerprint};
use context_graph::{Bundle, BundlePacker, Graph, GraphBuilder, PackOptions};
use context_snapshot::{
    append_watch_log, clear_watch_status, decode_bundles, read_watch_status, watch_log_path,
    write_watch_status, Index, OutputFormat, SnapshotError, SnapshotReader, SnapshotWriter,
    WatchLogEntry, WatchStatus, INDEX_FILE_NAME,
};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use tempfile::TempDir;

fn contract(id: &str, imports: &[&str]) -> Contract {
    let summary = ModuleSummary {
        version: VersionFingerprint {
            imports: imports.iter().map(|s| (*s).to_string()).collect(),
            ..VersionFingerprint::default()
        },
        ..ModuleSummary::default()
    };
    Contract::build(EntryId::new(id), id.as_bytes(), summary, None)
}

fn project() -> (ContractStore, Graph, Vec<Bundle>) {
    let store: ContractStore = vec![
        contract("App.tsx", &["./components/Button"]),
        contract("components/Button.tsx", &["react"]),
        contract("pages/Home.tsx", &["../components/Button"]),
    ]
    .into_iter()
    .collect();
    let graph = GraphBuilder::default().build(&store);
    let roots = graph.entry_points();
    let options = PackOptions {
        created_at: 1_700_000_000_000,
        ..PackOptions::default()
    };
    let (bundles, errors) = BundlePacker::new(&graph, &store).pack_all(roots.iter(), &options);
    assert!(errors.is_empty());
    (store, graph, bundles)
}

#[tokio::test]
async fn test_write_then_read_directory() {
    let dir = TempDir::new().unwrap();
    let (_store, graph, bundles) = project();
    let index = Index::build("demo", &bundles, &graph, OutputFormat::Json, 1).unwrap();

    let writer = SnapshotWriter::new(dir.path(), OutputFormat::Json);
    let stats = writer.write(&bundles, &index).await.unwrap();
    assert_eq!(stats.files_written, index.folders.len() + 1);
    assert!(dir.path().join("context.json").exists());
    assert!(dir.path().join("pages/context.json").exists());

    let snapshot = SnapshotReader::read(dir.path()).await.unwrap();
    assert_eq!(snapshot.index.as_ref(), Some(&index));
    assert_eq!(snapshot.bundles, bundles);
}

#[tokio::test]
async fn test_index_summary_counts() {
    let (_store, graph, bundles) = project();
    let index = Index::build("demo", &bundles, &graph, OutputFormat::Json, 1).unwrap();

    assert_eq!(index.summary.total_bundles, 2);
    assert_eq!(index.summary.total_nodes, 3);
    assert_eq!(index.summary.total_edges, 2);
    assert_eq!(index.summary.total_missing, 1);
    let folders: Vec<_> = index.folders.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(folders, vec![".", "pages"]);
    assert!(index.folders[0].is_root);
    assert!(index.folders.iter().all(|f| f.size.tokens * 4 >= f.size.bytes));
}

#[tokio::test]
async fn test_ndjson_context_file_is_readable_directly() {
    let dir = TempDir::new().unwrap();
    let (_store, graph, bundles) = project();
    let index = Index::build("demo", &bundles, &graph, OutputFormat::Ndjson, 1).unwrap();

    SnapshotWriter::new(dir.path(), OutputFormat::Ndjson)
        .write(&bundles, &index)
        .await
        .unwrap();

    let file = dir.path().join("pages/context.ndjson");
    let raw = std::fs::read_to_string(&file).unwrap();
    assert_eq!(raw.lines().count(), 1);

    let snapshot = SnapshotReader::read(&file).await.unwrap();
    assert!(snapshot.index.is_none());
    assert_eq!(snapshot.bundles.len(), 1);
    assert_eq!(snapshot.bundles[0].entry_id, EntryId::new("pages/Home.tsx"));
}

#[tokio::test]
async fn test_unknown_schema_is_rejected() {
    let (_store, _graph, mut bundles) = project();
    bundles[0].schema_version = "9.9".to_string();
    let bytes = serde_json::to_vec(&bundles).unwrap();

    let err = decode_bundles(&bytes).unwrap_err();
    assert!(matches!(
        err,
        SnapshotError::UnsupportedSchema { artifact: "bundle", .. }
    ));
}

#[tokio::test]
async fn test_write_folders_removes_emptied_folder() {
    let dir = TempDir::new().unwrap();
    let (_store, graph, bundles) = project();
    let index = Index::build("demo", &bundles, &graph, OutputFormat::Json, 1).unwrap();
    let writer = SnapshotWriter::new(dir.path(), OutputFormat::Json);
    writer.write(&bundles, &index).await.unwrap();

    let remaining: Vec<Bundle> = bundles
        .into_iter()
        .filter(|b| b.folder() != "pages")
        .collect();
    let index = Index::build("demo", &remaining, &graph, OutputFormat::Json, 2).unwrap();
    let touched = BTreeSet::from(["pages".to_string()]);
    let stats = writer
        .write_folders(&remaining, &touched, &index)
        .await
        .unwrap();

    assert_eq!(stats.files_removed, 1);
    assert!(!dir.path().join("pages/context.json").exists());
    assert!(dir.path().join("context.json").exists());
    assert!(dir.path().join(INDEX_FILE_NAME).exists());
}

#[tokio::test]
async fn test_watch_status_lifecycle() {
    let dir = TempDir::new().unwrap();
    assert_eq!(read_watch_status(dir.path()).await.unwrap(), None);

    let status = WatchStatus::current(dir.path(), &dir.path().join("out"));
    write_watch_status(dir.path(), &status).await.unwrap();
    assert_eq!(read_watch_status(dir.path()).await.unwrap(), Some(status));

    clear_watch_status(dir.path()).await.unwrap();
    assert_eq!(read_watch_status(dir.path()).await.unwrap(), None);
    clear_watch_status(dir.path()).await.unwrap();
}

#[tokio::test]
async fn test_watch_log_appends_lines() {
    let dir = TempDir::new().unwrap();
    for success in [true, false] {
        let entry = WatchLogEntry {
            timestamp: 1,
            success,
            ..WatchLogEntry::default()
        };
        append_watch_log(dir.path(), &entry).await.unwrap();
    }

    let raw = std::fs::read_to_string(watch_log_path(dir.path())).unwrap();
    let entries: Vec<WatchLogEntry> = raw
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(entries.len(), 2);
    assert!(entries[0].success);
    assert!(!entries[1].success);
}

#[test]
fn test_unix_now_ms_is_current_millis() {
    // 2020-01-01T00:00:00Z
    let floor = 1_577_836_800_000;
    let now = context_snapshot::unix_now_ms();
    assert!(now > floor);
    // milliseconds, not seconds or micros
    assert!(now < floor * 10);
}
