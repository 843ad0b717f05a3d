//! SIGTERM stops the watch loop and clears its status marker
#![cfg(unix)]

use context_extract::ScriptExtractor;
use context_indexer::{ContextConfig, Project, WatchController, WatchOptions};
use context_snapshot::read_watch_status;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

#[tokio::test]
async fn test_sigterm_clears_status_marker() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    std::fs::write(
        dir.path().join("src/App.tsx"),
        "export default function App() {\n  return null;\n}\n",
    )
    .unwrap();
    let project =
        Project::new(dir.path(), ContextConfig::default(), Arc::new(ScriptExtractor::default()))
            .unwrap();
    let root = project.root().to_path_buf();
    let options = WatchOptions {
        debounce: Duration::from_millis(20),
        max_batch_wait: None,
        handle_signals: true,
    };
    let (_tx, rx) = mpsc::channel(16);
    let controller = WatchController::start_with_events(project, options, rx);
    let mut updates = controller.subscribe_updates();

    // by the first update the loop has installed its signal handlers
    tokio::time::timeout(Duration::from_secs(10), updates.recv())
        .await
        .expect("initial build in time")
        .unwrap();
    assert!(read_watch_status(&root).await.unwrap().is_some());

    let status = std::process::Command::new("kill")
        .args(["-TERM", &std::process::id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());

    tokio::time::timeout(Duration::from_secs(10), controller.wait())
        .await
        .expect("loop stops on SIGTERM")
        .unwrap();
    assert!(read_watch_status(&root).await.unwrap().is_none());
}
