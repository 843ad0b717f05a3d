use crate::error::Result;
use crate::io::write_atomic;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::AsyncWriteExt;

pub const STATE_DIR: &str = ".context-stamp";
const WATCH_STATUS_FILE_NAME: &str = "watch_status.json";
const WATCH_LOG_FILE_NAME: &str = "watch_log.jsonl";

/// Marker that lets other processes detect an active watch session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchStatus {
    pub active: bool,
    pub project_root: String,
    pub pid: u32,
    pub started_at: u64,
    pub output_dir: String,
}

impl WatchStatus {
    #[must_use]
    pub fn current(project_root: &Path, output_dir: &Path) -> Self {
        Self {
            active: true,
            project_root: project_root.display().to_string(),
            pid: std::process::id(),
            started_at: unix_now_ms(),
            output_dir: output_dir.display().to_string(),
        }
    }
}

/// One rebuild record in the watch log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchLogEntry {
    pub timestamp: u64,
    pub success: bool,
    pub full_rebuild: bool,
    pub duration_ms: u64,
    #[serde(default)]
    pub changed_files: Vec<String>,
    #[serde(default)]
    pub repacked: Vec<String>,
    #[serde(default)]
    pub dropped: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drift: Option<DriftCounts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftCounts {
    pub added: usize,
    pub removed: usize,
    pub changed: usize,
    pub bundles_changed: usize,
}

#[must_use]
pub fn state_dir(project_root: &Path) -> PathBuf {
    project_root.join(STATE_DIR)
}

#[must_use]
pub fn watch_status_path(project_root: &Path) -> PathBuf {
    state_dir(project_root).join(WATCH_STATUS_FILE_NAME)
}

#[must_use]
pub fn watch_log_path(project_root: &Path) -> PathBuf {
    state_dir(project_root).join(WATCH_LOG_FILE_NAME)
}

pub async fn write_watch_status(project_root: &Path, status: &WatchStatus) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(status)?;
    write_atomic(&watch_status_path(project_root), &bytes).await
}

pub async fn read_watch_status(project_root: &Path) -> Result<Option<WatchStatus>> {
    let path = watch_status_path(project_root);
    if !tokio::fs::try_exists(&path).await? {
        return Ok(None);
    }
    let bytes = tokio::fs::read(&path).await?;
    Ok(Some(serde_json::from_slice(&bytes)?))
}

/// Remove the status marker. Absent markers are not an error.
pub async fn clear_watch_status(project_root: &Path) -> Result<()> {
    match tokio::fs::remove_file(watch_status_path(project_root)).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

pub async fn append_watch_log(project_root: &Path, entry: &WatchLogEntry) -> Result<()> {
    let path = watch_log_path(project_root);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut line = serde_json::to_vec(entry)?;
    line.push(b'\n');
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await?;
    file.write_all(&line).await?;
    file.flush().await?;
    Ok(())
}

/// Milliseconds since the unix epoch; 0 before it, `u64::MAX` past overflow.
#[must_use]
pub fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}
