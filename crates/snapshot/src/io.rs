use crate::error::{Result, SnapshotError};
use crate::format::{decode_bundles, encode_bundles, OutputFormat};
use crate::index::{context_file_for, group_by_folder, Index, INDEX_FILE_NAME, INDEX_SCHEMA_VERSION};
use context_graph::Bundle;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub files_written: usize,
    pub files_removed: usize,
    pub bytes_written: usize,
}

/// Writes per-folder context files and the index under one output directory.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    out_dir: PathBuf,
    format: OutputFormat,
}

impl SnapshotWriter {
    #[must_use]
    pub fn new(out_dir: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            out_dir: out_dir.into(),
            format,
        }
    }

    #[must_use]
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    #[must_use]
    pub const fn format(&self) -> OutputFormat {
        self.format
    }

    #[must_use]
    pub fn index_path(&self) -> PathBuf {
        self.out_dir.join(INDEX_FILE_NAME)
    }

    /// Write every folder's context file plus the index.
    pub async fn write(&self, bundles: &[Bundle], index: &Index) -> Result<WriteStats> {
        let folders: BTreeSet<String> = group_by_folder(bundles).into_keys().collect();
        self.write_folders(bundles, &folders, index).await
    }

    /// Rewrite only `folders` (removing context files of folders that no
    /// longer hold bundles), then the index.
    pub async fn write_folders(
        &self,
        bundles: &[Bundle],
        folders: &BTreeSet<String>,
        index: &Index,
    ) -> Result<WriteStats> {
        let groups = group_by_folder(bundles);
        let mut stats = WriteStats::default();

        for folder in folders {
            let path = self.out_dir.join(context_file_for(folder, self.format));
            match groups.get(folder) {
                Some(group) => {
                    let bytes = encode_bundles(group, self.format)?;
                    stats.bytes_written += bytes.len();
                    write_atomic(&path, &bytes).await?;
                    stats.files_written += 1;
                }
                None => {
                    if tokio::fs::try_exists(&path).await? {
                        tokio::fs::remove_file(&path).await?;
                        stats.files_removed += 1;
                    }
                }
            }
        }

        let index_bytes = serde_json::to_vec_pretty(index)?;
        stats.bytes_written += index_bytes.len();
        write_atomic(&self.index_path(), &index_bytes).await?;
        stats.files_written += 1;

        log::debug!(
            "Snapshot written to {}: {} files, {} removed, {} bytes",
            self.out_dir.display(),
            stats.files_written,
            stats.files_removed,
            stats.bytes_written
        );
        Ok(stats)
    }
}

pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// A loaded snapshot: its bundles and, when read through an index, the index.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub index: Option<Index>,
    pub bundles: Vec<Bundle>,
}

pub struct SnapshotReader;

impl SnapshotReader {
    /// Read from an output directory, an index file, or a single context file.
    pub async fn read(path: &Path) -> Result<Snapshot> {
        let meta = tokio::fs::metadata(path).await?;
        if meta.is_dir() {
            let index_path = path.join(INDEX_FILE_NAME);
            if !tokio::fs::try_exists(&index_path).await? {
                return Err(SnapshotError::InvalidLayout(format!(
                    "{} has no {INDEX_FILE_NAME}",
                    path.display()
                )));
            }
            return Self::read_index(&index_path).await;
        }

        if path.file_name().is_some_and(|n| n == INDEX_FILE_NAME) {
            return Self::read_index(path).await;
        }

        let bytes = tokio::fs::read(path).await?;
        Ok(Snapshot {
            index: None,
            bundles: decode_bundles(&bytes)?,
        })
    }

    async fn read_index(index_path: &Path) -> Result<Snapshot> {
        let bytes = tokio::fs::read(index_path).await?;
        let index: Index = serde_json::from_slice(&bytes)?;
        if index.schema_version != INDEX_SCHEMA_VERSION {
            return Err(SnapshotError::UnsupportedSchema {
                artifact: "index",
                found: index.schema_version,
                expected: INDEX_SCHEMA_VERSION,
            });
        }

        let base = index_path.parent().unwrap_or_else(|| Path::new("."));
        let mut bundles = Vec::with_capacity(index.summary.total_bundles);
        for folder in &index.folders {
            let file = base.join(&folder.context_file);
            let bytes = tokio::fs::read(&file).await.map_err(|err| {
                SnapshotError::InvalidLayout(format!(
                    "context file {} listed in index is unreadable: {err}",
                    file.display()
                ))
            })?;
            bundles.extend(decode_bundles(&bytes)?);
        }
        bundles.sort_by(|a, b| a.entry_id.cmp(&b.entry_id));

        Ok(Snapshot {
            index: Some(index),
            bundles,
        })
    }
}
