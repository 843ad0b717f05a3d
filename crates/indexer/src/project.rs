use crate::config::ContextConfig;
use crate::error::{IndexerError, Result};
use crate::scanner::FileScanner;
use context_contract::{EntryId, Extractor};
use context_graph::GraphBuilder;
use context_snapshot::SnapshotWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A project root together with its settings and the extractor to run on it.
#[derive(Clone)]
pub struct Project {
    root: PathBuf,
    config: ContextConfig,
    extractor: Arc<dyn Extractor>,
    scanner: FileScanner,
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("root", &self.root)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Project {
    pub fn new(
        root: impl AsRef<Path>,
        config: ContextConfig,
        extractor: Arc<dyn Extractor>,
    ) -> Result<Self> {
        config.validate()?;
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(IndexerError::InvalidPath(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        let root = root.canonicalize()?;
        let out_dir = config.out_dir(&root);
        let scanner = FileScanner::new(&root, &config.extensions, &config.ignore, Some(&out_dir))?;
        Ok(Self {
            root,
            config,
            extractor,
            scanner,
        })
    }

    /// Open `root` with its config file (or defaults).
    pub async fn load(root: impl AsRef<Path>, extractor: Arc<dyn Extractor>) -> Result<Self> {
        let config = ContextConfig::load(root.as_ref()).await?;
        Self::new(root, config, extractor)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub const fn config(&self) -> &ContextConfig {
        &self.config
    }

    #[must_use]
    pub fn extractor(&self) -> &dyn Extractor {
        self.extractor.as_ref()
    }

    #[must_use]
    pub const fn scanner(&self) -> &FileScanner {
        &self.scanner
    }

    #[must_use]
    pub fn out_dir(&self) -> PathBuf {
        self.config.out_dir(&self.root)
    }

    #[must_use]
    pub fn entry_id(&self, path: &Path) -> Option<EntryId> {
        EntryId::from_path(&self.root, path)
    }

    #[must_use]
    pub fn writer(&self) -> SnapshotWriter {
        SnapshotWriter::new(self.out_dir(), self.config.format)
    }

    #[must_use]
    pub fn graph_builder(&self) -> GraphBuilder {
        GraphBuilder::new(self.config.resolver())
    }
}
