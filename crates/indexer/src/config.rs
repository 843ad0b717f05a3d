use crate::error::{IndexerError, Result};
use context_graph::{ImportResolver, PackOptions, PathAlias, DEFAULT_EXTENSIONS, DEFAULT_MAX_DEPTH, DEFAULT_MAX_NODES};
use context_snapshot::{OutputFormat, STATE_DIR};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const HEADER_LINES: usize = 30;
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// How much source text to embed in each contract. Never hashed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeMode {
    None,
    /// First [`HEADER_LINES`] lines.
    #[default]
    Header,
    Full,
}

impl CodeMode {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "none" => Some(Self::None),
            "header" => Some(Self::Header),
            "full" => Some(Self::Full),
            _ => None,
        }
    }

    #[must_use]
    pub fn snippet(self, contents: &str) -> Option<String> {
        match self {
            Self::None => None,
            Self::Header => Some(
                contents
                    .lines()
                    .take(HEADER_LINES)
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            Self::Full => Some(contents.to_string()),
        }
    }
}

/// Project settings read from `.context-stamp/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub depth: usize,
    pub max_nodes: usize,
    pub include_code: CodeMode,
    pub format: OutputFormat,
    /// Relative paths are taken from the project root.
    pub out_dir: Option<PathBuf>,
    pub debounce_ms: u64,
    pub max_batch_wait_ms: Option<u64>,
    /// Explicit bundle roots. Empty means entry points are detected.
    pub roots: Vec<String>,
    pub extensions: Vec<String>,
    /// Specifier prefix to project-relative directory, e.g. `"@/" = "src/"`.
    pub aliases: BTreeMap<String, String>,
    /// Extra gitignore-style patterns.
    pub ignore: Vec<String>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            depth: DEFAULT_MAX_DEPTH,
            max_nodes: DEFAULT_MAX_NODES,
            include_code: CodeMode::default(),
            format: OutputFormat::default(),
            out_dir: None,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            max_batch_wait_ms: None,
            roots: Vec::new(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| (*e).to_string()).collect(),
            aliases: BTreeMap::new(),
            ignore: Vec::new(),
        }
    }
}

impl ContextConfig {
    #[must_use]
    pub fn path_for(project_root: &Path) -> PathBuf {
        project_root.join(STATE_DIR).join(CONFIG_FILE_NAME)
    }

    /// Load the project's config file, or defaults when there is none.
    pub async fn load(project_root: &Path) -> Result<Self> {
        let path = Self::path_for(project_root);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(Self::default());
        }
        let raw = tokio::fs::read_to_string(&path).await?;
        let config = Self::from_toml_str(&raw)?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_nodes == 0 {
            return Err(IndexerError::Other("max_nodes must be at least 1".to_string()));
        }
        if self.extensions.is_empty() {
            return Err(IndexerError::Other("extensions must not be empty".to_string()));
        }
        Ok(())
    }

    #[must_use]
    pub fn out_dir(&self, project_root: &Path) -> PathBuf {
        match &self.out_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => project_root.join(dir),
            None => project_root.to_path_buf(),
        }
    }

    #[must_use]
    pub fn resolver(&self) -> ImportResolver {
        let aliases = self
            .aliases
            .iter()
            .map(|(prefix, target)| PathAlias {
                prefix: prefix.clone(),
                target: target.trim_end_matches('/').to_string(),
            })
            .collect();
        ImportResolver::new(self.extensions.clone(), aliases)
    }

    #[must_use]
    pub fn pack_options(&self, created_at: u64) -> PackOptions {
        PackOptions {
            max_depth: self.depth,
            max_nodes: self.max_nodes,
            created_at,
            ..PackOptions::default()
        }
    }

    #[must_use]
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    #[must_use]
    pub fn max_batch_wait(&self) -> Option<Duration> {
        self.max_batch_wait_ms.map(Duration::from_millis)
    }
}
