pub mod build;
pub mod compare;
pub mod watch;

use anyhow::{Context, Result};
use clap::Args;
use context_extract::ScriptExtractor;
use context_indexer::{CodeMode, ContextConfig, Project};
use context_snapshot::OutputFormat;
use std::path::PathBuf;
use std::sync::Arc;

/// Project selection plus overrides for `.context-stamp/config.toml`.
#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Project root
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Dependency layers packed below each root
    #[arg(long)]
    pub depth: Option<usize>,

    /// Maximum modules per bundle
    #[arg(long)]
    pub max_nodes: Option<usize>,

    /// Output directory (default: project root)
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Context file format: json or ndjson
    #[arg(long, value_parser = parse_format)]
    pub format: Option<OutputFormat>,

    /// Embedded source: none, header or full
    #[arg(long, value_parser = parse_code_mode)]
    pub include_code: Option<CodeMode>,

    /// Bundle root (repeatable); default is detected entry points
    #[arg(long = "root")]
    pub roots: Vec<String>,
}

impl ProjectArgs {
    /// Config file values with command-line overrides applied.
    pub async fn config(&self) -> Result<ContextConfig> {
        let mut config = ContextConfig::load(&self.path)
            .await
            .with_context(|| format!("Failed to load config for {}", self.path.display()))?;
        if let Some(depth) = self.depth {
            config.depth = depth;
        }
        if let Some(max_nodes) = self.max_nodes {
            config.max_nodes = max_nodes;
        }
        if let Some(out) = &self.out {
            let cwd = std::env::current_dir().context("Failed to read current directory")?;
            config.out_dir = Some(cwd.join(out));
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        if let Some(mode) = self.include_code {
            config.include_code = mode;
        }
        if !self.roots.is_empty() {
            config.roots.clone_from(&self.roots);
        }
        Ok(config)
    }

    pub fn open(&self, config: ContextConfig) -> Result<Project> {
        Project::new(&self.path, config, Arc::new(ScriptExtractor::default()))
            .with_context(|| format!("Failed to open project {}", self.path.display()))
    }
}

fn parse_format(raw: &str) -> std::result::Result<OutputFormat, String> {
    OutputFormat::from_name(raw).ok_or_else(|| format!("unknown format '{raw}' (json, ndjson)"))
}

fn parse_code_mode(raw: &str) -> std::result::Result<CodeMode, String> {
    CodeMode::from_name(raw).ok_or_else(|| format!("unknown mode '{raw}' (none, header, full)"))
}

pub use build::BuildArgs;
pub use compare::CompareArgs;
pub use watch::WatchArgs;
