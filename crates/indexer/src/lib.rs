//! # Context Indexer
//!
//! Full builds, incremental rebuilds and the watch loop.
//!
//! ## Pipeline
//!
//! ```text
//! Project root
//!     │
//!     ├──> File Scanner (.gitignore aware)
//!     │      └─> Source files
//!     │
//!     ├──> Extractor (parallel, per file)
//!     │      └─> ContractStore
//!     │
//!     ├──> Graph Builder ──> Bundle Packer
//!     │                         └─> Bundles
//!     │
//!     └──> Snapshot Writer
//!            └─> context_main.json + <folder>/context.json
//! ```
//!
//! In watch mode an [`IncrementalCache`] keeps the store, graph and bundles
//! between batches and repacks only bundles whose depth reaches a change.
//!
//! ## Example
//!
//! ```no_run
//! use context_extract::ScriptExtractor;
//! use context_indexer::{build_project, Project};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let project = Project::load("/path/to/project", Arc::new(ScriptExtractor::default())).await?;
//!     let report = build_project(&project).await?;
//!
//!     println!("Packed {} bundles from {} contracts", report.bundles, report.contracts);
//!     Ok(())
//! }
//! ```

mod cache;
mod config;
mod error;
mod pipeline;
mod project;
mod scanner;
mod watcher;

pub use cache::{ChangeKind, ChangeReport, FileChange, IncrementalCache};
pub use config::{CodeMode, ContextConfig, CONFIG_FILE_NAME, DEFAULT_DEBOUNCE_MS, HEADER_LINES};
pub use error::{IndexerError, Result};
pub use pipeline::{build_project, select_roots, write_snapshot, BuildReport};
pub use project::Project;
pub use scanner::FileScanner;
pub use watcher::{WatchController, WatchOptions, WatchUpdate};
