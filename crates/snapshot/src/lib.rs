//! # Context Snapshot
//!
//! Artifacts produced by a run, and the markers a watch session leaves behind.
//!
//! ```text
//! <out>/context_main.json          Index (folders, totals, roots/leaves)
//! <out>/<folder>/context.json      Bundles rooted in <folder>
//! <project>/.context-stamp/
//!     watch_status.json            present while a watch session runs
//!     watch_log.jsonl              one record per rebuild
//! ```

mod error;
mod format;
mod index;
mod io;
mod status;

pub use error::{Result, SnapshotError};
pub use format::{decode_bundles, encode_bundles, OutputFormat};
pub use index::{
    context_file_for, group_by_folder, FolderEntry, Index, IndexSummary, SizeEstimate,
    INDEX_FILE_NAME, INDEX_SCHEMA_VERSION, INDEX_TYPE,
};
pub use io::{Snapshot, SnapshotReader, SnapshotWriter, WriteStats};
pub use status::{
    append_watch_log, clear_watch_status, read_watch_status, state_dir, unix_now_ms,
    watch_log_path, watch_status_path, write_watch_status, DriftCounts, WatchLogEntry,
    WatchStatus, STATE_DIR,
};
