//! # Context Graph
//!
//! Module dependency graph and bounded bundle packing.
//!
//! ## Architecture
//!
//! ```text
//! ContractStore
//!     │
//!     ├──> Graph Builder
//!     │      ├─ Resolve declared imports (relative, alias, index)
//!     │      ├─ Forward/reverse edges (petgraph arena)
//!     │      └─ Missing specifiers per module
//!     │
//!     └──> Bundle Packer
//!            ├─ Breadth-first layers from a root
//!            ├─ Depth and node budgets, sorted truncation
//!            └─ Order-independent bundle hash
//! ```

mod builder;
mod bundle;
mod error;
mod graph;
mod packer;
mod resolve;

pub use builder::{GraphBuilder, GraphChanges, RelinkReport};
pub use bundle::{
    Bundle, BundleEdge, BundleGraph, BundleMeta, BundleNode, MissingDep, BUNDLE_SCHEMA_VERSION,
    BUNDLE_TYPE,
};
pub use error::{GraphError, Result};
pub use graph::Graph;
pub use packer::{BundlePacker, PackOptions, DEFAULT_MAX_DEPTH, DEFAULT_MAX_NODES};
pub use resolve::{ImportResolver, PathAlias, Resolution, DEFAULT_EXTENSIONS};
