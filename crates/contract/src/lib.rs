//! # Context Contract
//!
//! Structured, hashable summaries of frontend modules.
//!
//! ```text
//! source bytes ──> Extractor ──> ModuleSummary
//!                                    │
//!                                    └──> Contract::build
//!                                           ├─ fileHash      (raw bytes)
//!                                           └─ semanticHash  (canonical signature)
//! ```
//!
//! A [`ContractStore`] holds one [`Contract`] per [`EntryId`].

mod error;
mod extractor;
pub mod hash;
mod id;
mod model;
mod store;

pub use error::ExtractError;
pub use extractor::{ExtractionFailure, Extractor};
pub use hash::{bundle_hash, file_hash, semantic_hash, Digest, NodeDigest};
pub use id::EntryId;
pub use model::{
    BackendMeta, Contract, Exports, FieldSpec, LogicSignature, ModuleSummary, StyleMeta,
    TypeShape, VersionFingerprint,
};
pub use store::ContractStore;
