//! # Context Drift
//!
//! Structural comparison of two snapshots.
//!
//! Contracts are matched by entry id across all bundles on each side; bundles
//! are matched by root id. The verdict is [`Verdict::Pass`] only when nothing
//! was added, removed or changed and every bundle hash is identical.

mod compare;
mod fields;

pub use compare::{compare, BundleChange, ContractChange, DriftReport, DriftSummary, Verdict};
pub use fields::{ExportsChange, FieldDiff, MapDiff, SetDiff, ValueChange};
