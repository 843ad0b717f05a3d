//! # Context Extract
//!
//! Reference [`Extractor`](context_contract::Extractor) for React and Vue
//! component sources. It reads declarations with regular expressions after
//! stripping comments, so formatting and comments never reach the summary.

mod script;
mod source;

pub use script::ScriptExtractor;
pub use source::strip_comments;
