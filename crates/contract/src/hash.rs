//! Content, semantic and bundle digests.
//!
//! All digests are BLAKE3, truncated to [`DIGEST_HEX_LEN`] hex characters and
//! prefixed with their kind (`file:`, `uif:`, `uifb:`). Semantic and bundle
//! digests hash the compact `serde_json` encoding of a borrowed view in which
//! map keys and set members are sorted and snippets and style metadata are
//! left out.

use crate::id::EntryId;
use crate::model::{Exports, FieldSpec, LogicSignature, TypeShape, VersionFingerprint};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub const DIGEST_HEX_LEN: usize = 24;
pub const FILE_PREFIX: &str = "file:";
pub const SEMANTIC_PREFIX: &str = "uif:";
pub const BUNDLE_PREFIX: &str = "uifb:";

/// Prefixed, truncated digest string.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    fn from_hasher(prefix: &str, hasher: &blake3::Hasher) -> Self {
        let hex = hasher.finalize().to_hex();
        Self(format!("{prefix}{}", &hex.as_str()[..DIGEST_HEX_LEN]))
    }

    fn of_json(prefix: &str, value: &impl Serialize) -> Self {
        // string-keyed views only, so encoding cannot fail
        let bytes = serde_json::to_vec(value).unwrap_or_default();
        let mut hasher = blake3::Hasher::new();
        hasher.update(&bytes);
        Self::from_hasher(prefix, &hasher)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The kind prefix, e.g. `uif`.
    #[must_use]
    pub fn kind(&self) -> &str {
        self.0.split(':').next().unwrap_or_default()
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Digest of raw file bytes. Any byte change changes it.
#[must_use]
pub fn file_hash(bytes: &[u8]) -> Digest {
    let mut hasher = blake3::Hasher::new();
    hasher.update(bytes);
    Digest::from_hasher(FILE_PREFIX, &hasher)
}

/// Digest of the canonicalized logic signature, exports and fingerprint.
#[must_use]
pub fn semantic_hash(
    logic: &LogicSignature,
    exports: &Exports,
    version: &VersionFingerprint,
) -> Digest {
    let view = SemanticView {
        exports,
        logic: LogicView {
            events: fields_view(&logic.events),
            props: fields_view(&logic.props),
            state: fields_view(&logic.state),
        },
        version,
    };
    Digest::of_json(SEMANTIC_PREFIX, &view)
}

/// Hash input for one bundle node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeDigest<'a> {
    Semantic(&'a Digest),
    /// Node present in the graph but without a contract to hash.
    Skipped,
}

/// Digest over a bundle's node hashes and edges.
///
/// Inputs are sorted by id before hashing, so assembly order never matters.
#[must_use]
pub fn bundle_hash(nodes: &[(&EntryId, NodeDigest<'_>)], edges: &[(&EntryId, &EntryId)]) -> Digest {
    let nodes: BTreeMap<&str, Option<&str>> = nodes
        .iter()
        .map(|(id, digest)| {
            let digest = match digest {
                NodeDigest::Semantic(d) => Some(d.as_str()),
                NodeDigest::Skipped => None,
            };
            (id.key(), digest)
        })
        .collect();
    let edges: BTreeSet<(&str, &str)> = edges.iter().map(|(from, to)| (from.key(), to.key())).collect();
    Digest::of_json(BUNDLE_PREFIX, &BundleView { nodes, edges })
}

// Hash inputs. Every map is keyed by string and every collection is ordered,
// so the JSON encoding of a view is canonical.

#[derive(Serialize)]
struct SemanticView<'a> {
    exports: &'a Exports,
    logic: LogicView<'a>,
    version: &'a VersionFingerprint,
}

#[derive(Serialize)]
struct LogicView<'a> {
    events: BTreeMap<&'a str, FieldView<'a>>,
    props: BTreeMap<&'a str, FieldView<'a>>,
    state: BTreeMap<&'a str, FieldView<'a>>,
}

#[derive(Serialize)]
struct FieldView<'a> {
    optional: bool,
    #[serde(rename = "type")]
    ty: ShapeView<'a>,
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
enum ShapeView<'a> {
    Simple {
        name: &'a str,
    },
    LiteralUnion {
        members: BTreeSet<&'a str>,
    },
    // parameter order is part of the signature
    Function {
        params: &'a [String],
        returns: Option<&'a str>,
    },
    Unknown,
}

impl<'a> From<&'a TypeShape> for ShapeView<'a> {
    fn from(shape: &'a TypeShape) -> Self {
        match shape {
            TypeShape::Simple { name } => Self::Simple { name: name.as_str() },
            TypeShape::LiteralUnion { members } => Self::LiteralUnion {
                members: members.iter().map(String::as_str).collect(),
            },
            TypeShape::Function { params, returns } => Self::Function {
                params: params.as_slice(),
                returns: returns.as_deref(),
            },
            TypeShape::Unknown => Self::Unknown,
        }
    }
}

fn fields_view(fields: &BTreeMap<String, FieldSpec>) -> BTreeMap<&str, FieldView<'_>> {
    fields
        .iter()
        .map(|(name, spec)| {
            let view = FieldView {
                optional: spec.optional,
                ty: ShapeView::from(&spec.ty),
            };
            (name.as_str(), view)
        })
        .collect()
}

#[derive(Serialize)]
struct BundleView<'a> {
    /// id key -> semantic digest, `null` for a skipped node
    nodes: BTreeMap<&'a str, Option<&'a str>>,
    edges: BTreeSet<(&'a str, &'a str)>,
}
