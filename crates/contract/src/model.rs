use crate::hash::{file_hash, semantic_hash, Digest};
use crate::id::EntryId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Normalized type of a property, event payload or state slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TypeShape {
    Simple {
        name: String,
    },
    LiteralUnion {
        members: Vec<String>,
    },
    Function {
        params: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        returns: Option<String>,
    },
    Unknown,
}

impl TypeShape {
    #[must_use]
    pub fn simple(name: impl Into<String>) -> Self {
        Self::Simple { name: name.into() }
    }

    /// Parse a raw type annotation into its closed shape.
    ///
    /// Whitespace is collapsed, string literal quotes are unified and union
    /// members are sorted, so cosmetic differences produce equal shapes.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let text = collapse_whitespace(raw);
        let text = text.trim().trim_end_matches(';').trim();
        if text.is_empty() || text == "unknown" {
            return Self::Unknown;
        }

        if let Some((params, returns)) = split_arrow(text) {
            let params = split_top_level(params, ',')
                .into_iter()
                .map(|p| collapse_whitespace(&p).trim().to_string())
                .filter(|p| !p.is_empty())
                .collect();
            let returns = returns.trim();
            return Self::Function {
                params,
                returns: (!returns.is_empty()).then(|| returns.to_string()),
            };
        }

        let members = split_top_level(text, '|');
        let mut members: Vec<String> = members
            .into_iter()
            .map(|m| unify_quotes(m.trim()))
            .filter(|m| !m.is_empty())
            .collect();
        if members.len() > 1 {
            members.sort();
            members.dedup();
            if members.iter().all(|m| is_literal(m)) {
                return Self::LiteralUnion { members };
            }
            return Self::Simple {
                name: members.join(" | "),
            };
        }

        match members.pop() {
            Some(single) => Self::Simple { name: single },
            None => Self::Unknown,
        }
    }

    /// Canonical text form used by field diffs.
    #[must_use]
    pub fn normalized(&self) -> String {
        match self {
            Self::Simple { name } => name.clone(),
            Self::LiteralUnion { members } => members.join(" | "),
            Self::Function { params, returns } => format!(
                "({}) => {}",
                params.join(", "),
                returns.as_deref().unwrap_or("void")
            ),
            Self::Unknown => "unknown".to_string(),
        }
    }
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn unify_quotes(member: &str) -> String {
    let bytes = member.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'\'' || first == b'`') && first == last {
            return format!("\"{}\"", &member[1..member.len() - 1]);
        }
    }
    member.to_string()
}

fn is_literal(member: &str) -> bool {
    member.starts_with('"')
        || member == "true"
        || member == "false"
        || member == "null"
        || member.parse::<f64>().is_ok()
}

/// Split `(a: T, b: U) => R` into the parameter list and return type.
fn split_arrow(text: &str) -> Option<(&str, &str)> {
    if !text.starts_with('(') {
        return None;
    }
    let mut depth = 0i32;
    for (idx, ch) in text.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    let rest = text[idx + 1..].trim_start();
                    let returns = rest.strip_prefix("=>")?;
                    return Some((&text[1..idx], returns));
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on `sep` ignoring separators nested in brackets or string literals.
pub(crate) fn split_top_level(text: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    for ch in text.chars() {
        if let Some(q) = quote {
            current.push(ch);
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' | '`' => {
                quote = Some(ch);
                current.push(ch);
            }
            '(' | '[' | '{' | '<' => {
                depth += 1;
                current.push(ch);
            }
            ')' | ']' | '}' => {
                depth -= 1;
                current.push(ch);
            }
            '>' => {
                // `=>` inside a nested function type is not a closing bracket
                if !current.ends_with('=') {
                    depth -= 1;
                }
                current.push(ch);
            }
            c if c == sep && depth <= 0 => {
                parts.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
    }
    parts.push(current);
    parts
}

/// A named property, event or state slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(rename = "type")]
    pub ty: TypeShape,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
}

impl FieldSpec {
    #[must_use]
    pub fn new(ty: TypeShape, optional: bool) -> Self {
        Self { ty, optional }
    }

    /// Parse from an annotation such as `string`, `"a" | "b"` or `() => void`.
    #[must_use]
    pub fn parse(raw: &str, optional: bool) -> Self {
        Self::new(TypeShape::parse(raw), optional)
    }

    #[must_use]
    pub fn normalized(&self) -> String {
        if self.optional {
            format!("{}?", self.ty.normalized())
        } else {
            self.ty.normalized()
        }
    }
}

/// Observable interface of a component module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicSignature {
    #[serde(default)]
    pub props: BTreeMap<String, FieldSpec>,
    #[serde(default)]
    pub events: BTreeMap<String, FieldSpec>,
    #[serde(default)]
    pub state: BTreeMap<String, FieldSpec>,
}

impl LogicSignature {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.props.is_empty() && self.events.is_empty() && self.state.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Exports {
    #[default]
    None,
    Default,
    Named {
        names: BTreeSet<String>,
    },
}

/// Sorted sets of everything a module references, used as its version
/// fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionFingerprint {
    #[serde(default)]
    pub imports: BTreeSet<String>,
    #[serde(default)]
    pub hooks: BTreeSet<String>,
    #[serde(default)]
    pub components: BTreeSet<String>,
    #[serde(default)]
    pub functions: BTreeSet<String>,
    #[serde(default)]
    pub variables: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleMeta {
    #[serde(default)]
    pub frameworks: BTreeSet<String>,
    #[serde(default)]
    pub class_names: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendMeta {
    pub framework: String,
    #[serde(default)]
    pub routes: Vec<String>,
}

/// Everything an extractor reports about one module. Hashes are derived
/// from it by [`Contract::build`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleSummary {
    pub exports: Exports,
    pub version: VersionFingerprint,
    pub logic: LogicSignature,
    pub style: Option<StyleMeta>,
    pub backend: Option<BackendMeta>,
}

/// Structured summary of one source module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub entry_id: EntryId,
    pub file_hash: Digest,
    pub semantic_hash: Digest,
    pub exports: Exports,
    pub version: VersionFingerprint,
    pub logic_signature: LogicSignature,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

impl Contract {
    #[must_use]
    pub fn build(
        entry_id: EntryId,
        contents: &[u8],
        summary: ModuleSummary,
        snippet: Option<String>,
    ) -> Self {
        let semantic = semantic_hash(&summary.logic, &summary.exports, &summary.version);
        Self {
            entry_id,
            file_hash: file_hash(contents),
            semantic_hash: semantic,
            exports: summary.exports,
            version: summary.version,
            logic_signature: summary.logic,
            style: summary.style,
            backend: summary.backend,
            snippet,
        }
    }

    /// Import specifiers as declared in the source.
    pub fn imports(&self) -> impl Iterator<Item = &str> {
        self.version.imports.iter().map(String::as_str)
    }
}
