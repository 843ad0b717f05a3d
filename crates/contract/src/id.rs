use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;

/// Normalized, project-relative module identifier.
///
/// Displays with its original casing but compares, orders and hashes by the
/// lower-cased form, so `src/Button.tsx` and `src/button.tsx` are one module.
#[derive(Clone)]
pub struct EntryId {
    display: String,
    key: String,
}

impl EntryId {
    /// Normalize a raw path string: backslashes become `/`, `.` segments are
    /// dropped and `..` pops the previous segment.
    #[must_use]
    pub fn new(raw: &str) -> Self {
        let display = normalize_path(raw);
        let key = display.to_lowercase();
        Self { display, key }
    }

    /// Build an id for `path` relative to `root`. Returns `None` when the path
    /// lies outside the root.
    #[must_use]
    pub fn from_path(root: &Path, path: &Path) -> Option<Self> {
        let relative = if path.is_absolute() {
            path.strip_prefix(root).ok()?
        } else {
            path
        };
        let raw = relative.to_string_lossy();
        let id = Self::new(&raw);
        (!id.is_empty()).then_some(id)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.display
    }

    /// Lower-cased comparison key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.display.is_empty()
    }

    /// Directory portion of the id (`""` for top-level modules).
    #[must_use]
    pub fn dir(&self) -> &str {
        match self.display.rfind('/') {
            Some(pos) => &self.display[..pos],
            None => "",
        }
    }

    #[must_use]
    pub fn file_name(&self) -> &str {
        match self.display.rfind('/') {
            Some(pos) => &self.display[pos + 1..],
            None => &self.display,
        }
    }

    /// Id without its file extension, used to match extensionless imports.
    #[must_use]
    pub fn stem_key(&self) -> &str {
        let name_start = self.key.rfind('/').map_or(0, |pos| pos + 1);
        match self.key[name_start..].rfind('.') {
            Some(dot) if dot > 0 => &self.key[..name_start + dot],
            _ => &self.key,
        }
    }
}

pub(crate) fn normalize_path(raw: &str) -> String {
    let unified = raw.trim().replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

impl PartialEq for EntryId {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for EntryId {}

impl Hash for EntryId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for EntryId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EntryId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Debug for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryId({})", self.display)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

impl From<&str> for EntryId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl Serialize for EntryId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.display)
    }
}

impl<'de> Deserialize<'de> for EntryId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::new(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalizes_separators_and_dots() {
        let id = EntryId::new(".\\src\\components\\..\\App.tsx");
        assert_eq!(id.as_str(), "src/App.tsx");
        assert_eq!(id.dir(), "src");
        assert_eq!(id.file_name(), "App.tsx");
    }

    #[test]
    fn compares_case_insensitively() {
        let a = EntryId::new("src/Button.tsx");
        let b = EntryId::new("SRC/button.TSX");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "src/Button.tsx");
    }

    #[test]
    fn stem_strips_extension_only_from_file_name() {
        assert_eq!(EntryId::new("src/ui.v2/Card.tsx").stem_key(), "src/ui.v2/card");
        assert_eq!(EntryId::new("src/Makefile").stem_key(), "src/makefile");
        assert_eq!(EntryId::new("src/.env").stem_key(), "src/.env");
    }

    #[test]
    fn from_path_rejects_outside_root() {
        let root = Path::new("/work/project");
        assert!(EntryId::from_path(root, Path::new("/elsewhere/a.ts")).is_none());
        let id = EntryId::from_path(root, Path::new("/work/project/src/a.ts"));
        assert_eq!(id.map(|id| id.as_str().to_string()), Some("src/a.ts".to_string()));
    }
}
