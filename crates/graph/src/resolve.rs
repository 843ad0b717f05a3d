use context_contract::{ContractStore, EntryId};
use serde::{Deserialize, Serialize};

pub const DEFAULT_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "vue"];

/// Outcome of resolving one import specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Local {
        target: EntryId,
        /// Lower-cased ids earlier in lookup order; any of them appearing
        /// would take over this import.
        shadowed_by: Vec<String>,
    },
    Missing {
        specifier: String,
        /// Lower-cased ids that would satisfy this import if they appeared.
        candidates: Vec<String>,
    },
}

/// Specifier prefix rewrite, e.g. `@/` to `src/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathAlias {
    pub prefix: String,
    pub target: String,
}

/// Resolves import specifiers to local contract ids.
#[derive(Debug, Clone)]
pub struct ImportResolver {
    extensions: Vec<String>,
    aliases: Vec<PathAlias>,
}

impl Default for ImportResolver {
    fn default() -> Self {
        Self::new(
            DEFAULT_EXTENSIONS.iter().map(|e| (*e).to_string()).collect(),
            Vec::new(),
        )
    }
}

impl ImportResolver {
    #[must_use]
    pub fn new(extensions: Vec<String>, mut aliases: Vec<PathAlias>) -> Self {
        // longest prefix wins
        aliases.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()).then(a.prefix.cmp(&b.prefix)));
        let extensions = extensions
            .into_iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self {
            extensions,
            aliases,
        }
    }

    #[must_use]
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn resolve(&self, from: &EntryId, specifier: &str, store: &ContractStore) -> Resolution {
        let mut candidates = self.candidates(from, specifier);
        for (i, candidate) in candidates.iter().enumerate() {
            if let Some(id) = store.resolve_key(candidate) {
                let target = id.clone();
                candidates.truncate(i);
                return Resolution::Local {
                    target,
                    shadowed_by: candidates,
                };
            }
        }
        Resolution::Missing {
            specifier: specifier.to_string(),
            candidates,
        }
    }

    /// Every id key that `specifier` could refer to, in lookup order. Empty
    /// for bare package imports.
    #[must_use]
    pub fn candidates(&self, from: &EntryId, specifier: &str) -> Vec<String> {
        let Some(base) = self.base_path(from, specifier) else {
            return Vec::new();
        };
        if base.is_empty() {
            return Vec::new();
        }

        let mut out = Vec::with_capacity(1 + self.extensions.len() * 2);
        out.push(base.clone());
        for ext in &self.extensions {
            out.push(format!("{base}.{ext}"));
        }
        for ext in &self.extensions {
            out.push(format!("{base}/index.{ext}"));
        }
        out
    }

    fn base_path(&self, from: &EntryId, specifier: &str) -> Option<String> {
        let spec = specifier
            .split(['?', '#'])
            .next()
            .unwrap_or(specifier)
            .trim();

        let joined = if spec == "." || spec == ".." || spec.starts_with("./") || spec.starts_with("../") {
            format!("{}/{spec}", from.dir())
        } else if let Some(rest) = spec.strip_prefix('/') {
            rest.to_string()
        } else {
            let alias = self.aliases.iter().find(|a| spec.starts_with(&a.prefix))?;
            format!("{}/{}", alias.target, &spec[alias.prefix.len()..])
        };

        Some(EntryId::new(&joined).key().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use context_contract::{Contract, ModuleSummary};
    use pretty_assertions::assert_eq;

    fn store(ids: &[&str]) -> ContractStore {
        ids.iter()
            .map(|id| Contract::build(EntryId::new(id), id.as_bytes(), ModuleSummary::default(), None))
            .collect()
    }

    #[test]
    fn resolves_relative_with_extension_lookup() {
        let store = store(&["src/App.tsx", "src/components/Button.tsx"]);
        let resolver = ImportResolver::default();
        let from = EntryId::new("src/App.tsx");
        assert_eq!(
            resolver.resolve(&from, "./components/Button", &store),
            Resolution::Local {
                target: EntryId::new("src/components/Button.tsx"),
                shadowed_by: vec![
                    "src/components/button".to_string(),
                    "src/components/button.ts".to_string(),
                ],
            }
        );
    }

    #[test]
    fn resolves_directory_index() {
        let store = store(&["src/pages/Home.tsx", "src/ui/index.ts"]);
        let resolver = ImportResolver::default();
        let from = EntryId::new("src/pages/Home.tsx");
        match resolver.resolve(&from, "../ui", &store) {
            Resolution::Local {
                target,
                shadowed_by,
            } => {
                assert_eq!(target, EntryId::new("src/ui/index.ts"));
                // bare path plus every extension candidate come first
                assert_eq!(shadowed_by.len(), 1 + DEFAULT_EXTENSIONS.len());
                assert!(shadowed_by.contains(&"src/ui.tsx".to_string()));
            }
            other => panic!("expected local, got {other:?}"),
        }
    }

    #[test]
    fn bare_import_is_missing_without_candidates() {
        let store = store(&["src/App.tsx"]);
        let resolver = ImportResolver::default();
        let from = EntryId::new("src/App.tsx");
        assert_eq!(
            resolver.resolve(&from, "react", &store),
            Resolution::Missing {
                specifier: "react".to_string(),
                candidates: Vec::new(),
            }
        );
    }

    #[test]
    fn alias_prefix_is_rewritten() {
        let store = store(&["src/hooks/useAuth.ts", "src/pages/Login.tsx"]);
        let resolver = ImportResolver::new(
            vec!["ts".to_string(), "tsx".to_string()],
            vec![PathAlias {
                prefix: "@/".to_string(),
                target: "src".to_string(),
            }],
        );
        let from = EntryId::new("src/pages/Login.tsx");
        assert_eq!(
            resolver.resolve(&from, "@/hooks/useAuth", &store),
            Resolution::Local {
                target: EntryId::new("src/hooks/useAuth.ts"),
                shadowed_by: vec!["src/hooks/useauth".to_string()],
            }
        );
    }

    #[test]
    fn absent_local_file_records_candidates() {
        let store = store(&["src/App.tsx"]);
        let resolver = ImportResolver::new(vec!["ts".to_string()], Vec::new());
        let from = EntryId::new("src/App.tsx");
        match resolver.resolve(&from, "./Gone", &store) {
            Resolution::Missing { candidates, .. } => {
                assert_eq!(
                    candidates,
                    vec!["src/gone".to_string(), "src/gone.ts".to_string(), "src/gone/index.ts".to_string()]
                );
            }
            other => panic!("expected missing, got {other:?}"),
        }
    }
}
