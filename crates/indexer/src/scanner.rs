use crate::error::{IndexerError, Result};
use context_snapshot::STATE_DIR;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

const ALWAYS_IGNORED: &[&str] = &[
    ".git/",
    ".hg/",
    ".svn/",
    "node_modules/",
    "dist/",
    "build/",
    "coverage/",
];

/// Finds source files under a project root.
///
/// Honors `.gitignore` (through `ignore::WalkBuilder`), a built-in list of
/// dependency/output directories, and extra patterns from config.
#[derive(Debug, Clone)]
pub struct FileScanner {
    root: PathBuf,
    extensions: Vec<String>,
    excluded_dirs: Vec<PathBuf>,
    matcher: Gitignore,
}

impl FileScanner {
    pub fn new(
        root: &Path,
        extensions: &[String],
        patterns: &[String],
        out_dir: Option<&Path>,
    ) -> Result<Self> {
        let mut builder = GitignoreBuilder::new(root);
        for pattern in ALWAYS_IGNORED
            .iter()
            .copied()
            .chain([STATE_DIR])
            .chain(patterns.iter().map(String::as_str))
        {
            builder
                .add_line(None, pattern)
                .map_err(|e| IndexerError::Other(format!("invalid ignore pattern {pattern:?}: {e}")))?;
        }
        let matcher = builder
            .build()
            .map_err(|e| IndexerError::Other(format!("ignore rules: {e}")))?;

        // the output directory holds generated artifacts; never scan it unless
        // it is the project root itself
        let excluded_dirs = out_dir
            .filter(|dir| *dir != root)
            .map(Path::to_path_buf)
            .into_iter()
            .collect();

        Ok(Self {
            root: root.to_path_buf(),
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            excluded_dirs,
            matcher,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All matching files, sorted.
    #[must_use]
    pub fn scan(&self) -> Vec<PathBuf> {
        let matcher = self.matcher.clone();
        let excluded = self.excluded_dirs.clone();
        let walker = WalkBuilder::new(&self.root)
            .standard_filters(true)
            .hidden(true)
            .require_git(false)
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                if is_dir && excluded.iter().any(|d| entry.path() == d) {
                    return false;
                }
                !matcher
                    .matched_path_or_any_parents(entry.path(), is_dir)
                    .is_ignore()
            })
            .build();

        let mut files: Vec<PathBuf> = walker
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    log::warn!("Skipping unreadable entry: {err}");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
            .map(ignore::DirEntry::into_path)
            .filter(|path| self.has_extension(path))
            .collect();
        files.sort();
        log::debug!("Scanned {} files under {}", files.len(), self.root.display());
        files
    }

    /// Whether a change at `path` can affect the build. Used to filter
    /// watcher events; the path may no longer exist.
    #[must_use]
    pub fn is_relevant(&self, path: &Path) -> bool {
        if !self.has_extension(path) || !path.starts_with(&self.root) {
            return false;
        }
        if self.excluded_dirs.iter().any(|d| path.starts_with(d)) {
            return false;
        }
        !self.matcher.matched_path_or_any_parents(path, false).is_ignore()
    }

    fn has_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "export default 1\n").unwrap();
    }

    fn extensions() -> Vec<String> {
        vec!["tsx".to_string(), "ts".to_string()]
    }

    #[test]
    fn scans_sources_and_skips_ignored() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, "src/App.tsx");
        touch(root, "src/util.ts");
        touch(root, "src/readme.md");
        touch(root, "node_modules/react/index.ts");
        touch(root, "src/generated/api.ts");
        touch(root, "out/context.tsx");

        let scanner = FileScanner::new(
            root,
            &extensions(),
            &["src/generated/".to_string()],
            Some(&root.join("out")),
        )
        .unwrap();
        let files: Vec<_> = scanner
            .scan()
            .into_iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();

        assert_eq!(files, vec!["src/App.tsx", "src/util.ts"]);
    }

    #[test]
    fn relevance_matches_scan_rules() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let scanner = FileScanner::new(root, &extensions(), &[], None).unwrap();

        assert!(scanner.is_relevant(&root.join("src/Gone.tsx")));
        assert!(!scanner.is_relevant(&root.join("src/notes.md")));
        assert!(!scanner.is_relevant(&root.join("node_modules/x/index.ts")));
        assert!(!scanner.is_relevant(&root.join(".context-stamp/config.ts")));
    }
}
