//! Expands command-line patterns into the list of files to process.

use crate::error::{Error, Result};
use crate::filter::IgnoreRules;
use globset::{GlobBuilder, GlobMatcher};
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// Returns true if `pattern` contains glob metacharacters.
#[must_use]
pub fn is_glob(pattern: &str) -> bool {
    pattern.contains(GLOB_META)
}

/// Selects files by glob pattern, dropping anything the ignore rules match.
#[derive(Debug, Clone)]
pub struct FileSelector {
    root: PathBuf,
    rules: Option<IgnoreRules>,
}

impl FileSelector {
    /// Creates a selector rooted at `root`, loading `root/.gitignore` if present.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let rules = IgnoreRules::from_root(&root);
        Self { root, rules }
    }

    /// Creates a selector with explicit ignore rules.
    #[must_use]
    pub fn with_rules(root: impl Into<PathBuf>, rules: Option<IgnoreRules>) -> Self {
        Self {
            root: root.into(),
            rules,
        }
    }

    /// Expands `patterns` in order.
    ///
    /// Results keep pattern order, then match order within a pattern; they
    /// are neither sorted globally nor deduplicated. A pattern without glob
    /// metacharacters is returned as-is so the caller can report it if it
    /// does not exist. Directories are not filtered out here.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if a pattern is not a valid glob.
    pub fn select<S: AsRef<str>>(&self, patterns: &[S]) -> Result<Vec<PathBuf>> {
        let mut selected = Vec::new();

        for pattern in patterns {
            let pattern = pattern.as_ref();
            let matches = self.expand(pattern)?;
            debug!("Pattern '{}' matched {} path(s)", pattern, matches.len());

            for (path, is_dir) in matches {
                if self.is_ignored(&path, is_dir) {
                    trace!("Ignored by rules: {}", path.display());
                    continue;
                }
                selected.push(path);
            }
        }

        Ok(selected)
    }

    fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        self.rules
            .as_ref()
            .is_some_and(|rules| rules.is_ignored(path, is_dir))
    }

    fn on_disk(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Expands one pattern into `(path, is_dir)` pairs.
    fn expand(&self, pattern: &str) -> Result<Vec<(PathBuf, bool)>> {
        if !is_glob(pattern) {
            let path = PathBuf::from(pattern);
            let is_dir = self.on_disk(&path).is_dir();
            return Ok(vec![(path, is_dir)]);
        }

        let matcher = compile(pattern)?;
        let split = SplitPattern::new(pattern);
        let walk_root = self.on_disk(&split.base);

        if !walk_root.is_dir() {
            trace!("Pattern base {} is not a directory", walk_root.display());
            return Ok(Vec::new());
        }

        let mut walker = WalkDir::new(&walk_root)
            .min_depth(1)
            .follow_links(true)
            .sort_by_file_name();
        if let Some(depth) = split.max_depth {
            walker = walker.max_depth(depth);
        }

        let include_hidden = split.names_hidden;
        let entries = walker
            .into_iter()
            .filter_entry(|e| include_hidden || !is_hidden(e.file_name()));

        let mut matches = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry while expanding '{}': {}", pattern, e);
                    continue;
                }
            };

            let Ok(suffix) = entry.path().strip_prefix(&walk_root) else {
                continue;
            };
            let candidate = split.base.join(suffix);

            if matcher.is_match(&candidate) {
                matches.push((candidate, entry.file_type().is_dir()));
            }
        }

        Ok(matches)
    }
}

fn compile(pattern: &str) -> Result<GlobMatcher> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| Error::invalid_pattern(pattern, e.kind().to_string()))
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|s| s.starts_with('.'))
}

/// A glob split into its literal directory prefix and the rest.
#[derive(Debug, PartialEq, Eq)]
struct SplitPattern {
    /// Leading components without metacharacters.
    base: PathBuf,
    /// Walk depth below `base`, or `None` when the rest contains `**`.
    max_depth: Option<usize>,
    /// Whether the pattern spells out a dot-prefixed component.
    names_hidden: bool,
}

impl SplitPattern {
    fn new(pattern: &str) -> Self {
        let components: Vec<&str> = pattern.split('/').collect();
        let literal = components
            .iter()
            .take_while(|c| !is_glob(c))
            .count()
            // the last component is what gets matched, never part of the base
            .min(components.len().saturating_sub(1));

        let mut base = components[..literal].join("/");
        if base.is_empty() && pattern.starts_with('/') {
            base.push('/');
        }

        let rest = &components[literal..];
        let max_depth = if rest.iter().any(|c| c.contains("**")) {
            None
        } else {
            Some(rest.iter().filter(|c| !c.is_empty()).count())
        };

        let names_hidden = rest
            .iter()
            .any(|c| c.starts_with('.') && *c != "." && *c != "..");

        Self {
            base: PathBuf::from(base),
            max_depth,
            names_hidden,
        }
    }
}
