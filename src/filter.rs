//! Ignore-file filtering.
//!
//! Rules use the usual `.gitignore` syntax: glob patterns, `#` comments,
//! `!` negation and trailing `/` for directory-only rules. They are
//! compiled once into an [`IgnoreRules`] value and queried through
//! [`IgnoreRules::is_ignored`].

use crate::error::{Error, Result};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Name of the ignore file looked up at the selection root.
pub const IGNORE_FILE: &str = ".gitignore";

/// Compiled ignore rules anchored at a root directory.
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    root: PathBuf,
    matcher: Gitignore,
}

impl IgnoreRules {
    /// Loads `.gitignore` from `root`.
    ///
    /// Returns `None` when there is no ignore file. Lines that fail to
    /// parse are skipped with a warning.
    #[must_use]
    pub fn from_root(root: &Path) -> Option<Self> {
        let path = root.join(IGNORE_FILE);
        if !path.is_file() {
            debug!("No {} at {}", IGNORE_FILE, root.display());
            return None;
        }

        let mut builder = GitignoreBuilder::new(root);
        if let Some(err) = builder.add(&path) {
            warn!(path = %path.display(), error = %err, "Some ignore rules could not be parsed");
        }

        match builder.build() {
            Ok(matcher) => {
                debug!("Loaded {} ignore rules from {}", matcher.num_ignores(), path.display());
                Some(Self {
                    root: root.to_path_buf(),
                    matcher,
                })
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to compile ignore rules");
                None
            }
        }
    }

    /// Compiles rules from ignore-file lines.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] for a line that is not a valid rule.
    pub fn from_lines<I, S>(root: &Path, lines: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = GitignoreBuilder::new(root);
        for line in lines {
            let line = line.as_ref();
            builder
                .add_line(None, line)
                .map_err(|e| Error::invalid_pattern(line, e.to_string()))?;
        }

        let matcher = builder
            .build()
            .map_err(|e| Error::invalid_pattern(IGNORE_FILE, e.to_string()))?;

        Ok(Self {
            root: root.to_path_buf(),
            matcher,
        })
    }

    /// Root directory the rules are anchored at.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns true if `path`, or any directory above it, is ignored.
    ///
    /// Relative paths are taken relative to the root. Paths outside the
    /// root are never ignored.
    #[must_use]
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        let Some(relative) = self.relative(path) else {
            return false;
        };
        if relative.as_os_str().is_empty() {
            return false;
        }

        self.matcher
            .matched_path_or_any_parents(&relative, is_dir)
            .is_ignore()
    }

    fn relative(&self, path: &Path) -> Option<PathBuf> {
        let relative = if path.is_absolute() {
            pathdiff::diff_paths(path, &self.root)?
        } else {
            path.to_path_buf()
        };

        let mut normalized = PathBuf::new();
        for component in relative.components() {
            match component {
                Component::CurDir => {}
                Component::Normal(part) => normalized.push(part),
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        Some(normalized)
    }
}
