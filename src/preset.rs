//! Built-in actions.
//!
//! A preset is a named, pre-written action so common tasks don't need the
//! full instruction on the command line every time.

use serde::{Deserialize, Serialize};

/// Built-in action presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PresetKind {
    /// Short summary of the file
    Summarize,
    /// Behavior-preserving cleanup
    Refactor,
    /// Add or improve documentation comments
    Document,
    /// Plain-language explanation
    Explain,
    /// Fix likely bugs
    FixBugs,
    /// Append unit tests
    AddTests,
    /// Translate comments to English
    TranslateComments,
}

impl PresetKind {
    /// Returns the ID string for this preset.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Summarize => "summarize",
            Self::Refactor => "refactor",
            Self::Document => "document",
            Self::Explain => "explain",
            Self::FixBugs => "fix-bugs",
            Self::AddTests => "add-tests",
            Self::TranslateComments => "translate-comments",
        }
    }

    /// Returns all available preset kinds.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Summarize,
            Self::Refactor,
            Self::Document,
            Self::Explain,
            Self::FixBugs,
            Self::AddTests,
            Self::TranslateComments,
        ]
    }

    /// Parse preset kind from string ID.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::all().iter().copied().find(|kind| kind.id() == id)
    }

    /// One-line description for `--list-presets`.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Summarize => "Summarize the file in a few sentences",
            Self::Refactor => "Refactor for readability without changing behavior",
            Self::Document => "Add documentation comments to public items",
            Self::Explain => "Explain what the code does",
            Self::FixBugs => "Fix obvious bugs and keep everything else intact",
            Self::AddTests => "Add unit tests covering the main behavior",
            Self::TranslateComments => "Translate comments and docstrings to English",
        }
    }

    /// The action text sent as the system prompt.
    #[must_use]
    pub const fn action(self) -> &'static str {
        match self {
            Self::Summarize => "Summarize this text",
            Self::Refactor => {
                "You are an experienced software engineer. Refactor the following code \
                 for readability and maintainability. Preserve its behavior and public \
                 interface exactly. Keep the original language and formatting conventions."
            }
            Self::Document => {
                "You are a technical writer. Add concise documentation comments to every \
                 public function, type and module in the following code, using the \
                 idiomatic doc-comment syntax of its language. Do not change the code itself."
            }
            Self::Explain => {
                "Explain what the following code does, step by step, for a developer who \
                 is new to the codebase. Point out any non-obvious behavior."
            }
            Self::FixBugs => {
                "You are a careful code reviewer. Find and fix bugs in the following code: \
                 off-by-one errors, unhandled errors, resource leaks, incorrect conditions. \
                 Change only what is needed to fix them."
            }
            Self::AddTests => {
                "Add unit tests for the following code using the standard testing \
                 framework of its language. Cover normal cases and edge cases. Keep the \
                 existing code unchanged and append the tests."
            }
            Self::TranslateComments => {
                "Translate every comment and docstring in the following code to English. \
                 Do not change identifiers, string literals or code."
            }
        }
    }
}
