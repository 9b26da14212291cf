//! # llm-apply
//!
//! Apply a natural-language action to local files through an
//! OpenAI-compatible chat-completion API.
//!
//! ## Features
//!
//! - Layered settings: CLI flags > environment > YAML file > defaults
//! - Recursive glob selection filtered by `.gitignore` rules
//! - Streamed console output or atomic in-place rewrites
//! - Built-in action presets
//!
//! ## Quick Start
//!
//! ```no_run
//! use llm_apply::{ChatClient, ConfigResolver, Environment, FileSelector, Pipeline, SettingsLayer};
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let cwd = std::env::current_dir()?;
//! let settings = ConfigResolver::new(Environment::capture(), &cwd)
//!     .resolve(SettingsLayer::default(), Path::new("config.yaml"))?;
//!
//! let files = FileSelector::new(&cwd).select(&["src/**/*.py"])?;
//!
//! Pipeline::new(settings, ChatClient::new()).run(&files, &mut std::io::stdout())?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! 1. **ConfigResolver**: merges the settings layers
//! 2. **FileSelector**: expands patterns and drops ignored paths
//! 3. **Pipeline**: hands each file to an [`Executor`], one at a time

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod config;
mod error;
mod executor;
mod file;
mod filter;
mod pipeline;
mod selector;
mod writer;

pub mod preset;

pub use config::{
    env_vars, parse_flag, resolve, ConfigResolver, Environment, Settings, SettingsLayer,
    CONFIG_DIR_NAME, DEFAULT_ACTION, DEFAULT_API_BASE_URL, DEFAULT_CONFIG_FILE, DEFAULT_MODEL,
};
pub use error::{Error, Result};
pub use executor::{ChatClient, ChunkStream, Executor, OutputMode};
pub use file::{is_likely_binary, is_regular_file, read_text};
pub use filter::{IgnoreRules, IGNORE_FILE};
pub use pipeline::{Pipeline, RunStats};
pub use preset::PresetKind;
pub use selector::{is_glob, FileSelector};
pub use writer::write_atomic;
