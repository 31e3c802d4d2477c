//! # Storage Layer
//!
//! Everything databuild persists in the output directory.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Build graph | ninja | `<out_dir>/build.ninja` |
//! | File index | JSONL (one path per line) | `<out_dir>/.databuild/index.jsonl` |
//! | Config | TOML | `<out_dir>/databuild.toml` |
//!
//! All writes go through a temp file and a rename, so readers never see a
//! partially written file.
//!
//! ## Key Types
//!
//! - [`FileIndex`] - Persisted data directory snapshot and change check
//! - [`BuildFile`] - All-or-nothing build graph writes
//! - [`Config`] - Project and global configuration

mod build_file;
mod config;
mod index;

pub use build_file::{BuildFile, DEFAULT_BUILD_FILE};
pub use config::{Config, ConfigError, ConfigFile, ModelConfig, ToolsConfig, PROJECT_CONFIG_FILE};
pub use index::{check, snapshot, FileIndex, Snapshot, INDEX_FILE, STATE_DIR};
