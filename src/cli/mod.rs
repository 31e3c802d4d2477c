//! # Command-Line Interface
//!
//! Argument parsing and result reporting for the `databuild` binary.
//!
//! ## Modes
//!
//! | Flag | Purpose |
//! |------|---------|
//! | `--build DATA_DIR` | Configure if needed, then run the build engine |
//! | `--configure DATA_DIR` | Configure only |
//! | `--export EXPORTER DATA_FILE DATA_DIR` | Export one file (called from build rules) |
//! | `--list-exporters` | Print exporters in precedence order |
//!
//! ## Output Formats
//!
//! All modes support the `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for debug output on stderr:
//! ```bash
//! databuild --verbose --build data/
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the selected mode.

mod app;
mod output;

pub use app::{run, Cli, Mode};
pub use output::{Output, OutputFormat};
