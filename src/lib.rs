//! databuild - Asset pipeline build orchestrator
//!
//! databuild scans a data directory of source assets, asks the registered
//! exporters which files they claim and what each file produces, and writes
//! a ninja build graph. The build engine then calls back into databuild once
//! per stale file to run the conversion.

pub mod domain;
pub mod storage;
pub mod plugin;
pub mod context;
pub mod cli;

pub use context::{ConfigureOutcome, Context, Directories, GraphSummary};
pub use domain::{DependencyInfo, EdgeGraph};
pub use plugin::{Exporter, Registry, SourceFile};
