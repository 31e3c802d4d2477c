//! # Plugin System
//!
//! Exporters turn source assets into runtime assets. Each exporter claims
//! files by extension, describes the build edge for a file, and runs the
//! conversion when the build engine asks for it.
//!
//! ## Exporter Sources
//!
//! | Source | Registered by | Precedence |
//! |--------|---------------|------------|
//! | Plugin directory | `databuild-*` executables, file name order | first |
//! | Built-in | `Image`, `Shader`, `Model` | after plugins |
//!
//! ## Protocol
//!
//! ```text
//! databuild                    Plugin Binary
//!  │                               │
//!  ├── Spawn: databuild-texture --manifest
//!  │                               │
//!  ├── Stdout: {"name": "Texture", "extensions": ["png"]}
//!  │                               │
//!  ├── Stdin: {"operation": "describe", "params": {...}}
//!  │                               │
//!  └── Stdout: {"success": true, "data": {"outputs": [...]}}
//! ```
//!
//! ## Key Types
//!
//! - [`Exporter`] - Trait implemented by every exporter
//! - [`Registry`] - Ordered exporter registry and plugin discovery
//! - [`ExportTarget`] - An exporter bound to one source file
//! - [`ExternalExporter`] - Exporter backed by a plugin executable

mod builtin;
mod exporter;
mod external;
mod protocol;
mod registry;

pub use builtin::{builtin_exporters, ImageExporter, ModelExporter, ShaderExporter};
pub use exporter::{extension_of, ExportTarget, Exporter, SourceFile};
pub use external::ExternalExporter;
pub use protocol::{ExportParams, Operation, PluginManifest, PluginRequest, PluginResponse};
pub use registry::{Registry, RegistryError, PLUGIN_PREFIX};
