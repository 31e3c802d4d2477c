//! Exporter registry
//!
//! Exporters are registered explicitly, in order. Registration order is
//! precedence: when several exporters claim a file, the first one wins.
//!
//! Plugin directories are scanned non-recursively for executables named
//! `databuild-*`, in file name order. Each executable is loaded once per
//! registry; a plugin that fails to load aborts discovery.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use super::exporter::{Exporter, ExportTarget, SourceFile};
use super::external::ExternalExporter;
use crate::domain::ninja;

/// File name prefix of plugin executables
pub const PLUGIN_PREFIX: &str = "databuild-";

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("Exporter already registered: {0}")]
    Duplicate(String),

    #[error("Invalid exporter name '{0}' (allowed: letters, digits, '_', '-', '.')")]
    InvalidName(String),

    #[error("Plugin directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Unknown exporter: {0}")]
    UnknownExporter(String),
}

/// Ordered set of registered exporters
#[derive(Default)]
pub struct Registry {
    /// Registered exporters in precedence order
    exporters: Vec<Box<dyn Exporter>>,

    /// Plugin executables already loaded
    loaded: HashSet<PathBuf>,
}

impl Registry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an exporter; it ranks below everything registered before
    pub fn register(&mut self, exporter: Box<dyn Exporter>) -> Result<(), RegistryError> {
        let name = exporter.name();

        if !ninja::is_valid_name(name) {
            return Err(RegistryError::InvalidName(name.to_string()));
        }

        if self.exporters.iter().any(|e| e.name() == name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }

        self.exporters.push(exporter);
        Ok(())
    }

    /// Loads every plugin in the given directories and returns all
    /// registered exporters, including earlier ones
    pub fn discover<P: AsRef<Path>>(&mut self, search_paths: &[P]) -> Result<&[Box<dyn Exporter>]> {
        for dir in search_paths {
            self.scan_directory(dir.as_ref())?;
        }
        Ok(&self.exporters)
    }

    /// Returns all registered exporters without scanning
    pub fn all_registered(&self) -> &[Box<dyn Exporter>] {
        &self.exporters
    }

    /// Exporter names in precedence order
    pub fn order(&self) -> Vec<&str> {
        self.exporters.iter().map(|e| e.name()).collect()
    }

    /// Returns the first exporter claiming `path`
    pub fn find_claiming(&self, path: &Path) -> Option<&dyn Exporter> {
        self.exporters
            .iter()
            .find(|e| e.claims(path))
            .map(|e| e.as_ref())
    }

    /// Returns the exporter with exactly this name
    pub fn find_by_name(&self, name: &str) -> Option<&dyn Exporter> {
        self.exporters
            .iter()
            .find(|e| e.name() == name)
            .map(|e| e.as_ref())
    }

    /// Binds the named exporter to a source file
    pub fn bind(&self, name: &str, source: SourceFile) -> Result<ExportTarget<'_>, RegistryError> {
        self.find_by_name(name)
            .map(|exporter| ExportTarget::new(exporter, source))
            .ok_or_else(|| RegistryError::UnknownExporter(name.to_string()))
    }

    /// Number of registered exporters
    pub fn len(&self) -> usize {
        self.exporters.len()
    }

    /// Returns true if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.exporters.is_empty()
    }

    /// Scans one directory for plugin executables
    fn scan_directory(&mut self, dir: &Path) -> Result<()> {
        if !dir.is_dir() {
            return Err(RegistryError::DirectoryNotFound(dir.to_path_buf()).into());
        }

        let entries = fs::read_dir(dir)
            .with_context(|| format!("Failed to read plugin directory: {}", dir.display()))?;

        let mut candidates = Vec::new();
        for entry in entries {
            let entry = entry
                .with_context(|| format!("Failed to read plugin directory: {}", dir.display()))?;
            let path = entry.path();
            let is_plugin = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(PLUGIN_PREFIX));

            if is_plugin && path.is_file() && is_executable(&path) {
                candidates.push(path);
            }
        }

        // Directory iteration order is platform dependent
        candidates.sort();

        for path in candidates {
            if self.loaded.contains(&path) {
                continue;
            }

            let exporter = ExternalExporter::load(&path)
                .with_context(|| format!("Failed to load plugin: {}", path.display()))?;
            self.register(Box::new(exporter))
                .with_context(|| format!("Failed to register plugin: {}", path.display()))?;
            self.loaded.insert(path);
        }

        Ok(())
    }
}

/// Checks if a file is executable
fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(meta) = path.metadata() {
            return meta.permissions().mode() & 0o111 != 0;
        }
    }

    #[cfg(windows)]
    {
        if let Some(ext) = path.extension() {
            return ext == "exe" || ext == "bat" || ext == "cmd";
        }
    }

    false
}
