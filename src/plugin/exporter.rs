//! Exporter interface
//!
//! An exporter claims source files by name and knows how to describe and
//! perform its own export. Binding an exporter to one source file yields an
//! [`ExportTarget`].

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::domain::DependencyInfo;

/// A source file in the data directory, as seen by an exporter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute path of the source file
    pub path: PathBuf,

    /// Path relative to the data directory
    pub relative: PathBuf,

    /// Absolute data directory
    pub data_dir: PathBuf,

    /// Absolute output directory
    pub out_dir: PathBuf,
}

impl SourceFile {
    /// Creates a source file; `relative` falls back to the file name when
    /// `path` is not inside `data_dir`
    pub fn new(path: impl Into<PathBuf>, data_dir: impl Into<PathBuf>, out_dir: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data_dir = data_dir.into();
        let relative = path
            .strip_prefix(&data_dir)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.file_name().map(PathBuf::from).unwrap_or_default());

        Self {
            path,
            relative,
            data_dir,
            out_dir: out_dir.into(),
        }
    }

    /// Relative path with the extension replaced
    pub fn relative_with_extension(&self, extension: &str) -> PathBuf {
        self.relative.with_extension(extension)
    }

    /// Directory in the output tree that mirrors the source's directory
    pub fn output_dir(&self) -> PathBuf {
        match self.relative.parent() {
            Some(parent) => self.out_dir.join(parent),
            None => self.out_dir.clone(),
        }
    }

    /// Lowercase extension of the source file, without the dot
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.path)
    }
}

/// Lowercase extension of a path, without the dot
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// A converter for one family of assets
pub trait Exporter {
    /// Unique name; also used as the rule name in the build graph
    fn name(&self) -> &str;

    /// Returns true if this exporter handles the given file
    fn claims(&self, path: &Path) -> bool;

    /// Fills in the outputs and extra dependencies for `source`
    fn describe(&self, source: &SourceFile, deps: &mut DependencyInfo) -> Result<()>;

    /// Performs the conversion for `source`
    fn run(&self, source: &SourceFile) -> Result<()>;
}

/// An exporter bound to a concrete source file
pub struct ExportTarget<'a> {
    exporter: &'a dyn Exporter,
    source: SourceFile,
}

impl<'a> ExportTarget<'a> {
    pub fn new(exporter: &'a dyn Exporter, source: SourceFile) -> Self {
        Self { exporter, source }
    }

    /// Name of the bound exporter
    pub fn name(&self) -> &str {
        self.exporter.name()
    }

    /// The bound source file
    pub fn source(&self) -> &SourceFile {
        &self.source
    }

    /// Returns a validated descriptor for the bound file
    pub fn describe(&self) -> Result<DependencyInfo> {
        let mut deps = DependencyInfo::for_source(&self.source.path);
        self.exporter.describe(&self.source, &mut deps)?;
        deps.validate(self.exporter.name(), &self.source.path)?;
        Ok(deps)
    }

    /// Runs the bound exporter
    pub fn run(&self) -> Result<()> {
        self.exporter.run(&self.source)
    }
}
