//! Build file persistence
//!
//! The generated graph is only ever written in one piece: the complete text
//! goes to a temp file next to the target, which is then renamed over it.
//! A failed configuration leaves the previous build file untouched.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Default name of the generated build file
pub const DEFAULT_BUILD_FILE: &str = "build.ninja";

/// The build file in an output directory
pub struct BuildFile {
    path: PathBuf,
}

impl BuildFile {
    /// Creates a handle for the build file at the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the path of the build file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if a build file has been written
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Reads the current build file
    pub fn read(&self) -> Result<String> {
        fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read build file: {}", self.path.display()))
    }

    /// Replaces the build file with `contents`
    pub fn write(&self, contents: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let temp_path = self.path.with_extension("ninja.tmp");

        {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;

            let mut writer = BufWriter::new(file);
            let written = writer
                .write_all(contents.as_bytes())
                .and_then(|_| writer.flush());
            drop(writer);

            if let Err(e) = written {
                let _ = fs::remove_file(&temp_path);
                return Err(e)
                    .with_context(|| format!("Failed to write build file: {}", temp_path.display()));
            }
        }

        fs::rename(&temp_path, &self.path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                self.path.display()
            )
        })
    }
}
