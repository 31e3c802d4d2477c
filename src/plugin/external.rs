//! Exporters backed by external plugin executables
//!
//! The plugin receives one JSON request line on stdin and answers with a
//! JSON response as the last non-empty line on stdout. Anything printed
//! before that line is treated as plugin log output and ignored.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result};

use super::exporter::{extension_of, Exporter, SourceFile};
use super::protocol::{Operation, PluginManifest, PluginRequest, PluginResponse};
use crate::domain::DependencyInfo;

/// An exporter implemented by a plugin executable
#[derive(Debug, Clone)]
pub struct ExternalExporter {
    /// Path to the plugin executable
    path: PathBuf,

    /// Manifest reported by the plugin
    manifest: PluginManifest,

    /// Normalized claimed extensions (lowercase, no dot)
    extensions: Vec<String>,
}

impl ExternalExporter {
    /// Loads a plugin by asking it for its manifest
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let manifest = Self::load_manifest(&path)?;
        Ok(Self::from_manifest(path, manifest))
    }

    /// Creates an exporter from an already known manifest
    pub fn from_manifest(path: impl Into<PathBuf>, manifest: PluginManifest) -> Self {
        let extensions = manifest
            .extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();

        Self {
            path: path.into(),
            manifest,
            extensions,
        }
    }

    /// Returns the path to the plugin executable
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the plugin manifest
    pub fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    /// Loads the manifest from a plugin
    fn load_manifest(path: &Path) -> Result<PluginManifest> {
        let output = Command::new(path)
            .arg("--manifest")
            .output()
            .with_context(|| format!("Failed to execute plugin: {}", path.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Plugin {} returned error: {}", path.display(), stderr.trim());
        }

        serde_json::from_slice(&output.stdout)
            .with_context(|| format!("Failed to parse manifest of plugin: {}", path.display()))
    }

    /// Executes a plugin request
    fn execute(&self, request: &PluginRequest) -> Result<PluginResponse> {
        let mut child = Command::new(&self.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn plugin: {}", self.path.display()))?;

        // Send request and close stdin so the plugin sees EOF
        {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| anyhow::anyhow!("Failed to open plugin stdin"))?;
            let request_json = serde_json::to_string(request).context("Failed to serialize request")?;
            writeln!(stdin, "{}", request_json).context("Failed to write to plugin")?;
        }

        let output = child
            .wait_with_output()
            .with_context(|| format!("Failed to wait for plugin: {}", self.path.display()))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let response_line = stdout.lines().rev().find(|line| !line.trim().is_empty());

        let response = match response_line {
            Some(line) => serde_json::from_str::<PluginResponse>(line)
                .context("Failed to parse plugin response")?,
            None => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                anyhow::bail!(
                    "No response from plugin {} ({}): {}",
                    self.path.display(),
                    output.status,
                    stderr.trim()
                );
            }
        };

        if response.success && !output.status.success() {
            anyhow::bail!(
                "Plugin {} reported success but exited with {}",
                self.path.display(),
                output.status
            );
        }

        Ok(response)
    }
}

impl Exporter for ExternalExporter {
    fn name(&self) -> &str {
        &self.manifest.name
    }

    fn claims(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| self.extensions.contains(&ext))
    }

    fn describe(&self, source: &SourceFile, deps: &mut DependencyInfo) -> Result<()> {
        let request = PluginRequest::new(Operation::Describe, source);
        let response = self.execute(&request)?;

        if !response.success {
            anyhow::bail!("Plugin error: {}", response.error_message());
        }

        let data = response
            .data
            .ok_or_else(|| anyhow::anyhow!("No dependency info returned"))?;
        let reported: DependencyInfo =
            serde_json::from_value(data).context("Failed to parse dependency info")?;

        deps.merge(reported);
        Ok(())
    }

    fn run(&self, source: &SourceFile) -> Result<()> {
        let request = PluginRequest::new(Operation::Run, source);
        let response = self.execute(&request)?;

        if !response.success {
            anyhow::bail!("Plugin error: {}", response.error_message());
        }

        Ok(())
    }
}
