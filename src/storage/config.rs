//! Configuration handling for databuild
//!
//! Configuration is read from `<out_dir>/databuild.toml` (project) and
//! `~/.config/databuild/config.toml` (global). Project values win.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::build_file::DEFAULT_BUILD_FILE;

/// File name of the project configuration inside the output directory
pub const PROJECT_CONFIG_FILE: &str = "databuild.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// External tools invoked by the built-in exporters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolsConfig {
    /// Shader compiler used by the `Shader` exporter
    pub shaderc: String,

    /// Model builder used by the `Model` exporter
    pub modelbuild: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            shaderc: "shaderc".to_string(),
            modelbuild: "modelbuild".to_string(),
        }
    }
}

/// Settings for the `Model` exporter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ModelConfig {
    /// File extensions (without dot) handled by the model builder
    pub extensions: Vec<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            extensions: ["fbx", "obj", "dae", "3ds", "blend", "gltf", "glb"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Partial configuration as it appears in a single file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConfigFile {
    pub ninja: Option<String>,
    pub build_file: Option<String>,
    pub builtin_exporters: Option<bool>,
    pub tools: Option<ToolsConfig>,
    pub model: Option<ModelConfig>,
}

/// Effective configuration (global + project)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Build engine executable
    pub ninja: String,

    /// Name of the generated build file inside the output directory
    pub build_file: String,

    /// Register the built-in exporters after the directory plugins
    pub builtin_exporters: bool,

    pub tools: ToolsConfig,

    pub model: ModelConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ninja: "ninja".to_string(),
            build_file: DEFAULT_BUILD_FILE.to_string(),
            builtin_exporters: true,
            tools: ToolsConfig::default(),
            model: ModelConfig::default(),
        }
    }
}

impl Config {
    /// Loads the global configuration and the project file in `out_dir`
    pub fn load(out_dir: &Path) -> Result<Self> {
        let mut config = Self::default();

        if let Some(global) = Self::global_config_path() {
            if let Some(file) = Self::read_file(&global)? {
                config.apply(file);
            }
        }

        if let Some(file) = Self::read_file(&out_dir.join(PROJECT_CONFIG_FILE))? {
            config.apply(file);
        }

        config.check()?;
        Ok(config)
    }

    /// Loads only the project file in `out_dir`, ignoring global settings
    #[cfg(test)]
    pub fn for_output_dir(out_dir: &Path) -> Result<Self> {
        let mut config = Self::default();
        if let Some(file) = Self::read_file(&out_dir.join(PROJECT_CONFIG_FILE))? {
            config.apply(file);
        }
        config.check()?;
        Ok(config)
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "databuild", "databuild")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Reads and parses a config file; a missing file yields `None`
    fn read_file(path: &Path) -> Result<Option<ConfigFile>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        toml::from_str(&content)
            .map(Some)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// Overrides fields that are set in `file`
    fn apply(&mut self, file: ConfigFile) {
        if let Some(ninja) = file.ninja {
            self.ninja = ninja;
        }
        if let Some(build_file) = file.build_file {
            self.build_file = build_file;
        }
        if let Some(builtin) = file.builtin_exporters {
            self.builtin_exporters = builtin;
        }
        if let Some(tools) = file.tools {
            self.tools = tools;
        }
        if let Some(model) = file.model {
            self.model = model;
        }
    }

    fn check(&self) -> Result<()> {
        if self.ninja.trim().is_empty() {
            return Err(ConfigError::Invalid("'ninja' must not be empty".to_string()).into());
        }

        let build_file = Path::new(&self.build_file);
        if self.build_file.is_empty() || build_file.components().count() != 1 {
            return Err(ConfigError::Invalid(format!(
                "'build_file' must be a plain file name, got '{}'",
                self.build_file
            ))
            .into());
        }

        Ok(())
    }
}
