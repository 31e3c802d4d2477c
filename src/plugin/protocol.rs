//! Plugin protocol types
//!
//! External exporters communicate via JSON messages over stdin/stdout.
//! Each plugin must support the `--manifest` flag to declare its name and
//! the file extensions it claims.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::exporter::SourceFile;

/// Plugin manifest declaring capabilities
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PluginManifest {
    /// Exporter name (e.g., "Texture"); must be a valid rule name
    pub name: String,

    /// Plugin version
    #[serde(default)]
    pub version: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// File extensions claimed by the plugin, with or without leading dot
    pub extensions: Vec<String>,
}

/// Operations an exporter plugin must answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Report the dependency descriptor for a file
    Describe,

    /// Convert a file
    Run,
}

/// Paths handed to the plugin for one source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportParams {
    pub source: PathBuf,
    pub relative: PathBuf,
    pub data_dir: PathBuf,
    pub out_dir: PathBuf,
}

impl From<&SourceFile> for ExportParams {
    fn from(source: &SourceFile) -> Self {
        Self {
            source: source.path.clone(),
            relative: source.relative.clone(),
            data_dir: source.data_dir.clone(),
            out_dir: source.out_dir.clone(),
        }
    }
}

/// A message sent to a plugin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginRequest {
    /// The operation to perform
    pub operation: Operation,

    /// Operation-specific parameters
    pub params: ExportParams,
}

impl PluginRequest {
    pub fn new(operation: Operation, source: &SourceFile) -> Self {
        Self {
            operation,
            params: source.into(),
        }
    }
}

/// A response from a plugin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginResponse {
    /// Whether the operation succeeded
    pub success: bool,

    /// Result data (if success)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Error message (if failure)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PluginResponse {
    #[cfg(test)]
    pub fn success(data: impl Into<serde_json::Value>) -> Self {
        Self {
            success: true,
            data: Some(data.into()),
            error: None,
        }
    }

    #[cfg(test)]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    /// Returns the plugin's error text, or a generic message
    pub fn error_message(&self) -> String {
        self.error
            .clone()
            .unwrap_or_else(|| "Unknown error".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_parsing() {
        let json = r#"{"name": "Texture", "version": "0.1.0", "extensions": [".png", "tga"]}"#;
        let manifest: PluginManifest = serde_json::from_str(json).unwrap();

        assert_eq!(manifest.name, "Texture");
        assert_eq!(manifest.extensions, vec![".png", "tga"]);
        assert!(manifest.description.is_empty());
    }

    #[test]
    fn manifest_requires_extensions() {
        let json = r#"{"name": "Texture"}"#;
        assert!(serde_json::from_str::<PluginManifest>(json).is_err());
    }

    #[test]
    fn request_serialization() {
        let source = SourceFile::new("/data/a.png", "/data", "/out");
        let request = PluginRequest::new(Operation::Describe, &source);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["operation"], "describe");
        assert_eq!(json["params"]["relative"], "a.png");
        assert_eq!(json["params"]["out_dir"], "/out");
    }

    #[test]
    fn response_success() {
        let response = PluginResponse::success(serde_json::json!({"outputs": ["a.png"]}));

        assert!(response.success);
        assert!(response.data.is_some());
        assert!(response.error.is_none());
    }

    #[test]
    fn response_error() {
        let response = PluginResponse::error("Something went wrong");

        assert!(!response.success);
        assert_eq!(response.error_message(), "Something went wrong");
    }

    #[test]
    fn response_without_error_text() {
        let response: PluginResponse = serde_json::from_str(r#"{"success": false}"#).unwrap();
        assert_eq!(response.error_message(), "Unknown error");
    }
}
