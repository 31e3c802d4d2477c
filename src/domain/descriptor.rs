//! Dependency descriptors
//!
//! Every exporter reports the build edge for a source file by filling in a
//! [`DependencyInfo`] before any conversion runs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum DescriptorError {
    #[error("Exporter '{exporter}' declared no outputs for {source_file}")]
    NoOutputs {
        exporter: String,
        source_file: PathBuf,
    },

    #[error("Exporter '{exporter}' declared no inputs for {source_file}")]
    NoInputs {
        exporter: String,
        source_file: PathBuf,
    },

    #[error("Path contains {character:?}, which a build graph cannot express: {path:?}")]
    UnsupportedCharacter { path: PathBuf, character: char },
}

/// Characters ninja has no escape for inside a path
const UNSUPPORTED_CHARACTERS: &[char] = &['\n', '\r', '|'];

/// Inputs, outputs and extra dependencies of a single build edge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencyInfo {
    /// Files the edge reads; the source file is always the first entry
    pub inputs: Vec<PathBuf>,

    /// Files the edge produces, relative to the output directory
    pub outputs: Vec<PathBuf>,

    /// Implicit dependencies (headers, includes, referenced textures)
    pub extra_dependencies: Vec<PathBuf>,

    /// Makefile-style depfile written by the exporter, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depfile: Option<PathBuf>,
}

impl DependencyInfo {
    /// Creates a descriptor whose only input is the source file
    pub fn for_source(source: impl Into<PathBuf>) -> Self {
        Self {
            inputs: vec![source.into()],
            ..Self::default()
        }
    }

    /// Checks the invariants that must hold after `describe`
    pub fn validate(&self, exporter: &str, source: &Path) -> Result<(), DescriptorError> {
        if self.outputs.is_empty() {
            return Err(DescriptorError::NoOutputs {
                exporter: exporter.to_string(),
                source_file: source.to_path_buf(),
            });
        }

        if self.inputs.is_empty() {
            return Err(DescriptorError::NoInputs {
                exporter: exporter.to_string(),
                source_file: source.to_path_buf(),
            });
        }

        let all = std::iter::once(source)
            .chain(self.inputs.iter().map(PathBuf::as_path))
            .chain(self.outputs.iter().map(PathBuf::as_path))
            .chain(self.extra_dependencies.iter().map(PathBuf::as_path))
            .chain(self.depfile.as_deref());

        all.map(check_path).collect()
    }

    /// Merges fields reported by an external plugin into this descriptor.
    ///
    /// Reported inputs are appended after the source file unless the plugin
    /// repeats the source itself.
    pub fn merge(&mut self, reported: DependencyInfo) {
        for input in reported.inputs {
            if !self.inputs.contains(&input) {
                self.inputs.push(input);
            }
        }
        self.outputs.extend(reported.outputs);
        self.extra_dependencies.extend(reported.extra_dependencies);
        if reported.depfile.is_some() {
            self.depfile = reported.depfile;
        }
    }
}

/// Rejects paths that would change meaning inside a build statement
pub fn check_path(path: &Path) -> Result<(), DescriptorError> {
    let text = path.to_string_lossy();
    match text.chars().find(|c| UNSUPPORTED_CHARACTERS.contains(c)) {
        Some(character) => Err(DescriptorError::UnsupportedCharacter {
            path: path.to_path_buf(),
            character,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_source_seeds_inputs() {
        let deps = DependencyInfo::for_source("/data/a.png");
        assert_eq!(deps.inputs, vec![PathBuf::from("/data/a.png")]);
        assert!(deps.outputs.is_empty());
        assert!(deps.depfile.is_none());
    }

    #[test]
    fn empty_outputs_rejected() {
        let deps = DependencyInfo::for_source("/data/a.png");
        let err = deps.validate("Image", Path::new("/data/a.png")).unwrap_err();
        assert!(matches!(err, DescriptorError::NoOutputs { .. }));
    }

    #[test]
    fn newline_rejected() {
        let mut deps = DependencyInfo::for_source("/data/a.png");
        deps.outputs.push(PathBuf::from("bad\nname"));
        let err = deps.validate("Image", Path::new("/data/a.png")).unwrap_err();
        assert_eq!(
            err,
            DescriptorError::UnsupportedCharacter {
                path: PathBuf::from("bad\nname"),
                character: '\n',
            }
        );
    }

    #[test]
    fn pipe_and_carriage_return_rejected() {
        let mut deps = DependencyInfo::for_source("/data/a.png");
        deps.outputs.push(PathBuf::from("a.png"));
        deps.extra_dependencies.push(PathBuf::from("/data/a|b.meta"));
        let err = deps.validate("Image", Path::new("/data/a.png")).unwrap_err();
        assert!(matches!(err, DescriptorError::UnsupportedCharacter { character: '|', .. }));

        let mut deps = DependencyInfo::for_source("/data/a.png");
        deps.outputs.push(PathBuf::from("a\r.png"));
        let err = deps.validate("Image", Path::new("/data/a.png")).unwrap_err();
        assert!(matches!(err, DescriptorError::UnsupportedCharacter { character: '\r', .. }));
    }

    #[test]
    fn source_path_is_checked() {
        let mut deps = DependencyInfo::for_source("/data/a.png");
        deps.inputs.clear();
        deps.inputs.push(PathBuf::from("/data/other.png"));
        deps.outputs.push(PathBuf::from("a.png"));

        let err = deps.validate("Image", Path::new("/data/a|b.png")).unwrap_err();
        assert_eq!(
            err,
            DescriptorError::UnsupportedCharacter {
                path: PathBuf::from("/data/a|b.png"),
                character: '|',
            }
        );
    }

    #[test]
    fn valid_descriptor() {
        let mut deps = DependencyInfo::for_source("/data/a.png");
        deps.outputs.push(PathBuf::from("a.png"));
        assert!(deps.validate("Image", Path::new("/data/a.png")).is_ok());
    }

    #[test]
    fn merge_keeps_source_first() {
        let mut deps = DependencyInfo::for_source("/data/a.hlsl");
        deps.merge(DependencyInfo {
            inputs: vec![PathBuf::from("/data/a.hlsl"), PathBuf::from("/data/common.hlsli")],
            outputs: vec![PathBuf::from("a.tsh")],
            extra_dependencies: vec![PathBuf::from("/data/defs.h")],
            depfile: Some(PathBuf::from("a.d")),
        });

        assert_eq!(
            deps.inputs,
            vec![PathBuf::from("/data/a.hlsl"), PathBuf::from("/data/common.hlsli")]
        );
        assert_eq!(deps.outputs, vec![PathBuf::from("a.tsh")]);
        assert_eq!(deps.extra_dependencies, vec![PathBuf::from("/data/defs.h")]);
        assert_eq!(deps.depfile, Some(PathBuf::from("a.d")));
    }

    #[test]
    fn deserialize_partial_response() {
        let deps: DependencyInfo = serde_json::from_str(r#"{"outputs": ["a.image"]}"#).unwrap();
        assert_eq!(deps.outputs, vec![PathBuf::from("a.image")]);
        assert!(deps.inputs.is_empty());
    }
}
