//! Built-in exporters
//!
//! These ship with databuild and are registered after any directory
//! plugins, so a plugin claiming the same extension takes precedence.
//!
//! | Exporter | Extensions | Output |
//! |----------|------------|--------|
//! | `Image` | tga, png, jpg | copy of the source |
//! | `Shader` | fx, hlsl | `<stem>.tsh` via the shader compiler |
//! | `Model` | configurable | `<stem>.tsm` via the model builder |

use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};

use super::exporter::{extension_of, Exporter, SourceFile};
use crate::domain::DependencyInfo;
use crate::storage::Config;

const IMAGE_EXTENSIONS: &[&str] = &["tga", "png", "jpg"];
const SHADER_EXTENSIONS: &[&str] = &["fx", "hlsl"];

/// Creates the built-in exporters in registration order
pub fn builtin_exporters(config: &Config) -> Vec<Box<dyn Exporter>> {
    vec![
        Box::new(ImageExporter),
        Box::new(ShaderExporter::new(&config.tools.shaderc)),
        Box::new(ModelExporter::new(&config.tools.modelbuild, &config.model.extensions)),
    ]
}

/// Copies images into the output tree unchanged
pub struct ImageExporter;

impl Exporter for ImageExporter {
    fn name(&self) -> &str {
        "Image"
    }

    fn claims(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
    }

    fn describe(&self, source: &SourceFile, deps: &mut DependencyInfo) -> Result<()> {
        deps.outputs.push(source.relative.clone());
        Ok(())
    }

    fn run(&self, source: &SourceFile) -> Result<()> {
        let out_dir = source.output_dir();
        fs::create_dir_all(&out_dir)
            .with_context(|| format!("Failed to create directory: {}", out_dir.display()))?;

        let target = source.out_dir.join(&source.relative);
        fs::copy(&source.path, &target).with_context(|| {
            format!(
                "Failed to copy {} to {}",
                source.path.display(),
                target.display()
            )
        })?;
        Ok(())
    }
}

/// Compiles shader sources with the external shader compiler
pub struct ShaderExporter {
    compiler: String,
}

impl ShaderExporter {
    pub fn new(compiler: impl Into<String>) -> Self {
        Self {
            compiler: compiler.into(),
        }
    }
}

impl Exporter for ShaderExporter {
    fn name(&self) -> &str {
        "Shader"
    }

    fn claims(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| SHADER_EXTENSIONS.contains(&ext.as_str()))
    }

    fn describe(&self, source: &SourceFile, deps: &mut DependencyInfo) -> Result<()> {
        deps.outputs.push(source.relative_with_extension("tsh"));
        Ok(())
    }

    fn run(&self, source: &SourceFile) -> Result<()> {
        let out_dir = source.output_dir();
        fs::create_dir_all(&out_dir)
            .with_context(|| format!("Failed to create directory: {}", out_dir.display()))?;

        let source_dir = source.path.parent().unwrap_or(&source.data_dir);
        let mut command = Command::new(&self.compiler);
        command
            .arg("-t")
            .arg(&source.path)
            .arg("-o")
            .arg(&out_dir)
            .arg("-s")
            .arg(source_dir);

        run_tool(command, &self.compiler, "Unable to compile shader")
    }
}

/// Converts model files with the external model builder
pub struct ModelExporter {
    builder: String,
    extensions: Vec<String>,
}

impl ModelExporter {
    pub fn new(builder: impl Into<String>, extensions: &[String]) -> Self {
        Self {
            builder: builder.into(),
            extensions: extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }
}

impl Exporter for ModelExporter {
    fn name(&self) -> &str {
        "Model"
    }

    fn claims(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| self.extensions.contains(&ext))
    }

    fn describe(&self, source: &SourceFile, deps: &mut DependencyInfo) -> Result<()> {
        deps.outputs.push(source.relative_with_extension("tsm"));
        Ok(())
    }

    fn run(&self, source: &SourceFile) -> Result<()> {
        let out_dir = source.output_dir();
        fs::create_dir_all(&out_dir)
            .with_context(|| format!("Failed to create directory: {}", out_dir.display()))?;

        let mut command = Command::new(&self.builder);
        command
            .arg("-t")
            .arg(&source.path)
            .arg("-o")
            .arg(&out_dir)
            .arg("-q");

        run_tool(command, &self.builder, "Unable to export model")
    }
}

/// Runs a conversion tool; a non-zero exit becomes an error carrying stderr
fn run_tool(mut command: Command, program: &str, failure: &str) -> Result<()> {
    let output = command
        .output()
        .with_context(|| format!("Failed to execute {}", program))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let detail = if stderr.trim().is_empty() { stdout } else { stderr };
        anyhow::bail!("{} ({}): {}", failure, output.status, detail.trim());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn builtin_order() {
        let exporters = builtin_exporters(&Config::default());
        let names: Vec<&str> = exporters.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["Image", "Shader", "Model"]);
    }

    #[test]
    fn image_claims() {
        assert!(ImageExporter.claims(Path::new("a.png")));
        assert!(ImageExporter.claims(Path::new("b.JPG")));
        assert!(ImageExporter.claims(Path::new("c.tga")));
        assert!(!ImageExporter.claims(Path::new("d.hlsl")));
    }

    #[test]
    fn image_describe_keeps_relative_path() {
        let source = SourceFile::new("/data/textures/a.png", "/data", "/out");
        let mut deps = DependencyInfo::for_source(&source.path);
        ImageExporter.describe(&source, &mut deps).unwrap();
        assert_eq!(deps.outputs, vec![PathBuf::from("textures/a.png")]);
    }

    #[test]
    fn image_run_copies_file() {
        let data = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        fs::create_dir_all(data.path().join("textures")).unwrap();
        fs::write(data.path().join("textures/a.png"), b"pixels").unwrap();

        let source = SourceFile::new(data.path().join("textures/a.png"), data.path(), out.path());
        ImageExporter.run(&source).unwrap();

        assert_eq!(fs::read(out.path().join("textures/a.png")).unwrap(), b"pixels");
    }

    #[test]
    fn shader_describe() {
        let shader = ShaderExporter::new("shaderc");
        assert!(shader.claims(Path::new("/data/lit.hlsl")));
        assert!(shader.claims(Path::new("/data/post.FX")));

        let source = SourceFile::new("/data/shaders/lit.hlsl", "/data", "/out");
        let mut deps = DependencyInfo::for_source(&source.path);
        shader.describe(&source, &mut deps).unwrap();
        assert_eq!(deps.outputs, vec![PathBuf::from("shaders/lit.tsh")]);
    }

    #[test]
    fn model_uses_configured_extensions() {
        let model = ModelExporter::new("modelbuild", &[".FBX".to_string(), "obj".to_string()]);
        assert!(model.claims(Path::new("ship.fbx")));
        assert!(model.claims(Path::new("rock.obj")));
        assert!(!model.claims(Path::new("scene.gltf")));

        let source = SourceFile::new("/data/ship.fbx", "/data", "/out");
        let mut deps = DependencyInfo::for_source(&source.path);
        model.describe(&source, &mut deps).unwrap();
        assert_eq!(deps.outputs, vec![PathBuf::from("ship.tsm")]);
    }

    #[test]
    fn missing_tool_is_an_error() {
        let data = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        fs::write(data.path().join("lit.hlsl"), b"").unwrap();

        let shader = ShaderExporter::new("databuild-test-no-such-compiler");
        let source = SourceFile::new(data.path().join("lit.hlsl"), data.path(), out.path());

        let err = shader.run(&source).unwrap_err();
        assert!(err.to_string().contains("Failed to execute"));
    }
}
