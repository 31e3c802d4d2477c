//! Build orchestration
//!
//! A [`Context`] ties together the output, plugin and data directories, the
//! exporter registry and the configuration for one invocation. It has two
//! entry points used by the CLI:
//!
//! - [`Context::configure`] walks the data directory and writes the ninja
//!   build graph, unless the file index says nothing changed.
//! - [`Context::export`] runs one exporter on one file. Generated build rules
//!   call back into databuild this way, once per build edge.

use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use anyhow::{Context as _, Result};

use crate::domain::ninja::{escape_value, NinjaWriter, Rule};
use crate::domain::{BuildEdge, EdgeGraph};
use crate::plugin::{builtin_exporters, ExportTarget, Registry, SourceFile};
use crate::storage::{snapshot, BuildFile, Config, FileIndex, Snapshot};

/// The three directories an invocation works with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directories {
    /// Where the build graph, index and exported assets go
    pub out_dir: PathBuf,

    /// Directory scanned for plugin executables
    pub plugin_dir: Option<PathBuf>,

    /// Root of the source assets
    pub data_dir: PathBuf,
}

/// Result of a configure step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigureOutcome {
    /// The data directory did not change; nothing was written
    Unchanged,

    /// A new build graph was written
    Generated(GraphSummary),
}

/// What went into a generated build graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphSummary {
    /// Path of the written build file
    pub build_file: PathBuf,

    /// Number of build statements
    pub edges: usize,

    /// Rule names in the order they were emitted
    pub rules: Vec<String>,

    /// Files no exporter claimed
    pub skipped: usize,
}

/// A build graph rendered in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedGraph {
    pub text: String,
    pub edges: usize,
    pub rules: Vec<String>,
    pub skipped: usize,
}

/// Builds the registry: directory plugins first, then the built-ins
pub fn load_registry(config: &Config, plugin_dir: Option<&Path>) -> Result<Registry> {
    let mut registry = Registry::new();
    if let Some(plugin_dir) = plugin_dir {
        registry.discover(&[plugin_dir])?;
    }
    if config.builtin_exporters {
        for exporter in builtin_exporters(config) {
            registry.register(exporter)?;
        }
    }
    Ok(registry)
}

/// Orchestrator for one databuild invocation
pub struct Context {
    out_dir: PathBuf,
    plugin_dir: Option<PathBuf>,
    data_dir: PathBuf,
    program: PathBuf,
    config: Config,
    registry: Registry,
}

impl Context {
    /// Opens a context with the configuration from `out_dir`, the plugins in
    /// `plugin_dir` and, unless disabled, the built-in exporters
    pub fn open(dirs: Directories) -> Result<Self> {
        let config = Config::load(&dirs.out_dir)?;
        let registry = load_registry(&config, dirs.plugin_dir.as_deref())?;
        Self::new(dirs, config, registry)
    }

    /// Creates a context from explicit parts
    pub fn new(dirs: Directories, config: Config, registry: Registry) -> Result<Self> {
        std::fs::create_dir_all(&dirs.out_dir).with_context(|| {
            format!("Failed to create output directory: {}", dirs.out_dir.display())
        })?;

        let out_dir = dirs.out_dir.canonicalize().with_context(|| {
            format!("Failed to resolve output directory: {}", dirs.out_dir.display())
        })?;
        let data_dir = dirs.data_dir.canonicalize().with_context(|| {
            format!("Data directory not found: {}", dirs.data_dir.display())
        })?;
        let plugin_dir = match dirs.plugin_dir {
            Some(dir) => Some(dir.canonicalize().with_context(|| {
                format!("Plugin directory not found: {}", dir.display())
            })?),
            None => None,
        };

        let program = std::env::current_exe()
            .context("Failed to determine the databuild executable path")?;

        Ok(Self {
            out_dir,
            plugin_dir,
            data_dir,
            program,
            config,
            registry,
        })
    }

    /// Sets the executable that generated rules invoke
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn plugin_dir(&self) -> Option<&Path> {
        self.plugin_dir.as_deref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The persisted file index for this output directory
    pub fn index(&self) -> FileIndex {
        FileIndex::for_output_dir(&self.out_dir)
    }

    /// The build file for this output directory
    pub fn build_file(&self) -> BuildFile {
        BuildFile::new(self.out_dir.join(&self.config.build_file))
    }

    /// Regenerates the build graph if the data directory changed
    pub fn configure(&self) -> Result<ConfigureOutcome> {
        self.configure_with(false)
    }

    /// Like [`Context::configure`]; `force` ignores the persisted index
    pub fn configure_with(&self, force: bool) -> Result<ConfigureOutcome> {
        let index = self.index();

        let files = if force {
            let files = snapshot(&self.data_dir)?;
            index.write(&files)?;
            files
        } else {
            match index.check(&self.data_dir)? {
                Some(files) => files,
                None => return Ok(ConfigureOutcome::Unchanged),
            }
        };

        let build_file = self.build_file();
        let result = self
            .generate(&files)
            .and_then(|graph| build_file.write(&graph.text).map(|_| graph));

        match result {
            Ok(graph) => Ok(ConfigureOutcome::Generated(GraphSummary {
                build_file: build_file.path().to_path_buf(),
                edges: graph.edges,
                rules: graph.rules,
                skipped: graph.skipped,
            })),
            // The snapshot was already persisted; drop it so the next run retries
            Err(e) => Err(abandon_index(&index, e)),
        }
    }

    /// Renders the build graph for `files` without touching the disk
    pub fn generate(&self, files: &Snapshot) -> Result<GeneratedGraph> {
        let mut graph = EdgeGraph::new(&self.out_dir);
        let mut skipped = 0;

        for file in files {
            let Some(target) = self.find_exporter(file) else {
                skipped += 1;
                continue;
            };

            let deps = target.describe().with_context(|| {
                format!(
                    "Exporter '{}' failed to describe {}",
                    target.name(),
                    file.display()
                )
            })?;

            graph.add_edge(BuildEdge {
                exporter: target.name().to_string(),
                source: file.clone(),
                deps,
            })?;
        }

        graph.validate()?;

        let rules: Vec<String> = graph.exporters().iter().map(|s| s.to_string()).collect();
        Ok(GeneratedGraph {
            text: self.render(&graph),
            edges: graph.len(),
            rules,
            skipped,
        })
    }

    /// Runs the build engine on the generated graph
    pub fn build(&self) -> Result<ExitStatus> {
        Command::new(&self.config.ninja)
            .arg("-C")
            .arg(&self.out_dir)
            .arg("-f")
            .arg(&self.config.build_file)
            .status()
            .with_context(|| format!("Failed to run build engine '{}'", self.config.ninja))
    }

    /// Runs the named exporter on a single file
    pub fn export(&self, exporter: &str, file: &Path) -> Result<()> {
        let path = self.locate_source(file)?;
        let source = SourceFile::new(path, &self.data_dir, &self.out_dir);
        let target = self.registry.bind(exporter, source)?;

        target
            .run()
            .with_context(|| format!("Exporter '{}' failed on {}", exporter, file.display()))
    }

    /// Resolves `file` the way the snapshot names it. Paths under the data
    /// directory are kept as given, symlinks included, so the relative path
    /// matches the outputs declared in the graph.
    fn locate_source(&self, file: &Path) -> Result<PathBuf> {
        let absolute = if file.is_absolute() {
            file.to_path_buf()
        } else {
            std::env::current_dir()
                .context("Failed to determine current directory")?
                .join(file)
        };

        if !absolute.is_file() {
            anyhow::bail!("Source file not found: {}", file.display());
        }

        if absolute.starts_with(&self.data_dir) {
            return Ok(absolute);
        }

        absolute
            .canonicalize()
            .with_context(|| format!("Source file not found: {}", file.display()))
    }

    /// Returns the first exporter claiming `path`, bound to it
    pub fn find_exporter(&self, path: &Path) -> Option<ExportTarget<'_>> {
        self.registry.find_claiming(path).map(|exporter| {
            ExportTarget::new(exporter, SourceFile::new(path, &self.data_dir, &self.out_dir))
        })
    }

    fn render(&self, graph: &EdgeGraph) -> String {
        let mut n = NinjaWriter::new();
        n.comment("Generated by databuild. Do not edit.");
        n.newline();

        n.variable("OUTDIR", &escape_value(&self.out_dir.to_string_lossy()));
        n.variable("DATDIR", &escape_value(&self.data_dir.to_string_lossy()));
        if let Some(plugin_dir) = &self.plugin_dir {
            n.variable("EXPDIR", &escape_value(&plugin_dir.to_string_lossy()));
        }
        n.variable("DBUILD", &escape_value(&self.program.to_string_lossy()));
        n.newline();

        for name in graph.exporters() {
            let uses_depfile = graph
                .edges()
                .iter()
                .any(|e| e.exporter == name && e.deps.depfile.is_some());

            n.rule(&Rule {
                name: name.to_string(),
                command: self.export_command(name),
                description: Some(format!("{} $out", name)),
                depfile: uses_depfile.then(|| "$depfile".to_string()),
            });
            n.newline();
        }

        for edge in graph.edges() {
            let mut variables = vec![("source", escape_value(&edge.source.to_string_lossy()))];
            if let Some(depfile) = &edge.deps.depfile {
                variables.push(("depfile", escape_value(&depfile.to_string_lossy())));
            }

            n.build(
                &edge.deps.outputs,
                &edge.exporter,
                &edge.deps.inputs,
                &edge.deps.extra_dependencies,
                &variables,
            );
        }

        n.finish()
    }

    /// Command line that re-enters databuild in single-file export mode
    fn export_command(&self, exporter: &str) -> String {
        let plugin_arg = if self.plugin_dir.is_some() {
            " --plugin-dir \"$EXPDIR\""
        } else {
            ""
        };

        format!(
            "\"$DBUILD\" --out-dir \"$OUTDIR\"{} --export {} \"$source\" \"$DATDIR\"",
            plugin_arg, exporter
        )
    }
}

/// Removes the index after a failed configure. A failure to remove it is
/// reported along with the original error.
fn abandon_index(index: &FileIndex, err: anyhow::Error) -> anyhow::Error {
    match index.invalidate() {
        Ok(()) => err,
        Err(cleanup) => err.context(format!(
            "Could not reset the file index; delete {} before the next run: {:#}",
            index.path().display(),
            cleanup
        )),
    }
}
