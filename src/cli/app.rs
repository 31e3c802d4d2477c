//! Main CLI application structure

use std::path::{Path, PathBuf};
use std::process::{ExitCode, ExitStatus};

use anyhow::{Context as _, Result};
use clap::{ArgGroup, Parser};

use super::output::{Output, OutputFormat};
use crate::context::{load_registry, ConfigureOutcome, Context, Directories};
use crate::storage::Config;

#[derive(Parser)]
#[command(name = "databuild")]
#[command(author, version, about = "Asset pipeline build orchestrator")]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["build", "configure", "export", "list_exporters"])
))]
pub struct Cli {
    /// Output format
    #[arg(long, short = 'f', default_value = "text")]
    pub format: OutputFormat,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Output directory for the build graph and exported assets
    /// (defaults to the current directory)
    #[arg(long, short = 'o', value_name = "DIR", env = "DATABUILD_OUT_DIR")]
    pub out_dir: Option<PathBuf>,

    /// Directory containing databuild-* plugin executables
    #[arg(long, short = 'p', value_name = "DIR", env = "DATABUILD_PLUGIN_DIR")]
    pub plugin_dir: Option<PathBuf>,

    /// Regenerate the build graph even if no files were added or removed
    #[arg(long)]
    pub force: bool,

    /// Configure if needed, then run the build engine
    #[arg(long, value_name = "DATA_DIR")]
    pub build: Option<PathBuf>,

    /// Write the build graph without running the build engine
    #[arg(long, value_name = "DATA_DIR")]
    pub configure: Option<PathBuf>,

    /// Run one exporter on one file
    #[arg(long, num_args = 3, value_names = ["EXPORTER", "DATA_FILE", "DATA_DIR"])]
    pub export: Option<Vec<String>>,

    /// List exporters in precedence order
    #[arg(long)]
    pub list_exporters: bool,
}

/// The selected operating mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Build(PathBuf),
    Configure(PathBuf),
    Export {
        exporter: String,
        file: PathBuf,
        data_dir: PathBuf,
    },
    ListExporters,
}

impl Cli {
    /// Returns the mode selected on the command line
    pub fn mode(&self) -> Result<Mode> {
        if let Some(data_dir) = &self.build {
            return Ok(Mode::Build(data_dir.clone()));
        }
        if let Some(data_dir) = &self.configure {
            return Ok(Mode::Configure(data_dir.clone()));
        }
        if let Some(args) = &self.export {
            return match args.as_slice() {
                [exporter, file, data_dir] => Ok(Mode::Export {
                    exporter: exporter.clone(),
                    file: PathBuf::from(file),
                    data_dir: PathBuf::from(data_dir),
                }),
                _ => anyhow::bail!("--export expects EXPORTER DATA_FILE DATA_DIR"),
            };
        }
        if self.list_exporters {
            return Ok(Mode::ListExporters);
        }
        anyhow::bail!("No mode selected")
    }

    /// Output directory, defaulting to the current directory
    fn out_dir(&self) -> Result<PathBuf> {
        match &self.out_dir {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir().context("Failed to determine current directory"),
        }
    }
}

/// Main entry point for the CLI
pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let output = Output::new(cli.format, cli.verbose);

    output.verbose("databuild starting");

    let mode = cli.mode()?;
    let out_dir = cli.out_dir()?;

    match mode {
        Mode::Build(data_dir) => {
            let ctx = open(&output, &cli, out_dir, data_dir)?;
            configure(&ctx, cli.force, &output)?;

            output.verbose_ctx(
                "build",
                &format!("Running {} in {}", ctx.config().ninja, ctx.out_dir().display()),
            );
            let status = ctx.build()?;
            output.verbose_ctx("build", &format!("Build engine finished: {}", status));
            return Ok(ExitCode::from(exit_code(status)));
        }

        Mode::Configure(data_dir) => {
            let ctx = open(&output, &cli, out_dir, data_dir)?;
            configure(&ctx, cli.force, &output)?;
        }

        Mode::Export {
            exporter,
            file,
            data_dir,
        } => {
            let ctx = open(&output, &cli, out_dir, data_dir)?;
            output.verbose_ctx("export", &format!("{} {}", exporter, file.display()));
            ctx.export(&exporter, &file)?;
        }

        Mode::ListExporters => list_exporters(&output, &out_dir, cli.plugin_dir.as_deref())?,
    }

    output.verbose("Command completed successfully");
    Ok(ExitCode::SUCCESS)
}

fn open(output: &Output, cli: &Cli, out_dir: PathBuf, data_dir: PathBuf) -> Result<Context> {
    output.verbose_ctx("context", &format!("Output directory: {}", out_dir.display()));
    output.verbose_ctx("context", &format!("Data directory: {}", data_dir.display()));

    let ctx = Context::open(Directories {
        out_dir,
        plugin_dir: cli.plugin_dir.clone(),
        data_dir,
    })?;

    output.verbose_ctx(
        "context",
        &format!("Exporters: {}", ctx.registry().order().join(", ")),
    );
    Ok(ctx)
}

fn configure(ctx: &Context, force: bool, output: &Output) -> Result<()> {
    output.verbose_ctx(
        "configure",
        &format!("Scanning {} (force={})", ctx.data_dir().display(), force),
    );

    match ctx.configure_with(force)? {
        ConfigureOutcome::Unchanged => {
            output.verbose_ctx("configure", "No files added or removed");
            output.report(
                "Build graph is up to date",
                serde_json::json!({ "generated": false }),
            );
        }
        ConfigureOutcome::Generated(summary) => {
            output.report(
                &format!(
                    "Generated {} ({} edges, {} rules, {} skipped)",
                    summary.build_file.display(),
                    summary.edges,
                    summary.rules.len(),
                    summary.skipped
                ),
                serde_json::json!({
                    "generated": true,
                    "build_file": summary.build_file.display().to_string(),
                    "edges": summary.edges,
                    "rules": summary.rules,
                    "skipped": summary.skipped,
                }),
            );
        }
    }

    Ok(())
}

fn list_exporters(output: &Output, out_dir: &Path, plugin_dir: Option<&Path>) -> Result<()> {
    let config = Config::load(out_dir)?;
    let registry = load_registry(&config, plugin_dir)?;
    let order = registry.order();

    let text = if order.is_empty() {
        "No exporters registered".to_string()
    } else {
        order
            .iter()
            .enumerate()
            .map(|(i, name)| format!("{:>3}  {}", i + 1, name))
            .collect::<Vec<_>>()
            .join("\n")
    };
    output.report(&text, serde_json::json!({ "exporters": order }));

    Ok(())
}

/// Maps the build engine's status onto our own exit code
fn exit_code(status: ExitStatus) -> u8 {
    match status.code() {
        Some(code) => u8::try_from(code).unwrap_or(1),
        None => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("databuild").chain(args.iter().copied()))
    }

    #[test]
    fn build_mode() {
        let cli = parse(&["--out-dir", "out", "--build", "data"]).unwrap();
        assert_eq!(cli.mode().unwrap(), Mode::Build(PathBuf::from("data")));
        assert_eq!(cli.out_dir, Some(PathBuf::from("out")));
    }

    #[test]
    fn export_mode_takes_three_values() {
        let cli = parse(&["--export", "Image", "/data/a.png", "/data"]).unwrap();
        assert_eq!(
            cli.mode().unwrap(),
            Mode::Export {
                exporter: "Image".to_string(),
                file: PathBuf::from("/data/a.png"),
                data_dir: PathBuf::from("/data"),
            }
        );

        assert!(parse(&["--export", "Image", "/data/a.png"]).is_err());
    }

    #[test]
    fn mode_is_required() {
        assert!(parse(&["--out-dir", "out"]).is_err());
    }

    #[test]
    fn modes_are_exclusive() {
        assert!(parse(&["--build", "data", "--configure", "data"]).is_err());
        assert!(parse(&["--list-exporters", "--build", "data"]).is_err());
    }

    #[test]
    fn json_format() {
        let cli = parse(&["--format", "json", "--list-exporters"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.mode().unwrap(), Mode::ListExporters);
    }

    #[cfg(unix)]
    #[test]
    fn engine_exit_code_is_kept() {
        use std::os::unix::process::ExitStatusExt;

        assert_eq!(exit_code(ExitStatus::from_raw(0)), 0);
        assert_eq!(exit_code(ExitStatus::from_raw(2 << 8)), 2);
        // Killed by a signal
        assert_eq!(exit_code(ExitStatus::from_raw(9)), 1);
    }
}
