//! Thin CLI shell (spec §10.5): discovers workflow files under the given
//! paths, runs the orchestrator, and renders the result.
//!
//! Grounded on the teacher's `main.rs` acting as a thin driver around its own
//! core engine; the CLI surface itself is peripheral per spec §1 ("out of
//! scope: command-line argument handling"), so this stays minimal.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anstream::eprintln;
use clap::{Parser, ValueEnum};
use clap_verbosity_flag::InfoLevel;
use regex::Regex;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt as _, util::SubscriberInitExt as _};

use sisakulint::orchestrator;
use sisakulint::output;

/// Finds security and correctness issues in GitHub Actions workflow YAML.
#[derive(Parser)]
#[command(about, version)]
struct App {
    /// Workflow files or directories to analyze.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// The output format to emit.
    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,

    /// A regex; any diagnostic whose message matches is dropped from the
    /// report.
    #[arg(long = "ignore")]
    ignore_patterns: Vec<String>,

    #[command(flatten)]
    verbose: clap_verbosity_flag::Verbosity<InfoLevel>,
}

#[derive(Debug, Default, Copy, Clone, ValueEnum)]
enum OutputFormat {
    #[default]
    Plain,
    Sarif,
}

fn main() -> ExitCode {
    let app = App::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(app.verbose.tracing_level_filter().into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let ignore_patterns = match compile_ignore_patterns(&app.ignore_patterns) {
        Ok(patterns) => patterns,
        Err(err) => {
            eprintln!("error: invalid --ignore pattern: {err}");
            return ExitCode::from(2);
        }
    };

    let files = match collect_workflow_files(&app.inputs) {
        Ok(files) => files,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(2);
        }
    };

    let result = orchestrator::run(&files, None, &ignore_patterns);

    match app.format {
        OutputFormat::Plain => output::plain::render(&result.diagnostics),
        OutputFormat::Sarif => {
            let sarif = output::sarif::build(&result.diagnostics);
            match serde_json::to_writer_pretty(std::io::stdout(), &sarif) {
                Ok(()) => {}
                Err(err) => {
                    eprintln!("error: failed to emit SARIF: {err}");
                    return ExitCode::from(3);
                }
            }
        }
    }

    for (filepath, message) in &result.fatal {
        eprintln!("fatal: {filepath}: {message}");
    }

    if result.has_fatal() {
        ExitCode::from(3)
    } else if result.has_findings() {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}

fn compile_ignore_patterns(raw: &[String]) -> Result<Vec<Regex>, regex::Error> {
    raw.iter().map(|p| Regex::new(p)).collect()
}

/// Expands `inputs` into a flat list of workflow YAML files: directories are
/// walked (honoring `.gitignore`, per spec §6's project layout), individual
/// files are taken as-is.
fn collect_workflow_files(inputs: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in ignore::Walk::new(input) {
                let entry = entry?;
                if is_workflow_file(entry.path()) {
                    files.push(entry.into_path());
                }
            }
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

fn is_workflow_file(path: &Path) -> bool {
    path.is_file() && matches!(path.extension().and_then(|e| e.to_str()), Some("yml" | "yaml"))
}
