//! Docforge - requirements in, business and technical documents out.
//!
//! Runs the six-stage document pipeline over a requirements text, or refines
//! one stage of a previous build with feedback.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use docforge::store::LOGS_DIR;
use docforge::{BuildResult, Config, Orchestrator, Stage};

const RULE: &str = "============================================================";

/// Automated business analysis and documentation generation
#[derive(Parser)]
#[command(name = "docforge")]
#[command(author, about, long_about = None)]
#[command(disable_version_flag = true)]
struct Cli {
    /// Project requirements (text or path to a file)
    requirements: String,

    /// Path to a configuration file (TOML or YAML)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Additional context (JSON, plain text, or path to a file)
    #[arg(long)]
    context: Option<String>,

    /// Output version label
    #[arg(long = "version", value_name = "VERSION")]
    output_version: Option<String>,

    /// Custom output directory
    #[arg(short, long = "output-dir", visible_alias = "output", value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Feedback for refinement (text or path to a file); repeat for several rounds
    #[arg(long, requires = "refine")]
    feedback: Vec<String>,

    /// Stage to refine with the feedback
    #[arg(long, value_enum, requires = "feedback")]
    refine: Option<RefineTarget>,

    /// Generate a detailed specification for each planned feature
    #[arg(long)]
    detailed_features: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum RefineTarget {
    Documents,
    Analysis,
    Architecture,
    Features,
}

impl From<RefineTarget> for Stage {
    fn from(target: RefineTarget) -> Self {
        match target {
            RefineTarget::Documents => Self::Documents,
            RefineTarget::Analysis => Self::Analysis,
            RefineTarget::Architecture => Self::Architecture,
            RefineTarget::Features => Self::Features,
        }
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::load()?,
    };
    if let Some(version) = &cli.output_version {
        config.output.current_version = version.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.output.base_path = validate_output_dir(dir)
            .with_context(|| format!("Cannot use output directory '{}'", dir.display()))?;
    }

    init_logging(cli.verbose, &config.output.log_level, &config.output_path().join(LOGS_DIR))?;

    let requirements = load_text_input(&cli.requirements)?;
    let context = match &cli.context {
        Some(input) => parse_context(&load_text_input(input)?),
        None => serde_json::json!({}),
    };

    tracing::info!(
        version = %config.output.current_version,
        provider = %config.llm.provider,
        model = %config.llm.model_name,
        "Starting docforge"
    );

    let output_path = config.output_path();
    let mut orchestrator = Orchestrator::from_config(config)?.with_detailed_features(cli.detailed_features);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        match cli.refine {
            Some(target) => {
                let feedback =
                    cli.feedback.iter().map(|f| load_text_input(f)).collect::<Result<Vec<_>>>()?;
                let outcome = orchestrator.refine_with_feedback(&feedback, target.into()).await?;

                let status = if outcome.is_successful() { "completed" } else { "failed" };
                println!("Refinement completed: {status}");
                for file in &outcome.files {
                    println!("  - {}", file.display());
                }
            }
            None => {
                let build = orchestrator.build_project(&requirements, context).await?;
                print_summary(&build, &output_path, cli.detailed_features);
            }
        }
        Ok::<_, anyhow::Error>(())
    })
}

/// Install stderr logging plus a plain-text `app.log` under `logs_dir`.
fn init_logging(verbose: bool, level: &str, logs_dir: &Path) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    fs::create_dir_all(logs_dir)
        .with_context(|| format!("Failed to create log directory {}", logs_dir.display()))?;
    let log_file = OpenOptions::new().create(true).append(true).open(logs_dir.join("app.log"))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(Arc::new(log_file)))
        .init();

    Ok(())
}

/// Create the directory and check that files can be written in it.
fn validate_output_dir(dir: &Path) -> Result<PathBuf> {
    let expanded = shellexpand::tilde(&dir.to_string_lossy()).into_owned();
    let dir = PathBuf::from(expanded);

    fs::create_dir_all(&dir)?;
    let marker = dir.join(".write_test");
    fs::write(&marker, b"")?;
    fs::remove_file(&marker)?;

    Ok(dir.canonicalize()?)
}

/// Text given inline, or the contents of the file it names.
fn load_text_input(input: &str) -> Result<String> {
    let path = Path::new(input);
    if path.is_file() {
        return fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()));
    }
    Ok(input.to_string())
}

/// JSON context, or free text wrapped as `additional_info`.
fn parse_context(text: &str) -> serde_json::Value {
    serde_json::from_str(text).unwrap_or_else(|_| serde_json::json!({ "additional_info": text }))
}

fn print_summary(build: &BuildResult, output_path: &Path, detailed_features: bool) {
    println!("\n{RULE}");
    println!("DOCFORGE - BUILD COMPLETED");
    println!("{RULE}");
    println!("Version: {}", build.version);
    println!("Output directory: {}", output_path.display());

    println!("\nBuild Summary:");
    print!("{}", build.to_summary_string());

    let files: Vec<_> = build.files().collect();
    println!("\nGenerated Files ({}):", files.len());
    for file in files {
        println!("  - {}", file.display());
    }

    if detailed_features {
        if let Some(features) = build.stage(Stage::Features) {
            println!("\nDetailed feature specifications generated: {}", features.details.len());
            for (feature, detail) in &features.details {
                match detail.artifact.error() {
                    Some(error) => println!("  - {feature}: error: {error}"),
                    None => println!("  - {feature}: {}", detail.relative_path()),
                }
            }
        }
    }

    println!("\n{RULE}");
}
