//! lessonforge CLI
//!
//! Generates a validated lesson from an outline, enriches it with media and
//! writes the result under the output directory.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use forge_pipeline::{
    extract_asset_prompts, ConcurrentAssetSynthesizer, Config, ContentRequest, ControllerSettings,
    FsGateway, OpenAiAssetGenerator, OpenAiContentGenerator, Pipeline, PipelineReport,
    RequestStatus, RetryFeedbackController,
};
use forge_schema::{SchemaValidator, ValidationResult};
use tracing_subscriber::EnvFilter;

/// lessonforge - validated lesson generation
///
/// Asks a language model for a typed lesson document, checks it against the
/// lesson schema, feeds errors back until it passes, then generates the
/// images and diagrams the lesson asks for.
#[derive(Parser, Debug)]
#[command(name = "lessonforge")]
#[command(version, about, long_about = None)]
struct Args {
    /// Topic outline for the lesson
    #[arg(value_name = "OUTLINE", conflicts_with = "outline_file")]
    outline: Option<String>,

    /// Read the outline from a file
    #[arg(long, value_name = "FILE")]
    outline_file: Option<PathBuf>,

    /// Path to configuration file (default: forge.json in current directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Output directory for generated lessons
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<String>,

    /// Override the maximum number of generation attempts
    #[arg(long, value_name = "N")]
    max_attempts: Option<u32>,

    /// Request identifier (default: derived from the current time)
    #[arg(long, value_name = "ID")]
    id: Option<String>,

    /// Validate a candidate file and print its diagnostics, without generating
    #[arg(long, value_name = "FILE", conflicts_with_all = ["outline", "outline_file"])]
    check: Option<PathBuf>,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match args.check.clone() {
        Some(path) => check_candidate(&path),
        None => generate_lesson(args).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Validates one candidate file and prints the verdict.
fn check_candidate(path: &Path) -> anyhow::Result<ExitCode> {
    let bytes = std::fs::read(path).map_err(|e| {
        anyhow::anyhow!("Failed to read candidate: {e}\n\nPath: {}", path.display())
    })?;

    match SchemaValidator::new().validate_bytes(&bytes) {
        ValidationResult::Valid(document) => {
            let prompts = extract_asset_prompts(&document);
            println!("Valid lesson: {}", document.title);
            let [explanations, quizzes, code, images] = document.kind_counts();
            println!(
                "  Blocks: {} ({explanations} explanation, {quizzes} quiz, {code} code, {images} image)",
                document.blocks.len()
            );
            println!("  Asset directives: {}", prompts.len());
            Ok(ExitCode::SUCCESS)
        }
        ValidationResult::Invalid(diagnostics) => {
            println!("Invalid candidate ({} errors):", diagnostics.len());
            for diagnostic in &diagnostics {
                println!("  {diagnostic}");
            }
            Ok(ExitCode::from(1))
        }
    }
}

/// Runs the full pipeline for one outline.
async fn generate_lesson(args: Args) -> anyhow::Result<ExitCode> {
    let mut config = load_config(args.config.as_deref())?;

    if let Some(ref output_dir) = args.output_dir {
        config.output_dir.clone_from(output_dir);
    }
    if let Some(max_attempts) = args.max_attempts {
        config.generation.max_attempts = max_attempts;
    }
    config.validate()?;

    let outline = read_outline(&args)?;
    if !args.json {
        print_config(&config);
    }

    let content_generator = OpenAiContentGenerator::from_config(&config)?;
    let asset_generator = OpenAiAssetGenerator::new(&config.assets, config.api_key()?)?;

    let controller = RetryFeedbackController::new(
        content_generator,
        SchemaValidator::new(),
        ControllerSettings::from(&config.generation),
    );
    let synthesizer = ConcurrentAssetSynthesizer::from_config(asset_generator, &config.assets);
    let gateway = FsGateway::new(&config.output_dir);
    let pipeline = Pipeline::new(controller, synthesizer, gateway)
        .with_persistence_config(&config.persistence);

    let mut request = match args.id {
        Some(id) => ContentRequest::new(id, outline),
        None => ContentRequest::with_generated_id(outline),
    };
    tracing::info!(request_id = %request.id, "Starting lesson generation");

    let report = pipeline.run(&mut request).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report, &request, pipeline.gateway());
    }

    Ok(match report.status {
        RequestStatus::Complete | RequestStatus::Degraded => ExitCode::SUCCESS,
        _ => ExitCode::from(1),
    })
}

/// Loads configuration from the specified path or default location.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

/// Resolves the outline from the positional argument or `--outline-file`.
fn read_outline(args: &Args) -> anyhow::Result<String> {
    let outline = match (&args.outline, &args.outline_file) {
        (Some(outline), _) => outline.clone(),
        (None, Some(path)) => std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read outline: {e}\n\nPath: {}", path.display())
        })?,
        (None, None) => anyhow::bail!(
            "No outline given\n\nSuggestion: Pass the outline as an argument or use --outline-file"
        ),
    };

    let outline = outline.trim().to_string();
    if outline.is_empty() {
        anyhow::bail!("Outline is empty");
    }
    Ok(outline)
}

/// Prints the loaded configuration.
fn print_config(config: &Config) {
    println!("Configuration loaded:");
    println!("  Output directory: {}", config.output_dir);
    println!("  Content model: {}", config.generation.model);
    println!("  Asset model: {}", config.assets.model);
    println!("  Max attempts: {}", config.generation.max_attempts);
    println!("  Session deadline: {}s", config.generation.session_deadline_secs);
    println!("  Status write timeout: {}s", config.persistence.call_timeout_secs);
}

/// Prints a summary of the run.
fn print_summary(report: &PipelineReport, request: &ContentRequest, gateway: &FsGateway) {
    println!();
    println!("=== lessonforge Summary ===");
    println!("Request: {}", report.request_id);
    println!("Status: {}", report.status);
    println!("Attempts: {}", report.attempts);

    if let Some(reason) = report.failure {
        println!("Failure: {reason}");
        if let Some(ref message) = report.failure_message {
            println!("  {message}");
        }
        for diagnostic in &request.diagnostics {
            println!("  {diagnostic}");
        }
        if let Some(ref suggestion) = report.failure_suggestion {
            println!("Suggestion: {suggestion}");
        }
    } else {
        println!(
            "Assets: {} generated, {} failed ({} requested)",
            report.assets_generated, report.asset_failures, report.asset_prompts
        );
    }

    let elapsed = request.elapsed();
    println!(
        "Duration: {}m {}s",
        elapsed.num_minutes(),
        elapsed.num_seconds() % 60
    );
    if request.status.has_document() {
        println!("Output: {}", gateway.request_dir(&report.request_id).display());
    }
}
