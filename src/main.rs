//! Turnabout Eval CLI
//!
//! Grades model predictions for the contradiction-detection benchmark.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use turnabout_eval::{
    discover_case_ids, reports_to_csv, CaseFilter, ContextMode, EvalRunner, GoldCase,
    GradingProfile, Report, RunConfig,
};

#[derive(Parser)]
#[command(name = "turnabout-eval")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Grade one model/prompt run and write its report
    Evaluate {
        /// Model identifier (provider path segments allowed)
        #[arg(long)]
        model: String,

        /// Prompt-configuration identifier
        #[arg(long)]
        prompt: String,

        /// Transcript context variant the predictions used ('new' or 'day')
        #[arg(long)]
        context: Option<String>,

        /// Predictions were produced without evidence descriptions
        #[arg(long)]
        no_description: bool,

        /// Case selection: ALL, a case-id prefix, or a prefix with trailing +
        #[arg(long, default_value = "ALL")]
        case: String,

        /// Directory holding gold case files
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// Root of per-run prediction directories
        #[arg(long, default_value = "output")]
        output_root: PathBuf,

        /// Grading profile YAML (bucket counts etc.)
        #[arg(long)]
        profile: Option<PathBuf>,

        /// Report file path (defaults to report.json in the run directory)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Flatten report files into one CSV, one row per run
    Report {
        /// Report JSON files to flatten
        #[arg(long, required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,

        /// Output CSV file
        #[arg(long)]
        output: PathBuf,
    },

    /// Show gold-corpus statistics
    CaseStats {
        /// Directory holding gold case files
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if cli.verbose {
        tracing::info!("Verbose mode enabled");
    }

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Evaluate {
            model,
            prompt,
            context,
            no_description,
            case,
            data_dir,
            output_root,
            profile,
            output,
        } => {
            let context = context
                .map(|c| c.parse::<ContextMode>())
                .transpose()
                .context("Invalid --context value")?;
            let profile = match profile {
                Some(path) => GradingProfile::load(&path)
                    .with_context(|| format!("Failed to load profile {}", path.display()))?,
                None => GradingProfile::default(),
            };

            let config = RunConfig {
                model,
                prompt,
                context,
                no_description,
                case_filter: CaseFilter::parse(&case),
                data_dir,
                output_root,
                profile,
            };

            let report = EvalRunner::new(&config).run()?;

            let output = output.unwrap_or_else(|| config.output_dir().join("report.json"));
            if let Some(parent) = output.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&output, report.to_json()?)
                .with_context(|| format!("Failed to write {}", output.display()))?;

            print!("{}", report.to_text());
            println!("Report written to {}", output.display());
        }

        Commands::Report { inputs, output } => {
            let mut reports = Vec::with_capacity(inputs.len());
            for path in &inputs {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let report: Report = serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse {}", path.display()))?;
                reports.push(report);
            }

            std::fs::write(&output, reports_to_csv(&reports))
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Wrote {} run(s) to {}", reports.len(), output.display());
        }

        Commands::CaseStats { data_dir } => {
            let ids = discover_case_ids(&data_dir)?;

            let mut turns = 0usize;
            let mut sizes: Vec<usize> = Vec::new();
            for id in &ids {
                let case = GoldCase::load(data_dir.join(format!("{id}.json")))?;
                turns += case.len();
                sizes.extend(case.turns.iter().map(|t| t.action_space_size));
            }

            println!("Gold Corpus Statistics");
            println!("======================");
            println!("Path: {}", data_dir.display());
            println!("Cases: {}", ids.len());
            println!("Gradable turns: {turns}");
            if let (Some(min), Some(max)) = (sizes.iter().min(), sizes.iter().max()) {
                println!("Action-space size: {min}..{max}");
            }
        }
    }

    Ok(())
}
