//! utgen - AI-driven unit test generation
//!
//! The `utgen run <testDir>` command finds every exported TypeScript
//! function, binding and class method under `testDir`, asks a model for Jest
//! tests, runs them and feeds failures back until they pass or the attempt
//! budget is spent.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn, Level};
use utgen_ai::{AiProvider, ProviderConfig, SessionConfig};
use utgen_analyzer::TypeScriptAnalyzer;
use utgen_core::{
    render_run_summary, write_run_report_json, ExhaustionPolicy, FatalPolicy, Language,
    LoopConfig, Orchestrator, RunReport, TestRunner,
};
use utgen_runner::{JestConfig, JestRunner};

#[derive(Parser)]
#[command(name = "utgen")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Generate passing Jest unit tests for exported TypeScript units", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate tests for every exported unit under a directory (or in one file)
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Directory to scan, or a single source file
    #[arg(value_name = "testDir")]
    test_dir: PathBuf,

    /// Attempt budget per unit
    #[arg(long = "maxTries", default_value_t = 5, value_parser = clap::value_parser!(u32).range(1..))]
    max_tries: u32,

    /// Model identifier (default depends on --ai)
    #[arg(long)]
    model: Option<String>,

    /// AI provider: chatgpt or claude
    #[arg(long, default_value = "claude")]
    ai: String,

    /// Directory Jest runs from
    #[arg(long = "rootDir", default_value = "./")]
    root_dir: PathBuf,

    /// Source language
    #[arg(long, default_value = "typescript")]
    language: String,

    /// Pause after every attempt, in milliseconds
    #[arg(long, default_value_t = 1000)]
    sleep: u64,

    /// Export every top-level declaration before analysis (rewrites files)
    #[arg(long)]
    export: bool,

    /// Limit for each provider call and test run, in seconds
    #[arg(long = "attemptTimeout", default_value_t = 300, value_parser = clap::value_parser!(u64).range(1..))]
    attempt_timeout: u64,

    /// Limit for the whole run, in seconds
    #[arg(long = "runTimeout")]
    run_timeout: Option<u64>,

    /// Skip feedback for the failing attempt that spends the budget
    #[arg(long = "checkBeforeFeedback")]
    check_before_feedback: bool,

    /// Keep going when a unit cannot start or generate its first candidate
    #[arg(long = "continueOnError")]
    continue_on_error: bool,

    /// Middle part of generated test file names
    #[arg(long = "testSuffix", default_value = "ut.test")]
    test_suffix: String,

    /// Write the run report as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Provider API base URL (proxies, local gateways)
    #[arg(long = "baseUrl")]
    base_url: Option<String>,

    /// Provider API key
    #[arg(long = "apiKey", env = "UTGEN_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

impl RunArgs {
    fn loop_config(&self, language: Language) -> LoopConfig {
        LoopConfig {
            max_attempts: self.max_tries,
            attempt_delay_ms: self.sleep,
            attempt_timeout_ms: Some(self.attempt_timeout.saturating_mul(1_000)),
            run_timeout_ms: self.run_timeout.map(|secs| secs.saturating_mul(1_000)),
            exhaustion_policy: if self.check_before_feedback {
                ExhaustionPolicy::CheckBeforeFeedback
            } else {
                ExhaustionPolicy::FeedbackThenCheck
            },
            fatal_policy: if self.continue_on_error {
                FatalPolicy::SkipUnit
            } else {
                FatalPolicy::Abort
            },
            test_suffix: self.test_suffix.clone(),
            root_dir: self.root_dir.clone(),
            language,
            export_all: self.export,
        }
    }

    fn jest_config(&self) -> JestConfig {
        JestConfig {
            timeout: Duration::from_secs(self.attempt_timeout),
            ..JestConfig::default()
        }
    }

    fn api_key(&self) -> Result<String> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("UTGEN_API_KEY is not set"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    utgen_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run(args) => {
            let runner = Arc::new(JestRunner::new(args.jest_config()));
            tokio::select! {
                result = cmd_run(args, runner.clone()) => result,
                _ = tokio::signal::ctrl_c() => {
                    warn!("interrupted");
                    release_runner(runner.as_ref()).await;
                    std::process::exit(0);
                }
            }
        }
    }
}

/// Remove the runner's scratch space before an early exit.
async fn release_runner(runner: &dyn TestRunner) {
    if let Err(e) = runner.cleanup().await {
        warn!(error = %e, "failed to clean up test runner scratch space");
    }
}

async fn cmd_run(args: RunArgs, runner: Arc<JestRunner>) -> Result<()> {
    let api_key = args.api_key()?;
    let provider: AiProvider = args.ai.parse()?;
    let language: Language = args.language.parse()?;
    let model = args
        .model
        .clone()
        .unwrap_or_else(|| provider.default_model().to_string());

    let mut provider_config = ProviderConfig::new(api_key, model.clone())
        .with_timeout(Duration::from_secs(args.attempt_timeout));
    if let Some(base_url) = &args.base_url {
        provider_config = provider_config.with_base_url(base_url.clone());
    }
    let client = provider
        .build_client(provider_config, SessionConfig::default())
        .context("Failed to configure AI provider")?;

    let analyzer = Arc::new(TypeScriptAnalyzer::new());
    let orchestrator = Orchestrator::new(analyzer, client, runner, args.loop_config(language))
        .context("Invalid configuration")?;

    info!(
        target_dir = %args.test_dir.display(),
        ai = %provider,
        model = %model,
        max_tries = args.max_tries,
        "starting test generation"
    );

    let mut report = RunReport::new();
    let result = orchestrator.run_into(&args.test_dir, &mut report).await;

    print!("{}", render_run_summary(&report));
    if let Some(path) = &args.report {
        write_run_report_json(path, &report)?;
        println!("Report written to {}", path.display());
    }

    result.context("Test generation aborted")
}
