//! CLI for sondeo
//!
//! Argument parsing with clap and the three command handlers: `init`
//! scaffolds a sample study file, `check` probes the configured LLM
//! backend, and `run` executes a study while rendering the progress event
//! stream.

pub mod output;

use crate::config::{StudyConfig, SAMPLE_STUDY};
use crate::engine::{progress_fraction, CancellationToken, ResearchOrchestrator};
use crate::llm::{ConfigGatewayFactory, GatewayFactory};
use crate::planner::build_plan;
use crate::storage::ArtifactStore;
use crate::types::{AppError, ProgressEvent, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use output::Output;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// sondeo - synthetic user research engine
#[derive(Parser, Debug)]
#[command(
    name = "sondeo",
    version,
    about = "Synthetic user research: expand a persona population, run a questionnaire or interview plan against an LLM, and synthesize a report",
    after_help = "EXAMPLES:\n    \
                  sondeo init                   # Scaffold a sample study.toml\n    \
                  sondeo check                  # Probe the configured LLM backend\n    \
                  sondeo run                    # Execute the study in study.toml\n    \
                  sondeo run -s panel.toml      # Execute a specific study file"
)]
pub struct Cli {
    /// Path to the study file
    #[arg(short, long, default_value = "study.toml", global = true)]
    pub study: PathBuf,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a sample study file to get started
    Init {
        /// Where to write the file
        #[arg(default_value = "study.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Probe the configured LLM backend
    Check,
    /// Execute the study and print progress
    Run,
}

/// Dispatch a parsed command line.
pub async fn execute(cli: Cli) -> Result<()> {
    let out = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    match cli.command {
        Commands::Init { path, force } => init(&path, force, &out),
        Commands::Check => check(&cli.study, &out).await,
        Commands::Run => run(&cli.study, &out).await,
    }
}

fn init(path: &Path, force: bool, out: &Output) -> Result<()> {
    if path.exists() && !force {
        return Err(AppError::Configuration(format!(
            "'{}' already exists (use --force to overwrite)",
            path.display()
        )));
    }
    std::fs::write(path, SAMPLE_STUDY)?;
    out.success(&format!("sample study written to {}", path.display()));
    out.info("edit it, then run: sondeo check && sondeo run");
    Ok(())
}

async fn check(study: &Path, out: &Output) -> Result<()> {
    let config = StudyConfig::load(study)?;
    let factory = ConfigGatewayFactory::new(config.llm)?;
    let gateway = factory.create()?;

    out.info(&format!("probing {} backend...", gateway.provider_name()));
    let status = gateway.check_connection().await;
    if status.is_connected() {
        out.success(&status.message);
        Ok(())
    } else {
        Err(AppError::Provider(status.message))
    }
}

async fn run(study: &Path, out: &Output) -> Result<()> {
    let config = StudyConfig::load(study)?;
    let style = config.style()?;
    let respondents = config.population.expand();
    let plan = build_plan(&config.research.description, style, &config.research.questions);
    let factory = Arc::new(ConfigGatewayFactory::new(config.llm.clone())?);
    let store = ArtifactStore::new(&config.storage.root);

    let orchestrator = ResearchOrchestrator::new(
        respondents.clone(),
        config.product,
        config.research,
        plan,
        config.prompts,
        factory,
        store,
    );
    let run_id = orchestrator.run_id().to_string();
    out.info(&format!(
        "run {run_id}: {} respondent(s), style {style:?}",
        respondents.len()
    ));

    let stream = orchestrator.run_streaming(CancellationToken::new());
    futures::pin_mut!(stream);
    let mut failed = None;
    while let Some(event) = stream.next().await {
        render_event(&event, out);
        if let ProgressEvent::Error { message } = event {
            failed = Some(message);
        }
    }

    out.info(&format!(
        "artifacts in {}",
        config.storage.root.join(&run_id).display()
    ));
    match failed {
        Some(message) => Err(AppError::Internal(message)),
        None => Ok(()),
    }
}

fn render_event(event: &ProgressEvent, out: &Output) {
    match event {
        ProgressEvent::PlanSaved { message, .. } => out.info(message),
        ProgressEvent::RespondentStart { i, n, message, .. } => {
            out.progress(progress_fraction(*i, *n, 0), message)
        }
        ProgressEvent::ProfileDone { i, n, message } => {
            out.progress(progress_fraction(*i, *n, 1), message)
        }
        ProgressEvent::StepStart { message, .. } => out.info(message),
        ProgressEvent::StepDone { message, .. } => out.success(message),
        ProgressEvent::RespondentDone { i, n, message, .. } => {
            out.progress(progress_fraction(*i, *n, 2), message)
        }
        ProgressEvent::SynthesisStart { message } | ProgressEvent::SynthesisDone { message } => {
            out.info(message)
        }
        ProgressEvent::Done { result, message } => {
            out.success(message);
            out.success(&format!("report ready: {}", result.run_id));
        }
        ProgressEvent::Cancelled { message } => out.warning(message),
        ProgressEvent::Error { message } => out.error(message),
    }
}
