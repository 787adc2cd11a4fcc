//! Sondeo - synthetic user research engine
//!
//! Sondeo turns a study definition (product context, research brief, and a
//! persona population) into a fully persisted research run:
//!
//! 1. [`population`] expands the population spec into concrete respondent
//!    descriptors.
//! 2. [`planner`] builds a deterministic questionnaire or interview plan
//!    from the research brief.
//! 3. [`engine`] replays the plan for every respondent against an LLM
//!    backend ([`llm`]), synthesizes an aggregate report, and persists
//!    every artifact through [`storage`].
//!
//! The engine can run blocking or as a lazy stream of
//! [`ProgressEvent`]s with cooperative cancellation; [`jobs`] adds a
//! cursor-based registry for runs driven in the background.

pub mod cli;
pub mod config;
pub mod engine;
pub mod jobs;
pub mod llm;
pub mod planner;
pub mod population;
pub mod prompts;
pub mod respondent;
pub mod storage;
pub mod types;

pub use config::StudyConfig;
pub use engine::{progress_fraction, CancellationToken, ResearchOrchestrator};
pub use jobs::{JobStatus, JobStore};
pub use llm::{ConfigGatewayFactory, Gateway, GatewayConfig, GatewayFactory};
pub use planner::{build_plan, PlanStep, ResearchPlan, ResearchStyle};
pub use population::PopulationSpec;
pub use prompts::PromptSet;
pub use storage::ArtifactStore;
pub use types::{AppError, FinalReport, ProgressEvent, Result};
