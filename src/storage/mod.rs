//! Artifact Store
//!
//! Run-scoped, write-only JSON persistence. Every run owns one directory
//! under the store root and the engine is its only writer:
//!
//! ```text
//! <root>/<run_id>/
//!   configs/product.json
//!   configs/research.json
//!   configs/respondents.json
//!   plan.json
//!   respondents/respondent_01.json ...
//!   analysis.json
//! ```
//!
//! Files are pretty-printed and written in pipeline order, so a partially
//! populated run directory is always a readable record of how far the run
//! got before it stopped.

use crate::planner::ResearchPlan;
use crate::types::{
    FinalReport, ProductContext, RespondentArtifact, RespondentDescriptor, ResearchContext, Result,
};
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// New run identifier: local timestamp plus a random alphanumeric suffix,
/// e.g. `20250312_143059_x7Kq2m`. The suffix keeps runs started within the
/// same second from colliding.
pub fn new_run_id() -> String {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!("{stamp}_{suffix}")
}

/// Per-respondent artifact file name; `index` is 1-based.
pub fn respondent_file_name(index: usize) -> String {
    format!("respondent_{index:02}.json")
}

/// Root of all persisted runs.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory for a new run and return its write handle.
    pub fn open_run(&self, run_id: &str) -> Result<RunStore> {
        let dir = self.root.join(run_id);
        fs::create_dir_all(dir.join("configs"))?;
        fs::create_dir_all(dir.join("respondents"))?;
        Ok(RunStore {
            run_id: run_id.to_string(),
            dir,
        })
    }
}

/// Write handle for one run directory.
#[derive(Debug)]
pub struct RunStore {
    run_id: String,
    dir: PathBuf,
}

impl RunStore {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save_product(&self, product: &ProductContext) -> Result<()> {
        self.save_json(Path::new("configs").join("product.json"), product)
    }

    pub fn save_research(&self, research: &ResearchContext) -> Result<()> {
        self.save_json(Path::new("configs").join("research.json"), research)
    }

    /// Persist the effective (already expanded) respondent list.
    pub fn save_respondents(&self, respondents: &[RespondentDescriptor]) -> Result<()> {
        self.save_json(Path::new("configs").join("respondents.json"), &respondents)
    }

    pub fn save_plan(&self, plan: &ResearchPlan) -> Result<()> {
        self.save_json(PathBuf::from("plan.json"), plan)
    }

    /// Persist one respondent artifact; `index` is 1-based. Returns the
    /// artifact file name for the report index.
    pub fn save_respondent_artifact(
        &self,
        index: usize,
        artifact: &RespondentArtifact,
    ) -> Result<String> {
        let name = respondent_file_name(index);
        self.save_json(Path::new("respondents").join(&name), artifact)?;
        Ok(name)
    }

    pub fn save_report(&self, report: &FinalReport) -> Result<()> {
        self.save_json(PathBuf::from("analysis.json"), report)
    }

    fn save_json<T: Serialize>(&self, relative: impl AsRef<Path>, value: &T) -> Result<()> {
        let path = self.dir.join(relative.as_ref());
        let json = serde_json::to_vec_pretty(value)?;
        fs::write(&path, json)?;
        tracing::debug!(path = %path.display(), "artifact written");
        Ok(())
    }
}
