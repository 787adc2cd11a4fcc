//! Core types for the research pipeline: respondent descriptors, plans,
//! artifacts, progress events, and the crate-wide error type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============= Respondent Types =============

/// Gender assigned to a respondent by the demographic pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    /// Male respondent.
    Male,
    /// Female respondent.
    Female,
}

/// Archetype label used for respondents that carry no explicit archetype.
pub const CUSTOM_ARCHETYPE: &str = "Personalizado";

/// One row of the effective population: the basic profile a synthetic
/// respondent is instantiated from.
///
/// `behavior`, `needs` and `barriers` default to the empty string and are
/// never null; `age` and `gender` are only present when a demographic pass
/// assigned them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RespondentDescriptor {
    /// Named archetype this respondent was instantiated from.
    #[serde(default = "default_archetype")]
    pub archetype: String,
    /// Typical behavior dimension.
    #[serde(default)]
    pub behavior: String,
    /// Needs dimension.
    #[serde(default)]
    pub needs: String,
    /// Adoption barriers dimension.
    #[serde(default)]
    pub barriers: String,
    /// Age in years, when demographics are configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    /// Gender, when demographics are configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
}

fn default_archetype() -> String {
    CUSTOM_ARCHETYPE.to_string()
}

impl Default for RespondentDescriptor {
    fn default() -> Self {
        Self {
            archetype: default_archetype(),
            behavior: String::new(),
            needs: String::new(),
            barriers: String::new(),
            age: None,
            gender: None,
        }
    }
}

// ============= Research Context Types =============

/// Product under investigation, carried into every prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductContext {
    /// Product name.
    #[serde(default)]
    pub name: String,
    /// Free-form product description.
    #[serde(default)]
    pub description: String,
}

/// Research brief: what the study is about and which questions matter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchContext {
    /// Free-text description of the research situation.
    #[serde(default)]
    pub description: String,
    /// Research objective.
    #[serde(default)]
    pub objective: String,
    /// Explicit questions, one per line (may be empty).
    #[serde(default)]
    pub questions: String,
    /// Requested style label ("questionnaire" / "interview"), if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

impl ResearchContext {
    /// A study with no description, objective or questions at all cannot
    /// produce a meaningful plan or synthesis.
    pub fn is_empty(&self) -> bool {
        self.description.trim().is_empty()
            && self.objective.trim().is_empty()
            && self.questions.trim().is_empty()
    }
}

// ============= Step Result & Artifact Types =============

/// Output of one executed plan step, tagged by step kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepResult {
    /// Raw answers text from a batched questionnaire call.
    Questionnaire {
        /// The questions that were asked (non-blank only).
        questions: Vec<String>,
        /// Raw model output; empty when the step had no questions.
        answers: String,
    },
    /// Raw transcript text from a single-call interview.
    Interview {
        /// Number of interviewer questions requested.
        question_count: usize,
        /// Raw model output with questions and answers interleaved.
        transcript: String,
    },
}

impl StepResult {
    /// Step-kind label used in events and synthesis headings.
    pub fn kind(&self) -> &'static str {
        match self {
            StepResult::Questionnaire { .. } => "questionnaire",
            StepResult::Interview { .. } => "interview",
        }
    }
}

/// Everything recorded for one respondent in one run. Persisted exactly
/// once, at respondent completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RespondentArtifact {
    /// ISO timestamp of the run this artifact belongs to.
    pub timestamp: DateTime<Utc>,
    /// Artifact file name, e.g. `respondent_03.json`.
    pub respondent_id: String,
    /// The descriptor this respondent was expanded from.
    pub basic_profile: RespondentDescriptor,
    /// Display name derived from the archetype.
    pub generated_name: String,
    /// LLM-generated detailed profile text.
    pub generated_profile_text: String,
    /// Results of every executed plan step, in plan order.
    pub step_results: Vec<StepResult>,
}

// ============= Final Report Types =============

/// Who the study was about: one descriptor, or a population summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SubjectSummary {
    /// A single-respondent study carries the respondent's basic profile.
    Single {
        /// Basic profile of the sole respondent.
        profile: RespondentDescriptor,
    },
    /// A population study carries a human-readable mix label.
    Population {
        /// Label such as `5 respondientes (Escéptico x3, Personalizado x2)`.
        label: String,
        /// Number of respondents in the run.
        respondent_count: usize,
    },
}

/// Index entry pointing at one persisted respondent artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RespondentRef {
    /// Artifact file name under `respondents/`.
    pub artifact_id: String,
    /// Archetype label, for quick scanning without opening the artifact.
    pub archetype: String,
}

/// Terminal artifact of a run: the synthesized report plus everything a
/// results browser needs to locate the per-respondent artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalReport {
    /// ISO timestamp of the run.
    pub timestamp: DateTime<Utc>,
    /// Run identifier; also the name of the run's artifact directory.
    pub run_id: String,
    /// Single respondent profile or population summary.
    pub subject_summary: SubjectSummary,
    /// Product context the study ran against.
    pub product: ProductContext,
    /// Research brief the study ran against.
    pub research: ResearchContext,
    /// The synthesized report text.
    pub synthesis_text: String,
    /// The plan that was replayed for every respondent.
    pub plan: crate::planner::ResearchPlan,
    /// One entry per respondent artifact, in execution order.
    pub respondent_index: Vec<RespondentRef>,
}

// ============= Progress Events =============

/// One progress event in the streaming run mode.
///
/// The sequence is lazy, ordered and finite, and terminates with exactly
/// one of [`ProgressEvent::Done`], [`ProgressEvent::Cancelled`] or
/// [`ProgressEvent::Error`]. Respondent- and step-scoped events carry the
/// 1-based respondent index `i` and the total count `n` so consumers can
/// compute deterministic progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Input configs and the plan were persisted.
    PlanSaved {
        /// Plan artifact file name.
        plan_id: String,
        /// Human-readable status line.
        message: String,
    },
    /// Work on respondent `i` of `n` is starting.
    RespondentStart {
        /// 1-based respondent index.
        i: usize,
        /// Total respondent count.
        n: usize,
        /// Archetype of this respondent.
        archetype: String,
        /// Human-readable status line.
        message: String,
    },
    /// The respondent's detailed profile was generated.
    ProfileDone {
        /// 1-based respondent index.
        i: usize,
        /// Total respondent count.
        n: usize,
        /// Human-readable status line.
        message: String,
    },
    /// A plan step is about to execute for respondent `i`.
    StepStart {
        /// 1-based respondent index.
        i: usize,
        /// Total respondent count.
        n: usize,
        /// Step kind label ("questionnaire" / "interview").
        step_type: String,
        /// Human-readable status line.
        message: String,
    },
    /// A plan step finished for respondent `i`.
    StepDone {
        /// 1-based respondent index.
        i: usize,
        /// Total respondent count.
        n: usize,
        /// Step kind label ("questionnaire" / "interview").
        step_type: String,
        /// Human-readable status line.
        message: String,
    },
    /// The respondent's artifact was persisted.
    RespondentDone {
        /// 1-based respondent index.
        i: usize,
        /// Total respondent count.
        n: usize,
        /// Artifact file name under `respondents/`.
        respondent_id: String,
        /// Human-readable status line.
        message: String,
    },
    /// The aggregate synthesis call is starting.
    SynthesisStart {
        /// Human-readable status line.
        message: String,
    },
    /// The aggregate synthesis call finished.
    SynthesisDone {
        /// Human-readable status line.
        message: String,
    },
    /// Terminal: the run completed and the final report was persisted.
    Done {
        /// The final report, as also written to `analysis.json`.
        result: Box<FinalReport>,
        /// Human-readable status line.
        message: String,
    },
    /// Terminal: cancellation was observed at a loop boundary.
    Cancelled {
        /// Human-readable status line.
        message: String,
    },
    /// Terminal: the run failed; partial artifacts remain on disk.
    Error {
        /// Human-readable failure message (no internal detail).
        message: String,
    },
}

impl ProgressEvent {
    /// Whether this event terminates the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Done { .. }
                | ProgressEvent::Cancelled { .. }
                | ProgressEvent::Error { .. }
        )
    }

    /// The `event` discriminator as it appears in serialized form.
    pub fn name(&self) -> &'static str {
        match self {
            ProgressEvent::PlanSaved { .. } => "plan_saved",
            ProgressEvent::RespondentStart { .. } => "respondent_start",
            ProgressEvent::ProfileDone { .. } => "profile_done",
            ProgressEvent::StepStart { .. } => "step_start",
            ProgressEvent::StepDone { .. } => "step_done",
            ProgressEvent::RespondentDone { .. } => "respondent_done",
            ProgressEvent::SynthesisStart { .. } => "synthesis_start",
            ProgressEvent::SynthesisDone { .. } => "synthesis_done",
            ProgressEvent::Done { .. } => "done",
            ProgressEvent::Cancelled { .. } => "cancelled",
            ProgressEvent::Error { .. } => "error",
        }
    }
}

// ============= Error Types =============

/// Crate-wide error type.
///
/// The taxonomy is deliberately small: configuration problems are surfaced
/// before any LLM call and never retried; provider failures propagate as a
/// run-level error; validation covers malformed structural data.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Required input is missing or unresolvable (e.g. empty research
    /// brief, unknown plan style). Surfaced before any LLM call.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network, auth, rate-limit or malformed-response failure from an
    /// LLM provider backend.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Malformed respondent/plan/report structural data.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Artifact persistence failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Anything else.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Storage(e.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_defaults_are_never_null() {
        let d: RespondentDescriptor = serde_json::from_str("{}").unwrap();
        assert_eq!(d.archetype, CUSTOM_ARCHETYPE);
        assert_eq!(d.behavior, "");
        assert_eq!(d.needs, "");
        assert_eq!(d.barriers, "");
        assert!(d.age.is_none());
        assert!(d.gender.is_none());
    }

    #[test]
    fn step_result_serializes_with_type_tag() {
        let result = StepResult::Interview {
            question_count: 3,
            transcript: "P1: ...".to_string(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["type"], "interview");
        assert_eq!(json["question_count"], 3);
    }

    #[test]
    fn progress_event_tagging_matches_names() {
        let ev = ProgressEvent::StepStart {
            i: 2,
            n: 5,
            step_type: "interview".to_string(),
            message: "running".to_string(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], ev.name());
        assert_eq!(json["i"], 2);
        assert_eq!(json["n"], 5);
        assert!(!ev.is_terminal());

        let cancelled = ProgressEvent::Cancelled {
            message: "stop".to_string(),
        };
        assert!(cancelled.is_terminal());
    }

    #[test]
    fn empty_research_context_detected() {
        let ctx = ResearchContext {
            description: "  ".to_string(),
            ..Default::default()
        };
        assert!(ctx.is_empty());

        let ctx = ResearchContext {
            objective: "understand onboarding friction".to_string(),
            ..Default::default()
        };
        assert!(!ctx.is_empty());
    }
}
