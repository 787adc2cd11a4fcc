//! Plan Builder
//!
//! Converts a free-text research brief (plus a style selector and optional
//! explicit questions) into a [`ResearchPlan`]. Purely heuristic: given
//! identical input the output is identical — no randomness, no LLM calls.
//!
//! Question extraction runs in two modes. When explicit questions are
//! provided, every non-blank line is a candidate (lenient). Otherwise the
//! brief itself is scanned and a line only qualifies if it contains `?` or
//! is a bulleted/numbered line starting with a Spanish interrogative
//! (strict). Candidates are deduplicated case-insensitively, preserving
//! first-seen order.

use crate::types::{AppError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::LazyLock;

/// Default number of interviewer questions when none were extracted.
pub const DEFAULT_INTERVIEW_QUESTIONS: usize = 6;

/// Upper bound applied to interview question counts at prompt time.
pub const MAX_INTERVIEW_QUESTIONS: usize = 12;

static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s+(?P<text>.+?)\s*$").unwrap());

static INTERROGATIVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:que|como|cual|por que|donde|cuando)\b").unwrap());

// ============= Plan Types =============

/// Research style requested by the caller. Interview is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResearchStyle {
    /// One batched written questionnaire per respondent.
    Questionnaire,
    /// One single-call conversational interview per respondent.
    #[default]
    Interview,
}

impl FromStr for ResearchStyle {
    type Err = AppError;

    /// Accepts English and Spanish labels; the empty string resolves to
    /// the default interview style.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "questionnaire" | "cuestionario" | "survey" => Ok(ResearchStyle::Questionnaire),
            "interview" | "entrevista" | "" => Ok(ResearchStyle::Interview),
            other => Err(AppError::Configuration(format!(
                "unknown research style '{other}' (expected 'questionnaire' or 'interview')"
            ))),
        }
    }
}

/// One typed step of a research plan.
///
/// The step vocabulary is a closed sum type; the engine dispatches by
/// pattern matching, so a new step kind is a compile-time exhaustiveness
/// concern rather than a string comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanStep {
    /// All questions batched into one written-questionnaire call.
    Questionnaire {
        /// Questions to ask, in extraction order. May be empty, in which
        /// case the engine records the step without an LLM call.
        questions: Vec<String>,
    },
    /// A single-call interview with a requested question count.
    Interview {
        /// Number of interviewer questions (at least 1).
        question_count: usize,
        /// Extracted questions the interviewer should seed from; the
        /// model free-forms the rest when the list is short or empty.
        seed_questions: Vec<String>,
    },
}

impl PlanStep {
    /// Step-kind label used in events.
    pub fn kind(&self) -> &'static str {
        match self {
            PlanStep::Questionnaire { .. } => "questionnaire",
            PlanStep::Interview { .. } => "interview",
        }
    }
}

/// Ordered step sequence replayed identically for every respondent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchPlan {
    /// Plan schema version.
    pub version: u32,
    /// Style the plan was built for.
    pub style: ResearchStyle,
    /// Ordered steps.
    pub steps: Vec<PlanStep>,
}

impl ResearchPlan {
    /// Parse a plan from a JSON value, skipping steps whose `type` tag is
    /// unrecognized so newer plans remain readable by older engines.
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| AppError::Validation("plan must be a JSON object".to_string()))?;

        let version = obj.get("version").and_then(|v| v.as_u64()).unwrap_or(1) as u32;
        let style = obj
            .get("style")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .parse::<ResearchStyle>()
            .unwrap_or_default();

        let steps = match obj.get("steps").and_then(|v| v.as_array()) {
            Some(raw) => raw
                .iter()
                .filter_map(|step| serde_json::from_value::<PlanStep>(step.clone()).ok())
                .collect(),
            None => Vec::new(),
        };

        Ok(ResearchPlan {
            version,
            style,
            steps,
        })
    }
}

// ============= Question Extraction =============

/// Fold the accented vowels used by Spanish interrogatives so "qué" and
/// "que" compare equal.
fn fold_accents(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' => 'a',
            'é' | 'è' | 'ë' => 'e',
            'í' | 'ì' | 'ï' => 'i',
            'ó' | 'ò' | 'ö' => 'o',
            'ú' | 'ù' | 'ü' => 'u',
            other => other,
        })
        .collect()
}

fn strip_bullet(line: &str) -> &str {
    match BULLET_RE.captures(line) {
        Some(caps) => caps.name("text").map_or(line.trim(), |m| m.as_str()),
        None => line.trim(),
    }
}

/// Strict extraction from a free-text brief: keep lines containing `?`,
/// plus bulleted/numbered lines whose text starts with an interrogative.
fn extract_questions(text: &str) -> Vec<String> {
    let mut candidates = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.contains('?') {
            candidates.push(strip_bullet(line).to_string());
            continue;
        }

        if let Some(caps) = BULLET_RE.captures(line) {
            let text = caps.name("text").map_or("", |m| m.as_str()).trim();
            let folded = fold_accents(&text.to_lowercase());
            if INTERROGATIVE_RE.is_match(&folded) {
                candidates.push(text.to_string());
            }
        }
    }

    dedupe(candidates)
}

/// Lenient extraction from an explicit question block: every non-blank
/// line is a candidate, bullet prefixes stripped.
fn extract_explicit_questions(text: &str) -> Vec<String> {
    let candidates = text
        .lines()
        .map(strip_bullet)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    dedupe(candidates)
}

/// Deduplicate case-insensitively, preserving first-seen order.
fn dedupe(candidates: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(candidates.len());
    for q in candidates {
        let key = q.trim().to_lowercase();
        if !key.is_empty() && seen.insert(key) {
            out.push(q);
        }
    }
    out
}

// ============= Plan Construction =============

/// Build a plan from the research brief.
///
/// Explicit questions take precedence over questions mined from the
/// description. A questionnaire-style plan has exactly one
/// [`PlanStep::Questionnaire`] (possibly with zero questions); any other
/// style yields one [`PlanStep::Interview`] whose count defaults to
/// [`DEFAULT_INTERVIEW_QUESTIONS`] when nothing was extracted.
pub fn build_plan(description: &str, style: ResearchStyle, explicit_questions: &str) -> ResearchPlan {
    let questions = if explicit_questions.trim().is_empty() {
        extract_questions(description)
    } else {
        extract_explicit_questions(explicit_questions)
    };

    let steps = match style {
        ResearchStyle::Questionnaire => vec![PlanStep::Questionnaire { questions }],
        ResearchStyle::Interview => {
            let question_count = if questions.is_empty() {
                DEFAULT_INTERVIEW_QUESTIONS
            } else {
                questions.len()
            };
            vec![PlanStep::Interview {
                question_count,
                seed_questions: questions,
            }]
        }
    };

    ResearchPlan {
        version: 1,
        style,
        steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn questionnaire_plan_extracts_in_order_and_dedupes() {
        let plan = build_plan(
            "¿Qué opinas?\n¿Qué cambiarías?\n¿qué opinas?",
            ResearchStyle::Questionnaire,
            "",
        );
        assert_eq!(plan.steps.len(), 1);
        match &plan.steps[0] {
            PlanStep::Questionnaire { questions } => {
                assert_eq!(questions, &["¿Qué opinas?", "¿Qué cambiarías?"]);
            }
            other => panic!("expected questionnaire step, got {other:?}"),
        }
    }

    #[test]
    fn interview_plan_defaults_to_six_questions() {
        let plan = build_plan("Explora la experiencia de onboarding.", ResearchStyle::Interview, "");
        match &plan.steps[0] {
            PlanStep::Interview {
                question_count,
                seed_questions,
            } => {
                assert_eq!(*question_count, DEFAULT_INTERVIEW_QUESTIONS);
                assert!(seed_questions.is_empty());
            }
            other => panic!("expected interview step, got {other:?}"),
        }
    }

    #[test]
    fn interview_count_follows_extracted_questions() {
        let plan = build_plan(
            "¿Qué te frustra?\n¿Qué valoras más?",
            ResearchStyle::Interview,
            "",
        );
        match &plan.steps[0] {
            PlanStep::Interview {
                question_count,
                seed_questions,
            } => {
                assert_eq!(*question_count, 2);
                assert_eq!(seed_questions.len(), 2);
            }
            other => panic!("expected interview step, got {other:?}"),
        }
    }

    #[rstest]
    #[case("- Qué opinas del producto", true)]
    #[case("- qué opinas del producto", true)]
    #[case("1. Cómo lo usarías", true)]
    #[case("2) Dónde lo comprarías", true)]
    #[case("* Por qué lo recomendarías", true)]
    #[case("- Me gusta el producto", false)]
    #[case("Qué opinas del producto", false)] // interrogative but not a bullet
    fn strict_extraction_requires_bullet_and_interrogative(
        #[case] line: &str,
        #[case] expected: bool,
    ) {
        let plan = build_plan(line, ResearchStyle::Questionnaire, "");
        let questions = match &plan.steps[0] {
            PlanStep::Questionnaire { questions } => questions.clone(),
            other => panic!("expected questionnaire step, got {other:?}"),
        };
        assert_eq!(!questions.is_empty(), expected, "line: {line}");
    }

    #[test]
    fn explicit_questions_win_over_description() {
        let plan = build_plan(
            "¿Esto se ignora?",
            ResearchStyle::Questionnaire,
            "Primera pregunta\n- Segunda pregunta\n\nprimera pregunta",
        );
        match &plan.steps[0] {
            PlanStep::Questionnaire { questions } => {
                assert_eq!(questions, &["Primera pregunta", "Segunda pregunta"]);
            }
            other => panic!("expected questionnaire step, got {other:?}"),
        }
    }

    #[test]
    fn build_plan_is_deterministic() {
        let a = build_plan("¿Qué opinas?", ResearchStyle::Interview, "");
        let b = build_plan("¿Qué opinas?", ResearchStyle::Interview, "");
        assert_eq!(
            serde_json::to_value(&a).unwrap(),
            serde_json::to_value(&b).unwrap()
        );
    }

    #[rstest]
    #[case("questionnaire", ResearchStyle::Questionnaire)]
    #[case("cuestionario", ResearchStyle::Questionnaire)]
    #[case("Entrevista", ResearchStyle::Interview)]
    #[case("interview", ResearchStyle::Interview)]
    #[case("", ResearchStyle::Interview)]
    fn style_labels_parse(#[case] label: &str, #[case] expected: ResearchStyle) {
        assert_eq!(label.parse::<ResearchStyle>().unwrap(), expected);
    }

    #[test]
    fn unknown_style_is_a_configuration_error() {
        let err = "focus group".parse::<ResearchStyle>().unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[test]
    fn lenient_plan_parsing_skips_unknown_step_types() {
        let value = serde_json::json!({
            "version": 1,
            "style": "interview",
            "steps": [
                {"type": "interview", "question_count": 4, "seed_questions": []},
                {"type": "behavior_sim", "scenarios": []},
            ]
        });
        let plan = ResearchPlan::from_value(&value).unwrap();
        assert_eq!(plan.steps.len(), 1);
        assert!(matches!(plan.steps[0], PlanStep::Interview { .. }));
    }
}
