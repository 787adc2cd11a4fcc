//! Orchestrator integration tests against a scripted backend.

mod common;

use common::{
    descriptor, interview_plan, questionnaire_plan, research, FakeFactory, Script,
};
use futures::StreamExt;
use sondeo::engine::{CancellationToken, ResearchOrchestrator};
use sondeo::storage::ArtifactStore;
use sondeo::types::{
    ProductContext, ProgressEvent, RespondentArtifact, StepResult, SubjectSummary,
};
use std::sync::Arc;

fn orchestrator(
    respondents: Vec<sondeo::types::RespondentDescriptor>,
    plan: sondeo::planner::ResearchPlan,
    script: Script,
    root: &std::path::Path,
) -> ResearchOrchestrator {
    ResearchOrchestrator::new(
        respondents,
        ProductContext {
            name: "Asistente".to_string(),
            description: "Asistente de compras".to_string(),
        },
        research(),
        plan,
        Default::default(),
        Arc::new(FakeFactory::new(script)),
        ArtifactStore::new(root),
    )
}

#[tokio::test]
async fn blocking_run_persists_n_plus_one_artifacts() {
    let tmp = tempfile::tempdir().unwrap();
    let script = Script::default();
    let respondents = vec![descriptor("Escéptico"), descriptor("Escéptico"), descriptor("Early Adopter")];
    let orch = orchestrator(
        respondents,
        questionnaire_plan(&["¿Qué opinas?", "¿Qué cambiarías?"]),
        script.clone(),
        tmp.path(),
    );
    let run_id = orch.run_id().to_string();

    let report = orch.run().await.unwrap();

    let run_dir = tmp.path().join(&run_id);
    for file in [
        "configs/product.json",
        "configs/research.json",
        "configs/respondents.json",
        "plan.json",
        "respondents/respondent_01.json",
        "respondents/respondent_02.json",
        "respondents/respondent_03.json",
        "analysis.json",
    ] {
        assert!(run_dir.join(file).exists(), "missing {file}");
    }

    assert_eq!(report.run_id, run_id);
    assert_eq!(report.respondent_index.len(), 3);
    assert_eq!(report.respondent_index[0].artifact_id, "respondent_01.json");
    match &report.subject_summary {
        SubjectSummary::Population {
            label,
            respondent_count,
        } => {
            assert_eq!(*respondent_count, 3);
            assert_eq!(label, "3 respondientes (Escéptico x2, Early Adopter x1)");
        }
        other => panic!("expected population summary, got {other:?}"),
    }

    // One gateway per respondent plus one for synthesis.
    assert_eq!(script.gateways_created(), 4);
    // Per respondent: profile + questionnaire; plus one synthesis call.
    assert_eq!(script.calls(), 3 * 2 + 1);

    // The persisted report matches the returned one.
    let raw = std::fs::read_to_string(run_dir.join("analysis.json")).unwrap();
    let on_disk: sondeo::types::FinalReport = serde_json::from_str(&raw).unwrap();
    assert_eq!(on_disk.synthesis_text, report.synthesis_text);
}

#[tokio::test]
async fn zero_question_questionnaire_skips_the_call_but_records_the_step() {
    let tmp = tempfile::tempdir().unwrap();
    let script = Script::default();
    let orch = orchestrator(
        vec![descriptor("Escéptico")],
        questionnaire_plan(&["   "]),
        script.clone(),
        tmp.path(),
    );
    let run_id = orch.run_id().to_string();

    orch.run().await.unwrap();

    // Profile + synthesis only; no questionnaire call.
    assert_eq!(script.calls(), 2);

    let raw = std::fs::read_to_string(
        tmp.path()
            .join(&run_id)
            .join("respondents/respondent_01.json"),
    )
    .unwrap();
    let artifact: RespondentArtifact = serde_json::from_str(&raw).unwrap();
    assert_eq!(artifact.step_results.len(), 1);
    match &artifact.step_results[0] {
        StepResult::Questionnaire { questions, answers } => {
            assert!(questions.is_empty());
            assert!(answers.is_empty());
        }
        other => panic!("expected questionnaire result, got {other:?}"),
    }
}

#[tokio::test]
async fn streaming_single_skeptic_interview_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let script = Script::default();
    let orch = orchestrator(
        vec![descriptor("Escéptico")],
        interview_plan(6),
        script.clone(),
        tmp.path(),
    );
    let run_id = orch.run_id().to_string();

    let stream = orch.run_streaming(CancellationToken::new());
    futures::pin_mut!(stream);
    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event);
    }

    let names: Vec<&str> = events.iter().map(|e| e.name()).collect();
    assert_eq!(
        names,
        [
            "plan_saved",
            "respondent_start",
            "profile_done",
            "step_start",
            "step_done",
            "respondent_done",
            "synthesis_start",
            "synthesis_done",
            "done",
        ]
    );
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);

    match events.last() {
        Some(ProgressEvent::Done { result, .. }) => {
            assert!(matches!(
                result.subject_summary,
                SubjectSummary::Single { .. }
            ));
            assert_eq!(result.respondent_index.len(), 1);
        }
        other => panic!("expected done, got {other:?}"),
    }

    // Profile prompt carries the archetype; interview prompt carries the
    // display name, the clamped question count, and the seed.
    let prompts = script.prompts();
    assert_eq!(prompts.len(), 3);
    assert!(prompts[0].contains("Escéptico"));
    assert!(prompts[1].contains("Eres Escéptico"));
    assert!(prompts[1].contains("te hará 6 preguntas"));
    assert!(prompts[1].contains("Seed para variabilidad: 1"));
    assert!(prompts[2].contains("DATOS RECOPILADOS"));
    assert!(prompts[2].contains("respuesta 2"));

    assert!(tmp.path().join(&run_id).join("analysis.json").exists());
}

#[tokio::test]
async fn cancellation_before_respondent_three_keeps_earlier_artifacts() {
    let tmp = tempfile::tempdir().unwrap();
    let script = Script::default();
    let respondents = (0..5).map(|_| descriptor("Escéptico")).collect();
    let orch = orchestrator(respondents, interview_plan(4), script.clone(), tmp.path());
    let run_id = orch.run_id().to_string();

    let token = CancellationToken::new();
    let stream = orch.run_streaming(token.clone());
    futures::pin_mut!(stream);

    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        if let ProgressEvent::RespondentDone { i: 2, .. } = event {
            token.cancel();
        }
        events.push(event);
    }

    assert!(matches!(
        events.last(),
        Some(ProgressEvent::Cancelled { .. })
    ));
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);

    let run_dir = tmp.path().join(&run_id);
    assert!(run_dir.join("respondents/respondent_01.json").exists());
    assert!(run_dir.join("respondents/respondent_02.json").exists());
    assert!(!run_dir.join("respondents/respondent_03.json").exists());
    // No synthesis, no final report; earlier artifacts stay on disk.
    assert!(!run_dir.join("analysis.json").exists());
    // 2 respondents x (profile + interview), no synthesis call.
    assert_eq!(script.calls(), 4);
}

#[tokio::test]
async fn provider_failure_ends_the_stream_with_one_error_event() {
    let tmp = tempfile::tempdir().unwrap();
    // Third call fails: respondent 2's profile.
    let script = Script::failing_on(2);
    let respondents = vec![descriptor("Escéptico"), descriptor("Escéptico")];
    let orch = orchestrator(respondents, interview_plan(4), script.clone(), tmp.path());
    let run_id = orch.run_id().to_string();

    let stream = orch.run_streaming(CancellationToken::new());
    futures::pin_mut!(stream);
    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event);
    }

    match events.last() {
        Some(ProgressEvent::Error { message }) => {
            assert!(message.contains("Error en la investigación"));
        }
        other => panic!("expected error, got {other:?}"),
    }
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);

    // Respondent 1 completed and stays on disk; no final report.
    let run_dir = tmp.path().join(&run_id);
    assert!(run_dir.join("respondents/respondent_01.json").exists());
    assert!(!run_dir.join("analysis.json").exists());
}
