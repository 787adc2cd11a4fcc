//! Research Orchestrator
//!
//! Drives a full study as a linear pipeline: persist the input configs and
//! the plan, process each respondent sequentially (fresh gateway, profile,
//! plan steps, artifact), synthesize an aggregate report with one more
//! fresh gateway, and persist the final report.
//!
//! Two entry points share the same phase helpers. [`ResearchOrchestrator::run`]
//! blocks until the final report. [`ResearchOrchestrator::run_streaming`]
//! yields a lazy, ordered, finite [`ProgressEvent`] sequence terminated by
//! exactly one `done`, `cancelled` or `error` event; cancellation is
//! cooperative and only observed at respondent and step boundaries, and
//! already-persisted artifacts are never rolled back.

use crate::llm::{Gateway, GatewayFactory};
use crate::planner::PlanStep;
use crate::prompts::{
    interview_context, questionnaire_context, render, synthesis_context, PromptSet,
};
use crate::respondent::SyntheticRespondent;
use crate::storage::{new_run_id, ArtifactStore, RunStore};
use crate::types::{
    FinalReport, ProductContext, ProgressEvent, RespondentArtifact, RespondentDescriptor,
    RespondentRef, ResearchContext, Result, StepResult, SubjectSummary,
};
use async_stream::stream;
use chrono::{DateTime, Utc};
use futures::Stream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// ============= Cancellation =============

/// Cooperative cancellation flag shared between a running study and its
/// controller. Cancelling is idempotent; the engine checks the flag at
/// respondent and step boundaries, never mid-call.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Safe to call any number of times.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ============= Progress =============

/// Deterministic progress fraction for respondent `i` of `n` (1-based):
/// `(2*(i-1) + offset) / (2*n + 2)`. Offset 0 is respondent start, 1 is
/// profile done, 2 is respondent done; the `2*n + 2` denominator leaves
/// room for the synthesis tail.
pub fn progress_fraction(i: usize, n: usize, offset: usize) -> f64 {
    let n = n.max(1);
    (2 * i.saturating_sub(1) + offset) as f64 / (2 * n + 2) as f64
}

// ============= Orchestrator =============

/// One configured study execution. Consumed by `run` or `run_streaming`;
/// a new orchestrator (with a new run id) is built per execution.
pub struct ResearchOrchestrator {
    respondents: Vec<RespondentDescriptor>,
    product: ProductContext,
    research: ResearchContext,
    plan: crate::planner::ResearchPlan,
    prompts: PromptSet,
    factory: Arc<dyn GatewayFactory>,
    store: ArtifactStore,
    run_id: String,
    run_ts: DateTime<Utc>,
}

impl ResearchOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        respondents: Vec<RespondentDescriptor>,
        product: ProductContext,
        research: ResearchContext,
        plan: crate::planner::ResearchPlan,
        prompts: PromptSet,
        factory: Arc<dyn GatewayFactory>,
        store: ArtifactStore,
    ) -> Self {
        Self {
            respondents,
            product,
            research,
            plan,
            prompts,
            factory,
            store,
            run_id: new_run_id(),
            run_ts: Utc::now(),
        }
    }

    /// Identifier of the run this orchestrator will execute.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Execute the study end to end, blocking until the final report.
    pub async fn run(self) -> Result<FinalReport> {
        tracing::info!(run_id = %self.run_id, respondents = self.respondents.len(), "study started");
        let run = self.persist_inputs()?;
        let n = self.total();

        let mut artifacts: Vec<RespondentArtifact> = Vec::with_capacity(self.respondents.len());
        let mut index: Vec<RespondentRef> = Vec::with_capacity(self.respondents.len());

        for (i0, descriptor) in self.respondents.iter().enumerate() {
            let i = i0 + 1;
            tracing::info!(run_id = %self.run_id, i, n, archetype = %descriptor.archetype, "respondent started");
            let (artifact, file) = self.process_respondent(&run, i, descriptor.clone()).await?;
            index.push(RespondentRef {
                artifact_id: file,
                archetype: descriptor.archetype.clone(),
            });
            artifacts.push(artifact);
        }

        let (label, synthesis_text) = self.synthesize(&artifacts).await?;
        let report = self.assemble_report(synthesis_text, label, index);
        run.save_report(&report)?;
        tracing::info!(run_id = %self.run_id, "study completed");
        Ok(report)
    }

    /// Execute the study as a lazy event stream.
    ///
    /// Events are emitted in pipeline order and the stream always ends
    /// with exactly one terminal event. On error the internal detail is
    /// logged and only a human-readable message is emitted.
    pub fn run_streaming(
        self,
        token: CancellationToken,
    ) -> impl Stream<Item = ProgressEvent> {
        stream! {
            tracing::info!(run_id = %self.run_id, respondents = self.respondents.len(), "study started (streaming)");
            let run = match self.persist_inputs() {
                Ok(run) => run,
                Err(e) => {
                    yield self.error_event(e);
                    return;
                }
            };
            yield ProgressEvent::PlanSaved {
                plan_id: "plan.json".to_string(),
                message: "Plan de investigación preparado.".to_string(),
            };

            let n = self.total();
            let mut artifacts: Vec<RespondentArtifact> = Vec::with_capacity(self.respondents.len());
            let mut index: Vec<RespondentRef> = Vec::with_capacity(self.respondents.len());

            for (i0, descriptor) in self.respondents.iter().enumerate() {
                let i = i0 + 1;
                if token.is_cancelled() {
                    yield self.cancelled_event();
                    return;
                }
                yield ProgressEvent::RespondentStart {
                    i,
                    n,
                    archetype: descriptor.archetype.clone(),
                    message: format!("Respondiente {i}/{n} ({})", descriptor.archetype),
                };

                let gateway = match self.factory.create() {
                    Ok(gateway) => gateway,
                    Err(e) => {
                        yield self.error_event(e);
                        return;
                    }
                };
                let mut respondent = SyntheticRespondent::new(descriptor.clone());
                let (name, profile_text) = match respondent
                    .generate_profile(&gateway, self.prompts.profile())
                    .await
                {
                    Ok(profile) => (profile.name.clone(), profile.profile_text.clone()),
                    Err(e) => {
                        yield self.error_event(e);
                        return;
                    }
                };
                yield ProgressEvent::ProfileDone {
                    i,
                    n,
                    message: format!("Perfil generado para {name}."),
                };

                let mut step_results: Vec<StepResult> = Vec::with_capacity(self.plan.steps.len());
                for step in &self.plan.steps {
                    if token.is_cancelled() {
                        yield self.cancelled_event();
                        return;
                    }
                    yield ProgressEvent::StepStart {
                        i,
                        n,
                        step_type: step.kind().to_string(),
                        message: format!("Ejecutando '{}' para {name}...", step.kind()),
                    };
                    match self.execute_step(&gateway, &name, &profile_text, step, i).await {
                        Ok(result) => {
                            yield ProgressEvent::StepDone {
                                i,
                                n,
                                step_type: step.kind().to_string(),
                                message: format!("'{}' completado para {name}.", step.kind()),
                            };
                            step_results.push(result);
                        }
                        Err(e) => {
                            yield self.error_event(e);
                            return;
                        }
                    }
                }

                let artifact = self.build_artifact(i, descriptor.clone(), name, profile_text, step_results);
                match run.save_respondent_artifact(i, &artifact) {
                    Ok(file) => {
                        index.push(RespondentRef {
                            artifact_id: file.clone(),
                            archetype: descriptor.archetype.clone(),
                        });
                        artifacts.push(artifact);
                        yield ProgressEvent::RespondentDone {
                            i,
                            n,
                            respondent_id: file,
                            message: format!("Respondiente {i}/{n} guardado."),
                        };
                    }
                    Err(e) => {
                        yield self.error_event(e);
                        return;
                    }
                }
            }

            if token.is_cancelled() {
                yield self.cancelled_event();
                return;
            }

            yield ProgressEvent::SynthesisStart {
                message: "Generando síntesis agregada...".to_string(),
            };
            let (label, synthesis_text) = match self.synthesize(&artifacts).await {
                Ok(out) => out,
                Err(e) => {
                    yield self.error_event(e);
                    return;
                }
            };
            yield ProgressEvent::SynthesisDone {
                message: "Síntesis completada.".to_string(),
            };

            let report = self.assemble_report(synthesis_text, label, index);
            if let Err(e) = run.save_report(&report) {
                yield self.error_event(e);
                return;
            }
            tracing::info!(run_id = %self.run_id, "study completed");
            yield ProgressEvent::Done {
                result: Box::new(report),
                message: "Investigación completada.".to_string(),
            };
        }
    }

    // ============= Phase Helpers =============

    /// Denominator-safe respondent total.
    fn total(&self) -> usize {
        self.respondents.len().max(1)
    }

    fn persist_inputs(&self) -> Result<RunStore> {
        let run = self.store.open_run(&self.run_id)?;
        run.save_product(&self.product)?;
        run.save_research(&self.research)?;
        run.save_respondents(&self.respondents)?;
        run.save_plan(&self.plan)?;
        Ok(run)
    }

    /// Full blocking-mode handling of one respondent: fresh gateway,
    /// profile, all plan steps, persisted artifact.
    async fn process_respondent(
        &self,
        run: &RunStore,
        i: usize,
        descriptor: RespondentDescriptor,
    ) -> Result<(RespondentArtifact, String)> {
        let gateway = self.factory.create()?;
        let mut respondent = SyntheticRespondent::new(descriptor.clone());
        let profile = respondent
            .generate_profile(&gateway, self.prompts.profile())
            .await?;
        let name = profile.name.clone();
        let profile_text = profile.profile_text.clone();

        let mut step_results: Vec<StepResult> = Vec::with_capacity(self.plan.steps.len());
        for step in &self.plan.steps {
            step_results.push(
                self.execute_step(&gateway, &name, &profile_text, step, i)
                    .await?,
            );
        }

        let artifact = self.build_artifact(i, descriptor, name, profile_text, step_results);
        let file = run.save_respondent_artifact(i, &artifact)?;
        Ok((artifact, file))
    }

    /// Execute one plan step for respondent `i` (1-based; also the
    /// interview variability seed). A questionnaire with no questions is
    /// recorded without any generation call.
    async fn execute_step(
        &self,
        gateway: &Gateway,
        name: &str,
        profile_text: &str,
        step: &PlanStep,
        i: usize,
    ) -> Result<StepResult> {
        match step {
            PlanStep::Questionnaire { questions } => {
                let questions: Vec<String> = questions
                    .iter()
                    .filter(|q| !q.trim().is_empty())
                    .cloned()
                    .collect();
                let answers = if questions.is_empty() {
                    String::new()
                } else {
                    let ctx = questionnaire_context(
                        name,
                        profile_text,
                        &self.product,
                        &self.research,
                        &questions,
                    );
                    gateway.generate(&render(self.prompts.questionnaire(), &ctx)).await?
                };
                Ok(StepResult::Questionnaire { questions, answers })
            }
            PlanStep::Interview {
                question_count,
                seed_questions,
            } => {
                let count = (*question_count).max(1);
                let ctx = interview_context(
                    name,
                    profile_text,
                    &self.product,
                    &self.research,
                    count,
                    seed_questions,
                    i,
                );
                let transcript = gateway.generate(&render(self.prompts.interview(), &ctx)).await?;
                Ok(StepResult::Interview {
                    question_count: count,
                    transcript,
                })
            }
        }
    }

    fn build_artifact(
        &self,
        i: usize,
        descriptor: RespondentDescriptor,
        name: String,
        profile_text: String,
        step_results: Vec<StepResult>,
    ) -> RespondentArtifact {
        RespondentArtifact {
            timestamp: self.run_ts,
            respondent_id: crate::storage::respondent_file_name(i),
            basic_profile: descriptor,
            generated_name: name,
            generated_profile_text: profile_text,
            step_results,
        }
    }

    /// Aggregate synthesis: one fresh gateway, one call over the rendered
    /// synthesis template plus a labeled plain-text dump of every step
    /// output. Returns the subject label and the synthesized text.
    async fn synthesize(&self, artifacts: &[RespondentArtifact]) -> Result<(String, String)> {
        let label = self.subject_label(artifacts);
        let base = render(
            self.prompts.synthesis(),
            &synthesis_context(&label, &self.product, &self.research),
        );

        let mut data = String::new();
        for artifact in artifacts {
            data.push_str(&format!(
                "\n=== RESPONDIENTE: {} ({}) ===\n",
                artifact.generated_name, artifact.basic_profile.archetype
            ));
            for step in &artifact.step_results {
                match step {
                    StepResult::Questionnaire { answers, .. } => {
                        data.push_str("\n--- CUESTIONARIO ---\n");
                        data.push_str(answers);
                        data.push('\n');
                    }
                    StepResult::Interview { transcript, .. } => {
                        data.push_str("\n--- ENTREVISTA ---\n");
                        data.push_str(transcript);
                        data.push('\n');
                    }
                }
            }
        }

        let prompt = format!(
            "{base}\n\n{}\nDATOS RECOPILADOS:\n{data}",
            "=".repeat(50)
        );
        let gateway = self.factory.create()?;
        let text = gateway.generate(&prompt).await?;
        Ok((label, text))
    }

    /// Human label for the study subject: `1 respondiente`, or
    /// `N respondientes (Skeptic x3, Personalizado x2)` with archetype
    /// counts in first-seen order.
    fn subject_label(&self, artifacts: &[RespondentArtifact]) -> String {
        if artifacts.len() == 1 {
            return "1 respondiente".to_string();
        }
        let mut counts: Vec<(String, usize)> = Vec::new();
        for artifact in artifacts {
            let archetype = artifact.basic_profile.archetype.clone();
            match counts.iter_mut().find(|(a, _)| *a == archetype) {
                Some((_, count)) => *count += 1,
                None => counts.push((archetype, 1)),
            }
        }
        let mix = counts
            .iter()
            .map(|(a, c)| format!("{a} x{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{} respondientes ({mix})", artifacts.len())
    }

    fn assemble_report(
        &self,
        synthesis_text: String,
        label: String,
        index: Vec<RespondentRef>,
    ) -> FinalReport {
        let subject_summary = match self.respondents.as_slice() {
            [only] => SubjectSummary::Single {
                profile: only.clone(),
            },
            _ => SubjectSummary::Population {
                label,
                respondent_count: self.respondents.len(),
            },
        };
        FinalReport {
            timestamp: self.run_ts,
            run_id: self.run_id.clone(),
            subject_summary,
            product: self.product.clone(),
            research: self.research.clone(),
            synthesis_text,
            plan: self.plan.clone(),
            respondent_index: index,
        }
    }

    fn cancelled_event(&self) -> ProgressEvent {
        tracing::info!(run_id = %self.run_id, "study cancelled");
        ProgressEvent::Cancelled {
            message: "Investigación cancelada por el usuario.".to_string(),
        }
    }

    fn error_event(&self, e: crate::types::AppError) -> ProgressEvent {
        tracing::error!(run_id = %self.run_id, error = %e, "study failed");
        ProgressEvent::Error {
            message: format!("Error en la investigación: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_idempotent() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());

        // Clones observe the same flag.
        let clone = token.clone();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn progress_fraction_is_monotonic_over_a_run() {
        let n = 5;
        let mut last = -1.0;
        for i in 1..=n {
            for offset in 0..=2 {
                let f = progress_fraction(i, n, offset);
                assert!(f >= last, "fraction regressed at i={i} offset={offset}");
                last = f;
            }
        }
        assert!(last < 1.0);
    }

    #[test]
    fn progress_fraction_handles_degenerate_input() {
        assert_eq!(progress_fraction(1, 0, 0), 0.0);
        assert_eq!(progress_fraction(0, 5, 0), 0.0);
    }
}
