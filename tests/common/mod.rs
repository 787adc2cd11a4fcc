//! Shared test doubles: a scripted generation backend plus builders.

// Shared by several test binaries; not every binary uses every helper.
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use sondeo::llm::{
    ConnectionState, ConnectionStatus, Gateway, GatewayFactory, GenerationOptions,
    GenerationService,
};
use sondeo::planner::{PlanStep, ResearchPlan, ResearchStyle};
use sondeo::types::{AppError, RespondentDescriptor, ResearchContext, Result};
use std::sync::Arc;

/// Shared state behind every gateway a [`FakeFactory`] mints: the full
/// prompt log (in call order, across all gateways) and the failure script.
#[derive(Default)]
pub struct ScriptState {
    pub prompts: Vec<String>,
    pub gateways_created: usize,
    /// 0-based global call index that fails with a provider error.
    pub fail_on_call: Option<usize>,
}

#[derive(Clone, Default)]
pub struct Script(pub Arc<Mutex<ScriptState>>);

impl Script {
    pub fn failing_on(call: usize) -> Self {
        let script = Script::default();
        script.0.lock().fail_on_call = Some(call);
        script
    }

    pub fn prompts(&self) -> Vec<String> {
        self.0.lock().prompts.clone()
    }

    pub fn calls(&self) -> usize {
        self.0.lock().prompts.len()
    }

    pub fn gateways_created(&self) -> usize {
        self.0.lock().gateways_created
    }
}

/// Deterministic in-memory backend; reply k is `"respuesta k"`.
pub struct FakeService {
    script: Script,
}

#[async_trait]
impl GenerationService for FakeService {
    async fn generate(&self, prompt: &str, _options: &GenerationOptions) -> Result<String> {
        let mut state = self.script.0.lock();
        let call = state.prompts.len();
        state.prompts.push(prompt.to_string());
        if state.fail_on_call == Some(call) {
            return Err(AppError::Provider("scripted backend failure".to_string()));
        }
        Ok(format!("respuesta {}", call + 1))
    }

    async fn probe(&self) -> ConnectionStatus {
        ConnectionStatus {
            state: ConnectionState::Connected,
            message: "fake backend".to_string(),
        }
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

/// Factory that counts minted gateways; used to assert per-respondent
/// gateway isolation.
pub struct FakeFactory {
    pub script: Script,
    pub min_delay_ms: u64,
}

impl FakeFactory {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            min_delay_ms: 0,
        }
    }
}

impl GatewayFactory for FakeFactory {
    fn create(&self) -> Result<Gateway> {
        self.script.0.lock().gateways_created += 1;
        Ok(Gateway::new(
            Box::new(FakeService {
                script: self.script.clone(),
            }),
            GenerationOptions::default(),
            self.min_delay_ms,
        ))
    }
}

/// A gateway wired straight to a script, bypassing the factory.
pub fn fake_gateway(script: Script, min_delay_ms: u64) -> Gateway {
    Gateway::new(
        Box::new(FakeService { script }),
        GenerationOptions::default(),
        min_delay_ms,
    )
}

pub fn descriptor(archetype: &str) -> RespondentDescriptor {
    RespondentDescriptor {
        archetype: archetype.to_string(),
        behavior: format!("{archetype} behavior"),
        ..Default::default()
    }
}

pub fn research() -> ResearchContext {
    ResearchContext {
        description: "Primera experiencia con el asistente.".to_string(),
        objective: "Entender fricciones de adopción.".to_string(),
        ..Default::default()
    }
}

pub fn interview_plan(question_count: usize) -> ResearchPlan {
    ResearchPlan {
        version: 1,
        style: ResearchStyle::Interview,
        steps: vec![PlanStep::Interview {
            question_count,
            seed_questions: Vec::new(),
        }],
    }
}

pub fn questionnaire_plan(questions: &[&str]) -> ResearchPlan {
    ResearchPlan {
        version: 1,
        style: ResearchStyle::Questionnaire,
        steps: vec![PlanStep::Questionnaire {
            questions: questions.iter().map(|q| q.to_string()).collect(),
        }],
    }
}
