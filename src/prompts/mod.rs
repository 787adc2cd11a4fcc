//! Prompt Renderer
//!
//! Template substitution plus the built-in default prompt templates and the
//! typed context builders that feed them.
//!
//! Rendering is a total function: `{name}` placeholders are replaced from a
//! string map, and any placeholder the map does not cover renders as the
//! literal `"N/A"`. A malformed brace sequence passes through unchanged.
//! The study copy is Spanish (the domain this engine serves); placeholder
//! keys are English snake_case.

use crate::planner::MAX_INTERVIEW_QUESTIONS;
use crate::types::{Gender, ProductContext, RespondentDescriptor, ResearchContext};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sentinel rendered for any placeholder the context does not supply.
pub const MISSING_VALUE: &str = "N/A";

/// Substitution context: placeholder name to value.
pub type PromptContext = HashMap<String, String>;

// ============= Renderer =============

/// Render `template`, replacing each `{name}` placeholder with its value
/// from `ctx`, or [`MISSING_VALUE`] when absent.
///
/// A placeholder name is one or more of `[A-Za-z0-9_]`. Braces that do not
/// delimit a valid name are emitted verbatim, so stray `{` or `}` in study
/// copy never cause a failure.
pub fn render(template: &str, ctx: &PromptContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if c != '{' {
            out.push(c);
            continue;
        }

        let rest = &template[start + 1..];
        match rest.find(['{', '}']) {
            Some(end) if rest.as_bytes()[end] == b'}' => {
                let name = &rest[..end];
                let valid = !name.is_empty()
                    && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
                if valid {
                    match ctx.get(name) {
                        Some(value) => out.push_str(value),
                        None => out.push_str(MISSING_VALUE),
                    }
                    // Skip past the placeholder body and closing brace.
                    for _ in 0..=name.chars().count() {
                        chars.next();
                    }
                } else {
                    out.push('{');
                }
            }
            _ => out.push('{'),
        }
    }

    out
}

// ============= Default Templates =============

/// Default profile-generation template.
pub const DEFAULT_PROFILE_TEMPLATE: &str = "\
Eres un asistente que genera perfiles detallados de usuarios sintéticos para investigación.

Este usuario se define por:
- Arquetipo: {archetype}
- Comportamiento: {behavior}
- Necesidades del asistente: {needs}
- Barreras típicas de adopción: {barriers}
- Edad: {age}
- Género: {gender}

Genera un perfil detallado y realista de este usuario, incluyendo:
- Nombre ficticio (uno)
- Personalidad y rasgos psicológicos
- Motivaciones y frustraciones
- Estilo de comunicación
- Cómo toma decisiones y valida información
- Qué le haría confiar o desconfiar del asistente

Sé específico y realista. No inventes datos que contradigan las dimensiones proporcionadas; si falta información, completa con supuestos razonables y explícitalos brevemente.";

/// Default written-questionnaire template.
pub const DEFAULT_QUESTIONNAIRE_TEMPLATE: &str = "\
Eres {user_name}, con el siguiente perfil:
{user_profile}

CONTEXTO DEL PRODUCTO:
{product_description}

SITUACIÓN DE LA INVESTIGACIÓN:
{research_description}

Acabas de participar en la situación descrita en la investigación. Ahora estás completando un cuestionario ESCRITO.

Como es un formulario escrito, tus respuestas deben ser:
- Directas y concisas (como cuando escribes en un formulario)
- Más pensadas y estructuradas que en una conversación oral
- Sin muletillas ni divagaciones
- Enfocadas en responder exactamente lo que se pregunta

PREGUNTAS:
{questions}

FORMATO DE RESPUESTA (responde solo con las respuestas, una por línea):
A1: [tu respuesta directa y específica]
A2: [tu respuesta directa y específica]
A3: [tu respuesta directa y específica]
...

Recuerda: estás ESCRIBIENDO respuestas, no hablando. Sé preciso y directo.";

/// Default conversational-interview template.
pub const DEFAULT_INTERVIEW_TEMPLATE: &str = "\
Eres {user_name}, con el siguiente perfil:
{user_profile}

CONTEXTO DEL PRODUCTO:
{product_description}

SITUACIÓN DE LA INVESTIGACIÓN:
{research_description}

Vas a participar en una entrevista CONVERSACIONAL sobre tu experiencia. El entrevistador te hará {question_count} preguntas relacionadas con la investigación.

Como es una conversación oral, tus respuestas deben ser:
- Naturales y espontáneas (como cuando hablas en persona)
- Más elaboradas y explicativas que en un formulario escrito
- Pueden incluir ejemplos, anécdotas o contexto adicional
- Reflejan tu forma de hablar y expresarte

Genera tanto las preguntas del entrevistador como tus respuestas conversacionales.

FORMATO DE RESPUESTA:
P1: [pregunta del entrevistador]
R1: [tu respuesta conversacional como este usuario]

P2: [pregunta del entrevistador]
R2: [tu respuesta conversacional como este usuario]

...

Seed para variabilidad: {seed}

Recuerda: estás HABLANDO en una entrevista, no escribiendo. Sé natural y conversacional.";

/// Default aggregate-synthesis template. The raw per-respondent data block
/// is appended after rendering, not substituted into the template.
pub const DEFAULT_SYNTHESIS_TEMPLATE: &str = "\
Eres un investigador UX experto analizando respuestas de usuarios sintéticos.

CONTEXTO DE LA INVESTIGACIÓN:
Producto: {product_name}
Descripción: {product_description}

DATOS DE INVESTIGACIÓN:
- Descripción: {research_description}
- Objetivo: {research_objective}
- Preguntas clave: {research_questions}

DATOS RECOPILADOS:
Has recopilado respuestas de {user_name} sobre este producto. A continuación tienes los datos crudos de las respuestas por respondiente.

Analiza estos datos y genera un informe de investigación profesional que incluya:
- Resumen ejecutivo
- Hallazgos principales
- Patrones identificados entre usuarios
- Fricciones y barreras detectadas
- Necesidades y expectativas clave
- Recomendaciones accionables y priorizadas

Cita evidencias específicas de las respuestas cuando sea útil. Mantén un tono profesional y objetivo.";

// ============= Prompt Set =============

/// The four prompt templates a run uses, with per-template overrides
/// falling back to the built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptSet {
    /// Override for the profile-generation template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    /// Override for the questionnaire template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questionnaire: Option<String>,
    /// Override for the interview template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interview: Option<String>,
    /// Override for the synthesis template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthesis: Option<String>,
}

impl PromptSet {
    /// Profile template, override or default.
    pub fn profile(&self) -> &str {
        self.profile.as_deref().unwrap_or(DEFAULT_PROFILE_TEMPLATE)
    }

    /// Questionnaire template, override or default.
    pub fn questionnaire(&self) -> &str {
        self.questionnaire
            .as_deref()
            .unwrap_or(DEFAULT_QUESTIONNAIRE_TEMPLATE)
    }

    /// Interview template, override or default.
    pub fn interview(&self) -> &str {
        self.interview.as_deref().unwrap_or(DEFAULT_INTERVIEW_TEMPLATE)
    }

    /// Synthesis template, override or default.
    pub fn synthesis(&self) -> &str {
        self.synthesis.as_deref().unwrap_or(DEFAULT_SYNTHESIS_TEMPLATE)
    }
}

// ============= Context Builders =============

fn gender_label(gender: Gender) -> &'static str {
    match gender {
        Gender::Male => "Masculino",
        Gender::Female => "Femenino",
    }
}

fn insert_nonempty(ctx: &mut PromptContext, key: &str, value: &str) {
    // Blank dimensions are omitted so the renderer surfaces them as N/A.
    if !value.trim().is_empty() {
        ctx.insert(key.to_string(), value.to_string());
    }
}

/// Context for the profile template. Dimensions the descriptor does not
/// carry render as `N/A`.
pub fn profile_context(descriptor: &RespondentDescriptor) -> PromptContext {
    let mut ctx = PromptContext::new();
    insert_nonempty(&mut ctx, "archetype", &descriptor.archetype);
    insert_nonempty(&mut ctx, "behavior", &descriptor.behavior);
    insert_nonempty(&mut ctx, "needs", &descriptor.needs);
    insert_nonempty(&mut ctx, "barriers", &descriptor.barriers);
    if let Some(age) = descriptor.age {
        ctx.insert("age".to_string(), age.to_string());
    }
    if let Some(gender) = descriptor.gender {
        ctx.insert("gender".to_string(), gender_label(gender).to_string());
    }
    ctx
}

/// Context shared by the questionnaire and interview templates.
fn respondent_context(
    name: &str,
    profile_text: &str,
    product: &ProductContext,
    research: &ResearchContext,
) -> PromptContext {
    let mut ctx = PromptContext::new();
    ctx.insert("user_name".to_string(), name.to_string());
    ctx.insert("user_profile".to_string(), profile_text.to_string());
    insert_nonempty(&mut ctx, "product_name", &product.name);
    insert_nonempty(&mut ctx, "product_description", &product.description);
    insert_nonempty(&mut ctx, "research_description", &research.description);
    insert_nonempty(&mut ctx, "research_objective", &research.objective);
    ctx
}

/// Context for the questionnaire template: the questions are numbered and
/// joined into one `{questions}` block.
pub fn questionnaire_context(
    name: &str,
    profile_text: &str,
    product: &ProductContext,
    research: &ResearchContext,
    questions: &[String],
) -> PromptContext {
    let mut ctx = respondent_context(name, profile_text, product, research);
    let block = questions
        .iter()
        .enumerate()
        .map(|(i, q)| format!("{}. {}", i + 1, q))
        .collect::<Vec<_>>()
        .join("\n");
    ctx.insert("questions".to_string(), block);
    ctx
}

/// Context for the interview template. `question_count` is clamped into
/// `1..=12` here; the stored plan keeps the requested value. `seed` varies
/// per respondent so identical profiles do not yield identical transcripts.
pub fn interview_context(
    name: &str,
    profile_text: &str,
    product: &ProductContext,
    research: &ResearchContext,
    question_count: usize,
    seed_questions: &[String],
    seed: usize,
) -> PromptContext {
    let mut ctx = respondent_context(name, profile_text, product, research);
    let count = question_count.clamp(1, MAX_INTERVIEW_QUESTIONS);
    ctx.insert("question_count".to_string(), count.to_string());
    ctx.insert("seed".to_string(), seed.to_string());
    if !seed_questions.is_empty() {
        ctx.insert("seed_questions".to_string(), seed_questions.join("\n"));
    }
    ctx
}

/// Context for the synthesis template. `subject_label` is the run-level
/// respondent label, e.g. `1 respondent` or `5 respondents (Skeptic x3,
/// Personalizado x2)`.
pub fn synthesis_context(
    subject_label: &str,
    product: &ProductContext,
    research: &ResearchContext,
) -> PromptContext {
    let mut ctx = PromptContext::new();
    ctx.insert("user_name".to_string(), subject_label.to_string());
    insert_nonempty(&mut ctx, "product_name", &product.name);
    insert_nonempty(&mut ctx, "product_description", &product.description);
    insert_nonempty(&mut ctx, "research_description", &research.description);
    insert_nonempty(&mut ctx, "research_objective", &research.objective);
    insert_nonempty(&mut ctx, "research_questions", &research.questions);
    ctx
}
