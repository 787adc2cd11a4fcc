//! Study configuration file (TOML) loaded by the CLI.

use crate::llm::GatewayConfig;
use crate::planner::ResearchStyle;
use crate::population::PopulationSpec;
use crate::prompts::PromptSet;
use crate::types::{AppError, ProductContext, ResearchContext, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where run artifacts are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for all runs.
    #[serde(default = "default_root")]
    pub root: PathBuf,
}

fn default_root() -> PathBuf {
    PathBuf::from("results")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
        }
    }
}

/// Everything one study run needs, deserialized from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyConfig {
    /// Product under investigation.
    #[serde(default)]
    pub product: ProductContext,
    /// Research brief.
    #[serde(default)]
    pub research: ResearchContext,
    /// Who to run the study against.
    #[serde(default = "default_population")]
    pub population: PopulationSpec,
    /// LLM backend and throttling.
    #[serde(default)]
    pub llm: GatewayConfig,
    /// Artifact output location.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Prompt template overrides.
    #[serde(default)]
    pub prompts: PromptSet,
}

fn default_population() -> PopulationSpec {
    PopulationSpec::Single {
        respondent: Default::default(),
    }
}

impl StudyConfig {
    /// Load and validate a study file. All validation failures surface
    /// here, before any LLM call.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::Configuration(format!("cannot read study file '{}': {e}", path.display()))
        })?;
        let config: StudyConfig = toml::from_str(&raw).map_err(|e| {
            AppError::Configuration(format!("invalid study file '{}': {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject studies that cannot produce a meaningful plan or synthesis.
    pub fn validate(&self) -> Result<()> {
        if self.research.is_empty() {
            return Err(AppError::Configuration(
                "the study needs a research description, objective, or questions".to_string(),
            ));
        }
        // Catch an unknown style label up front rather than at plan time.
        self.style()?;
        Ok(())
    }

    /// Parsed research style; absent or empty means the default.
    pub fn style(&self) -> Result<ResearchStyle> {
        self.research.style.as_deref().unwrap_or("").parse()
    }
}

/// Sample study file written by `sondeo init`.
pub const SAMPLE_STUDY: &str = r#"# Sondeo study file

[product]
name = "Asistente de compras"
description = "Asistente conversacional que ayuda a comparar productos y precios."

[research]
description = """
Exploramos la primera experiencia de uso del asistente.
- ¿Qué esperabas que hiciera el asistente?
- ¿Qué te generó desconfianza?
"""
objective = "Entender fricciones de adopción en la primera sesión."
questions = ""
style = "interview"

[population]
mode = "population"
size = 5

[[population.mix]]
archetype = "Escéptico"
count = 3
behavior = "Compara opciones y desconfía de las recomendaciones automáticas"
needs = "Transparencia sobre por qué se recomienda algo"
barriers = "Miedo a perder el control de la decisión"

[[population.mix]]
archetype = "Early Adopter"
count = 2
behavior = "Prueba herramientas nuevas apenas salen"
needs = "Velocidad y novedad"
barriers = "Se aburre si el producto no sorprende"

[population.demographics]
age_min = 25
age_max = 55
male_fraction = 0.5

[llm]
min_delay_ms = 0

[llm.provider]
provider = "ollama"
base_url = "http://127.0.0.1:11434"
model = "llama3.2:latest"

[storage]
root = "results"
"#;
