//! Respondent Expander
//!
//! Turns a [`PopulationSpec`] into the concrete ordered list of
//! [`RespondentDescriptor`]s a run executes against.
//!
//! Population mode replicates each mix entry `count` times in input order,
//! reconciles the result against the authoritative `size` (truncate or pad
//! with default descriptors), and only then runs the demographic pass, so
//! age/gender variability is orthogonal to the archetype mix. Invalid
//! input is defensively normalized (counts clamped to zero, inverted age
//! ranges swapped), never rejected.

use crate::types::{Gender, RespondentDescriptor};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Demographic variability applied to an expanded population.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Demographics {
    /// Lower bound of the uniform age range (swapped if above `age_max`).
    #[serde(default = "default_age_min")]
    pub age_min: u32,
    /// Upper bound of the uniform age range.
    #[serde(default = "default_age_max")]
    pub age_max: u32,
    /// Fraction of males in the population, clamped into `[0, 1]`.
    /// Exactly `round(size * male_fraction)` respondents are male.
    #[serde(default = "default_male_fraction")]
    pub male_fraction: f64,
}

fn default_age_min() -> u32 {
    25
}

fn default_age_max() -> u32 {
    55
}

fn default_male_fraction() -> f64 {
    0.5
}

impl Default for Demographics {
    fn default() -> Self {
        Self {
            age_min: default_age_min(),
            age_max: default_age_max(),
            male_fraction: default_male_fraction(),
        }
    }
}

/// One archetype entry in a population mix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixEntry {
    /// Archetype label replicated into each expanded descriptor.
    pub archetype: String,
    /// How many respondents to instantiate from this entry. Negative
    /// values are treated as zero.
    #[serde(default)]
    pub count: i64,
    /// Behavior dimension copied into each descriptor.
    #[serde(default)]
    pub behavior: String,
    /// Needs dimension copied into each descriptor.
    #[serde(default)]
    pub needs: String,
    /// Barriers dimension copied into each descriptor.
    #[serde(default)]
    pub barriers: String,
}

impl MixEntry {
    fn descriptor(&self) -> RespondentDescriptor {
        RespondentDescriptor {
            archetype: self.archetype.clone(),
            behavior: self.behavior.clone(),
            needs: self.needs.clone(),
            barriers: self.barriers.clone(),
            age: None,
            gender: None,
        }
    }
}

/// Population-mode configuration: size, archetype mix, and optional
/// demographic variability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Authoritative respondent count. The mix is truncated or padded to
    /// match this exactly.
    #[serde(default = "default_population_size")]
    pub size: usize,
    /// Archetype mix, replicated in input order.
    #[serde(default)]
    pub mix: Vec<MixEntry>,
    /// Optional demographic pass applied after mix expansion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demographics: Option<Demographics>,
}

fn default_population_size() -> usize {
    10
}

/// User specification for a run: one explicit respondent, or a population
/// expanded from an archetype mix.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum PopulationSpec {
    /// A single respondent with explicit dimensions.
    Single {
        /// The respondent's basic profile.
        #[serde(default)]
        respondent: RespondentDescriptor,
    },
    /// A population expanded from a mix of archetypes.
    Population {
        /// Population parameters.
        #[serde(flatten)]
        config: PopulationConfig,
    },
}

impl PopulationSpec {
    /// Expand the spec into the effective ordered respondent list.
    ///
    /// `Single` returns a one-element list. `Population` always returns
    /// exactly `size` descriptors (size zero is lifted to one: a run with
    /// no respondents is meaningless).
    pub fn expand(&self) -> Vec<RespondentDescriptor> {
        match self {
            PopulationSpec::Single { respondent } => vec![respondent.clone()],
            PopulationSpec::Population { config } => expand_population(config),
        }
    }
}

fn expand_population(config: &PopulationConfig) -> Vec<RespondentDescriptor> {
    let size = config.size.max(1);

    let mut respondents: Vec<RespondentDescriptor> = Vec::with_capacity(size);
    for entry in &config.mix {
        let count = entry.count.max(0) as usize;
        for _ in 0..count {
            respondents.push(entry.descriptor());
        }
    }

    // The configured size wins over the mix totals.
    if respondents.len() > size {
        respondents.truncate(size);
    } else {
        while respondents.len() < size {
            respondents.push(RespondentDescriptor::default());
        }
    }

    if let Some(demographics) = &config.demographics {
        apply_demographics(&mut respondents, demographics);
    }

    respondents
}

/// Assign age and gender to every descriptor, padded ones included.
///
/// Runs after mix expansion so demographics stay uncorrelated with the
/// archetype assignment.
fn apply_demographics(respondents: &mut [RespondentDescriptor], demographics: &Demographics) {
    let mut rng = rand::rng();
    let n = respondents.len();

    let (lo, hi) = if demographics.age_max < demographics.age_min {
        (demographics.age_max, demographics.age_min)
    } else {
        (demographics.age_min, demographics.age_max)
    };

    let male_fraction = demographics.male_fraction.clamp(0.0, 1.0);
    let male_count = ((n as f64 * male_fraction).round() as usize).min(n);
    let mut genders: Vec<Gender> = Vec::with_capacity(n);
    genders.extend(std::iter::repeat_n(Gender::Male, male_count));
    genders.extend(std::iter::repeat_n(Gender::Female, n - male_count));
    genders.shuffle(&mut rng);

    for (respondent, gender) in respondents.iter_mut().zip(genders) {
        respondent.age = Some(rng.random_range(lo..=hi));
        respondent.gender = Some(gender);
    }
}
