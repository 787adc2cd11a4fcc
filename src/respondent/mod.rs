//! Synthetic respondent: a descriptor plus its lazily generated profile.

use crate::llm::Gateway;
use crate::prompts::{profile_context, render};
use crate::types::{RespondentDescriptor, Result, CUSTOM_ARCHETYPE};

/// Display name used when the archetype carries no usable label.
pub const GENERIC_DISPLAY_NAME: &str = "Usuario";

/// Profile generated for one respondent, cached on the instance.
#[derive(Debug, Clone)]
pub struct GeneratedProfile {
    /// Display name derived from the archetype.
    pub name: String,
    /// LLM-generated detailed profile text.
    pub profile_text: String,
}

/// One synthetic study participant.
///
/// The profile is generated at most once per instance; repeated calls to
/// [`generate_profile`](Self::generate_profile) return the cached result
/// without another LLM call.
pub struct SyntheticRespondent {
    descriptor: RespondentDescriptor,
    profile: Option<GeneratedProfile>,
}

impl SyntheticRespondent {
    pub fn new(descriptor: RespondentDescriptor) -> Self {
        Self {
            descriptor,
            profile: None,
        }
    }

    /// The basic profile this respondent was expanded from.
    pub fn descriptor(&self) -> &RespondentDescriptor {
        &self.descriptor
    }

    /// Archetype-derived display name. The custom-archetype sentinel and
    /// blank labels map to the generic name.
    pub fn display_name(&self) -> String {
        let archetype = self.descriptor.archetype.trim();
        if archetype.is_empty()
            || archetype.eq_ignore_ascii_case(CUSTOM_ARCHETYPE)
            || archetype.eq_ignore_ascii_case("custom")
        {
            GENERIC_DISPLAY_NAME.to_string()
        } else {
            archetype.to_string()
        }
    }

    /// The cached profile, if one was generated.
    pub fn profile(&self) -> Option<&GeneratedProfile> {
        self.profile.as_ref()
    }

    /// Render the profile template from the descriptor (absent dimensions
    /// surface as `N/A`), make one generation call, and cache the result.
    pub async fn generate_profile(
        &mut self,
        gateway: &Gateway,
        template: &str,
    ) -> Result<&GeneratedProfile> {
        if self.profile.is_none() {
            let prompt = render(template, &profile_context(&self.descriptor));
            let profile_text = gateway.generate(&prompt).await?;
            self.profile = Some(GeneratedProfile {
                name: self.display_name(),
                profile_text,
            });
        }
        match &self.profile {
            Some(profile) => Ok(profile),
            None => Err(crate::types::AppError::Internal(
                "profile cache unexpectedly empty".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn respondent(archetype: &str) -> SyntheticRespondent {
        SyntheticRespondent::new(RespondentDescriptor {
            archetype: archetype.to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn archetype_is_the_display_name() {
        assert_eq!(respondent("Skeptic").display_name(), "Skeptic");
    }

    #[test]
    fn sentinel_and_blank_archetypes_get_the_generic_name() {
        assert_eq!(respondent("").display_name(), GENERIC_DISPLAY_NAME);
        assert_eq!(respondent("   ").display_name(), GENERIC_DISPLAY_NAME);
        assert_eq!(respondent("Personalizado").display_name(), GENERIC_DISPLAY_NAME);
        assert_eq!(respondent("personalizado").display_name(), GENERIC_DISPLAY_NAME);
        assert_eq!(respondent("Custom").display_name(), GENERIC_DISPLAY_NAME);
    }
}
