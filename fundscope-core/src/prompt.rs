//! Prompt construction for the recommendation task.

use serde::{Deserialize, Serialize};

use crate::sampling::SamplingParams;

/// How raw profile text is turned into a model prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromptVariant {
    /// Wrap the profile in the funding-advisor instruction frame with a
    /// trailing extraction marker. For instruction-tuned chat models.
    Templated,
    /// Use the raw profile verbatim. For plain base models.
    Passthrough,
}

const TEMPLATE_PREFIX: &str = "You are an expert funding advisor. Based on the following company profile, \
     provide a concise, structured funding recommendation. Do not repeat the input. \
     Only output the recommendation without any extra preamble.\n";

/// Build the model prompt for the given variant.
///
/// The input is passed through untouched and untruncated; clipping to the
/// model's context window happens implicitly at tokenization.
pub fn build_prompt(variant: PromptVariant, profile: &str) -> String {
    match variant {
        PromptVariant::Templated => {
            let marker = crate::output::RECOMMENDATION_MARKER;
            format!("{TEMPLATE_PREFIX}Company Profile: \"{profile}\"\n{marker} ")
        }
        PromptVariant::Passthrough => profile.to_string(),
    }
}

/// One immutable generation request: profile text, prompt policy, and the
/// sampling configuration that goes with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub profile: String,
    pub variant: PromptVariant,
    pub params: SamplingParams,
}

impl GenerationRequest {
    /// Build a request with the variant's default sampling parameters.
    pub fn new(profile: impl Into<String>, variant: PromptVariant) -> Self {
        Self {
            profile: profile.into(),
            variant,
            params: SamplingParams::for_variant(variant),
        }
    }

    /// The prompt string actually fed to the model.
    pub fn prompt(&self) -> String {
        build_prompt(self.variant, &self.profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::RECOMMENDATION_MARKER;

    #[test]
    fn templated_prompt_contains_profile_and_marker() {
        let prompt = build_prompt(PromptVariant::Templated, "AI startup, pre-revenue");
        assert!(prompt.contains("Company Profile: \"AI startup, pre-revenue\""));
        assert!(prompt.trim_end().ends_with(RECOMMENDATION_MARKER));
    }

    #[test]
    fn templated_prompt_is_never_shorter_than_input() {
        for profile in ["", "x", "a much longer company profile text"] {
            let prompt = build_prompt(PromptVariant::Templated, profile);
            assert!(prompt.len() >= profile.len());
        }
    }

    #[test]
    fn passthrough_is_identity() {
        let profile = "Fintech, 12 employees, $1M ARR";
        assert_eq!(build_prompt(PromptVariant::Passthrough, profile), profile);
    }

    #[test]
    fn request_picks_variant_defaults() {
        let templated = GenerationRequest::new("p", PromptVariant::Templated);
        let passthrough = GenerationRequest::new("p", PromptVariant::Passthrough);
        assert_eq!(templated.params.max_len, 350);
        assert_eq!(passthrough.params.max_len, 300);
        assert!(templated.params.temperature < passthrough.params.temperature);
    }
}
