//! Extraction of the recommendation from decoded model output.

use serde::{Deserialize, Serialize};

/// Marker the templated prompt plants in front of the answer. The model's
/// decoded output echoes the prompt, so everything after the first
/// occurrence is the recommendation proper.
pub const RECOMMENDATION_MARKER: &str = "Funding Recommendation:";

/// Result of one full recommendation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Full decoded text, template echo included.
    pub text: String,
    /// The extracted recommendation.
    pub recommendation: String,
}

/// The JSON object emitted on stdout: `{"recommendation": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub recommendation: String,
}

/// Return the text strictly after the first occurrence of `marker`,
/// trimmed. A missing marker is not an error: the whole trimmed text is
/// the recommendation (always the case for passthrough prompts).
pub fn extract_recommendation(full_text: &str, marker: &str) -> String {
    match full_text.split_once(marker) {
        Some((_, rest)) => rest.trim().to_string(),
        None => full_text.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_present_returns_trimmed_suffix() {
        let text = "echoed prompt...\nFunding Recommendation:  Raise a seed round. \n";
        assert_eq!(
            extract_recommendation(text, RECOMMENDATION_MARKER),
            "Raise a seed round."
        );
    }

    #[test]
    fn marker_absent_returns_whole_trimmed_text() {
        let text = "  the model chose to ramble instead  ";
        assert_eq!(
            extract_recommendation(text, RECOMMENDATION_MARKER),
            "the model chose to ramble instead"
        );
    }

    #[test]
    fn bare_marker_yields_empty_string() {
        assert_eq!(
            extract_recommendation("Funding Recommendation: ", RECOMMENDATION_MARKER),
            ""
        );
    }

    #[test]
    fn splits_on_first_occurrence_only() {
        let text = "Funding Recommendation: first\nFunding Recommendation: second";
        assert_eq!(
            extract_recommendation(text, RECOMMENDATION_MARKER),
            "first\nFunding Recommendation: second"
        );
    }

    #[test]
    fn empty_input_yields_empty_string() {
        assert_eq!(extract_recommendation("", RECOMMENDATION_MARKER), "");
    }

    #[test]
    fn recommendation_serializes_to_the_contract_shape() {
        let line = serde_json::to_string(&Recommendation {
            recommendation: "Bootstrap for now.".to_string(),
        })
        .unwrap();
        assert_eq!(line, r#"{"recommendation":"Bootstrap for now."}"#);
    }
}
