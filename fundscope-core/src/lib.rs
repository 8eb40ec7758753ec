//! FundScope Core -- single-turn funding recommendation inference.
//!
//! Drives a pretrained causal language model (Llama architecture, loaded
//! from HuggingFace Hub via Candle) through one generation pass: select a
//! device, load tokenizer + weights, build a prompt around the user's
//! company profile, sample a completion, and extract the recommendation
//! text after the template marker.

pub mod device;
pub mod model;
pub mod output;
pub mod prompt;
pub mod sampling;
pub mod session;
pub mod tokenizer;

pub use device::ExecutionTarget;
pub use model::{Model, ModelConfig};
pub use output::{extract_recommendation, GenerationResult, Recommendation, RECOMMENDATION_MARKER};
pub use prompt::{build_prompt, GenerationRequest, PromptVariant};
pub use sampling::{sample_token, SamplingParams};
pub use session::ModelSession;
pub use tokenizer::TokenizerWrapper;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Output from a single generation call.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GenerateOutput {
    /// Decoded text of the full sequence, prompt echo included.
    pub text: String,
    /// The generated token IDs (prompt tokens excluded).
    pub tokens: Vec<u32>,
    pub prompt_tokens: usize,
    pub generated_tokens: usize,
}
