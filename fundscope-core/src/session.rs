//! The model session and the autoregressive generation loop.

use anyhow::{bail, Result};
use candle_core::Tensor;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::device::ExecutionTarget;
use crate::model::Model;
use crate::output::{extract_recommendation, GenerationResult, RECOMMENDATION_MARKER};
use crate::prompt::GenerationRequest;
use crate::sampling::{sample_token, SamplingParams};
use crate::tokenizer::TokenizerWrapper;
use crate::GenerateOutput;

/// Tokenizer and weight-loaded model bound to one execution target.
///
/// Exactly one session exists per process: the invocation shell builds
/// it, runs one request through it and drops it on exit. Nothing here is
/// shared or reloaded.
pub struct ModelSession {
    model: Box<dyn Model>,
    tokenizer: TokenizerWrapper,
    target: ExecutionTarget,
}

impl ModelSession {
    /// Bind a loaded model and tokenizer together. The model config's
    /// EOS id takes precedence over the tokenizer vocabulary lookup.
    pub fn new(
        model: Box<dyn Model>,
        mut tokenizer: TokenizerWrapper,
        target: ExecutionTarget,
    ) -> Self {
        if let Some(eos) = model.eos_token_id() {
            tokenizer.set_eos_token_id(eos);
        }
        Self {
            model,
            tokenizer,
            target,
        }
    }

    pub fn target(&self) -> ExecutionTarget {
        self.target
    }

    pub fn tokenizer(&self) -> &TokenizerWrapper {
        &self.tokenizer
    }

    /// Run one sampling-based generation pass for `prompt`.
    ///
    /// The decoded `text` covers the prompt plus the generation, so the
    /// template marker survives for downstream extraction. Control tokens
    /// are dropped during decoding.
    pub fn generate(&mut self, prompt: &str, params: &SamplingParams) -> Result<GenerateOutput> {
        let prompt_tokens = self.tokenizer.encode(prompt, true)?;
        if prompt_tokens.is_empty() {
            bail!("prompt produced no tokens");
        }

        let mut rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let generated = self.generate_from_tokens(&prompt_tokens, params, &mut rng)?;

        let mut all_tokens = prompt_tokens.clone();
        all_tokens.extend_from_slice(&generated);
        let text = self.tokenizer.decode(&all_tokens, true)?;

        Ok(GenerateOutput {
            text,
            tokens: generated,
            prompt_tokens: prompt_tokens.len(),
            generated_tokens: all_tokens.len() - prompt_tokens.len(),
        })
    }

    /// Full pipeline for one request: build prompt, generate, extract the
    /// recommendation after the template marker (falling back to the whole
    /// trimmed text when no marker is present, as with passthrough).
    pub fn recommend(&mut self, request: &GenerationRequest) -> Result<GenerationResult> {
        let prompt = request.prompt();
        let output = self.generate(&prompt, &request.params)?;
        let recommendation = extract_recommendation(&output.text, RECOMMENDATION_MARKER);
        Ok(GenerationResult {
            text: output.text,
            recommendation,
        })
    }

    /// Prefill + decode loop, stopping on EOS or the total-length budget.
    fn generate_from_tokens(
        &mut self,
        prompt_tokens: &[u32],
        params: &SamplingParams,
        rng: &mut StdRng,
    ) -> Result<Vec<u32>> {
        let device = self.model.device().clone();
        let limit = params.max_len.min(self.model.max_seq_len());

        let mut all_tokens = prompt_tokens.to_vec();
        let mut generated = Vec::new();
        if all_tokens.len() >= limit {
            tracing::warn!(
                prompt = all_tokens.len(),
                limit,
                "prompt fills the length budget, nothing to generate"
            );
            return Ok(generated);
        }

        // Prefill: full prompt in one forward pass.
        let input = Tensor::new(prompt_tokens, &device)?.unsqueeze(0)?;
        let logits = self.model.forward(&input, 0)?;
        let mut next_token = sample_token(&logits, params, &all_tokens, rng)?;

        loop {
            if self.tokenizer.is_eos(next_token) {
                break;
            }
            all_tokens.push(next_token);
            generated.push(next_token);
            if all_tokens.len() >= limit {
                break;
            }

            // Decode: one token at a time, feeding back the last sample.
            let pos = all_tokens.len() - 1;
            let input = Tensor::new(&[next_token], &device)?.unsqueeze(0)?;
            let logits = self.model.forward(&input, pos)?;
            next_token = sample_token(&logits, params, &all_tokens, rng)?;
        }

        Ok(generated)
    }
}
