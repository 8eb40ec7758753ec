//! Token sampling: repetition penalty, temperature, nucleus (top-p).

use anyhow::{Context, Result};
use candle_core::{DType, Tensor};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::prompt::PromptVariant;

/// Parameters controlling one generation pass.
///
/// `max_len` bounds the total sequence length, prompt included, matching
/// the upstream service contract. Exactly one sequence is sampled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingParams {
    /// Temperature for logit scaling. ~0.0 degenerates to greedy argmax.
    pub temperature: f64,
    /// Nucleus probability mass threshold.
    pub top_p: f64,
    /// Maximum total tokens (prompt + generated).
    pub max_len: usize,
    /// Multiplicative discount on every already-emitted token.
    pub repeat_penalty: f32,
    /// Fixed RNG seed. `None` draws from entropy; tests pin this for
    /// reproducible output.
    pub seed: Option<u64>,
}

impl SamplingParams {
    /// Defaults per prompt variant: the templated chat path runs longer
    /// and slightly cooler than the passthrough path.
    pub fn for_variant(variant: PromptVariant) -> Self {
        match variant {
            PromptVariant::Templated => Self {
                temperature: 0.7,
                top_p: 0.9,
                max_len: 350,
                repeat_penalty: 1.2,
                seed: None,
            },
            PromptVariant::Passthrough => Self {
                temperature: 0.8,
                top_p: 0.9,
                max_len: 300,
                repeat_penalty: 1.2,
                seed: None,
            },
        }
    }
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self::for_variant(PromptVariant::Templated)
    }
}

/// Sample one token from a logits tensor of shape `(1, vocab)` or `(vocab,)`.
///
/// Applies the repetition penalty over all previously emitted tokens,
/// scales by temperature, softmaxes, truncates to the smallest candidate
/// set reaching the top-p mass, and draws from it.
pub fn sample_token(
    logits: &Tensor,
    params: &SamplingParams,
    previous_tokens: &[u32],
    rng: &mut impl Rng,
) -> Result<u32> {
    let logits = if logits.dims().len() > 1 {
        logits.squeeze(0)?
    } else {
        logits.clone()
    };
    let mut logits_vec: Vec<f32> = logits
        .to_dtype(DType::F32)?
        .to_vec1()
        .context("failed to extract logits to vec")?;

    // Repetition penalty over the whole emitted history.
    if params.repeat_penalty != 1.0 {
        for &tok in previous_tokens {
            let idx = tok as usize;
            if idx < logits_vec.len() {
                let score = logits_vec[idx];
                logits_vec[idx] = if score > 0.0 {
                    score / params.repeat_penalty
                } else {
                    score * params.repeat_penalty
                };
            }
        }
    }

    // Greedy short-circuit for near-zero temperature.
    if params.temperature < 1e-7 {
        let (best_idx, _) = logits_vec
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .context("empty logits")?;
        return Ok(best_idx as u32);
    }

    let inv_temp = 1.0 / params.temperature as f32;
    for v in logits_vec.iter_mut() {
        *v *= inv_temp;
    }

    // Softmax over candidates sorted descending by logit.
    let mut indexed: Vec<(usize, f32)> = logits_vec.iter().copied().enumerate().collect();
    indexed.sort_unstable_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let max_logit = indexed.first().context("empty logits")?.1;
    let mut probs: Vec<(usize, f32)> = indexed
        .iter()
        .map(|&(i, l)| (i, (l - max_logit).exp()))
        .collect();
    let sum: f32 = probs.iter().map(|(_, p)| p).sum();
    for (_, p) in probs.iter_mut() {
        *p /= sum;
    }

    // Nucleus truncation: smallest prefix reaching the top-p mass.
    if params.top_p < 1.0 {
        let mut cumsum = 0.0f32;
        let mut cutoff = probs.len();
        for (i, &(_, p)) in probs.iter().enumerate() {
            cumsum += p;
            if cumsum >= params.top_p as f32 {
                cutoff = i + 1;
                break;
            }
        }
        probs.truncate(cutoff);
    }

    // Weighted draw.
    let total: f32 = probs.iter().map(|(_, p)| p).sum();
    let r: f32 = rng.gen::<f32>() * total;

    let mut acc = 0.0f32;
    for &(idx, p) in &probs {
        acc += p;
        if acc >= r {
            return Ok(idx as u32);
        }
    }

    Ok(probs.last().map(|(idx, _)| *idx as u32).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn greedy() -> SamplingParams {
        SamplingParams {
            temperature: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn greedy_picks_max() {
        let logits = Tensor::new(&[1.0f32, 5.0, 3.0, 2.0], &Device::Cpu).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let tok = sample_token(&logits, &greedy(), &[], &mut rng).unwrap();
        assert_eq!(tok, 1);
    }

    #[test]
    fn accepts_batched_logits() {
        let logits = Tensor::new(&[[1.0f32, 5.0, 3.0, 2.0]], &Device::Cpu).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let tok = sample_token(&logits, &greedy(), &[], &mut rng).unwrap();
        assert_eq!(tok, 1);
    }

    #[test]
    fn repeat_penalty_suppresses_emitted_tokens() {
        // Token 1 has the highest logit but was already emitted.
        let logits = Tensor::new(&[4.9f32, 5.0, 0.0, 0.0], &Device::Cpu).unwrap();
        let params = SamplingParams {
            temperature: 0.0,
            repeat_penalty: 100.0,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(0);
        let tok = sample_token(&logits, &params, &[1], &mut rng).unwrap();
        assert_eq!(tok, 0);
    }

    #[test]
    fn nucleus_restricts_to_dominant_token() {
        // One token carries essentially all the mass, so any draw under
        // top_p = 0.9 must return it.
        let logits = Tensor::new(&[20.0f32, 0.0, 0.0, 0.0], &Device::Cpu).unwrap();
        let params = SamplingParams::default();
        for seed in 0..16 {
            let mut rng = StdRng::seed_from_u64(seed);
            let tok = sample_token(&logits, &params, &[], &mut rng).unwrap();
            assert_eq!(tok, 0);
        }
    }

    #[test]
    fn same_seed_same_draw() {
        let logits = Tensor::new(&[1.0f32, 1.1, 0.9, 1.05, 1.02], &Device::Cpu).unwrap();
        let params = SamplingParams::default();
        let a = sample_token(&logits, &params, &[], &mut StdRng::seed_from_u64(7)).unwrap();
        let b = sample_token(&logits, &params, &[], &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn sampled_token_is_in_vocab() {
        let logits = Tensor::new(&[0.3f32, 0.2, 0.1, 0.4], &Device::Cpu).unwrap();
        let params = SamplingParams::default();
        for seed in 0..32 {
            let mut rng = StdRng::seed_from_u64(seed);
            let tok = sample_token(&logits, &params, &[], &mut rng).unwrap();
            assert!(tok < 4);
        }
    }
}
