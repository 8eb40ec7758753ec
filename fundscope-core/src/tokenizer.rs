//! Wrapper around the HuggingFace `tokenizers` crate.
//!
//! Encoding, decoding and end-of-sequence detection for Llama-family
//! tokenizers loaded from a `tokenizer.json` file.

use anyhow::Result;
use tokenizers::Tokenizer;

/// A tokenizer plus the resolved end-of-sequence token ID.
pub struct TokenizerWrapper {
    inner: Tokenizer,
    eos_token_id: Option<u32>,
}

impl TokenizerWrapper {
    /// Build from a `tokenizers::Tokenizer`, resolving the EOS token ID
    /// from the vocabulary when one of the common names is present.
    pub fn new(tokenizer: Tokenizer) -> Self {
        let eos_token_id = tokenizer
            .token_to_id("</s>")
            .or_else(|| tokenizer.token_to_id("<|endoftext|>"))
            .or_else(|| tokenizer.token_to_id("<|im_end|>"));
        Self {
            inner: tokenizer,
            eos_token_id,
        }
    }

    /// Load from a local `tokenizer.json` file.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            anyhow::anyhow!("failed to load tokenizer from {}: {e}", path.display())
        })?;
        Ok(Self::new(tokenizer))
    }

    /// Override the EOS token ID (the model config is authoritative when
    /// it disagrees with the vocabulary lookup).
    pub fn set_eos_token_id(&mut self, id: u32) {
        self.eos_token_id = Some(id);
    }

    /// Encode text to token IDs. With `add_special` the tokenizer
    /// prepends BOS per its own configuration.
    pub fn encode(&self, text: &str, add_special: bool) -> Result<Vec<u32>> {
        let encoding = self
            .inner
            .encode(text, add_special)
            .map_err(|e| anyhow::anyhow!("tokenizer encode error: {e}"))?;
        Ok(encoding.get_ids().to_vec())
    }

    /// Decode token IDs back to text, optionally dropping special tokens.
    pub fn decode(&self, tokens: &[u32], skip_special: bool) -> Result<String> {
        self.inner
            .decode(tokens, skip_special)
            .map_err(|e| anyhow::anyhow!("tokenizer decode error: {e}"))
    }

    /// Whether a token is the end-of-sequence marker.
    pub fn is_eos(&self, token: u32) -> bool {
        self.eos_token_id.map_or(false, |eos| token == eos)
    }

    pub fn eos_token_id(&self) -> Option<u32> {
        self.eos_token_id
    }

    pub fn inner(&self) -> &Tokenizer {
        &self.inner
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokenizers::models::wordlevel::WordLevel;

    /// A tiny word-level tokenizer for exercising the generation loop
    /// without model artifacts. Token 0 is `<unk>`, the rest are plain
    /// words; callers pick an EOS ID explicitly.
    pub(crate) fn toy_tokenizer(words: &[&str]) -> TokenizerWrapper {
        let mut vocab = HashMap::new();
        vocab.insert("<unk>".to_string(), 0u32);
        for (i, w) in words.iter().enumerate() {
            vocab.insert((*w).to_string(), (i + 1) as u32);
        }
        let model = WordLevel::builder()
            .vocab(vocab.into_iter().collect())
            .unk_token("<unk>".to_string())
            .build()
            .unwrap();
        TokenizerWrapper::new(Tokenizer::new(model))
    }

    #[test]
    fn encode_decode_round_trip() {
        let tok = toy_tokenizer(&["seed", "growth", "series"]);
        let ids = tok.encode("growth", false).unwrap();
        assert_eq!(ids, vec![2]);
        let text = tok.decode(&ids, true).unwrap();
        assert_eq!(text, "growth");
    }

    #[test]
    fn eos_override_wins() {
        let mut tok = toy_tokenizer(&["seed"]);
        assert!(!tok.is_eos(1));
        tok.set_eos_token_id(1);
        assert!(tok.is_eos(1));
        assert!(!tok.is_eos(0));
    }
}
