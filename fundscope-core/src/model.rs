//! Model configuration and loading.
//!
//! Resolves a HuggingFace model ID to tokenizer + safetensors weights
//! (downloading through `hf-hub` with optional access token for gated
//! repos) and instantiates `candle_transformers::models::llama::Llama`
//! at the precision the execution target calls for.

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::llama::{Cache, Config, Llama, LlamaConfig, LlamaEosToks};
use hf_hub::api::sync::{ApiBuilder, ApiRepo};
use hf_hub::{Repo, RepoType};
use serde::{Deserialize, Serialize};

use crate::device::ExecutionTarget;
use crate::prompt::PromptVariant;
use crate::tokenizer::TokenizerWrapper;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Deployment-time model choice: identifier, credential requirement and
/// prompt policy move together as one axis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// HuggingFace repo ID (e.g. "meta-llama/Llama-2-7b-chat-hf").
    pub model_id: String,

    /// Repo revision / branch. Default: "main".
    pub revision: Option<String>,

    /// Whether the repo is licence-gated and refuses anonymous downloads.
    pub requires_auth: bool,

    /// Access token for gated repos. When unset, `HF_TOKEN` from the
    /// environment is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// How user text becomes a prompt for this model.
    pub variant: PromptVariant,
}

impl ModelConfig {
    /// The gated Llama-2 7B chat model with the instruction template.
    pub fn llama2_chat() -> Self {
        Self {
            model_id: "meta-llama/Llama-2-7b-chat-hf".to_string(),
            revision: None,
            requires_auth: true,
            auth_token: None,
            variant: PromptVariant::Templated,
        }
    }

    /// A small public chat model, prompted verbatim. Useful where no
    /// access credential is available.
    pub fn public_small() -> Self {
        Self {
            model_id: "TinyLlama/TinyLlama-1.1B-Chat-v1.0".to_string(),
            revision: None,
            requires_auth: false,
            auth_token: None,
            variant: PromptVariant::Passthrough,
        }
    }

    /// Resolve the access token: explicit config first, then `HF_TOKEN`.
    fn token(&self) -> Option<String> {
        self.auth_token
            .clone()
            .or_else(|| std::env::var("HF_TOKEN").ok())
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::llama2_chat()
    }
}

// ---------------------------------------------------------------------------
// Model trait
// ---------------------------------------------------------------------------

/// A loaded, device-placed causal language model.
pub trait Model: Send {
    /// Forward pass: input token IDs `(batch=1, seq_len)` starting at
    /// `position`, returning logits `(1, vocab_size)` for the last
    /// position. No gradients are tracked.
    fn forward(&mut self, input_ids: &Tensor, position: usize) -> Result<Tensor>;

    /// Device the weights live on.
    fn device(&self) -> &Device;

    /// Maximum context length the model supports.
    fn max_seq_len(&self) -> usize;

    /// End-of-sequence token ID from the model config, when declared.
    fn eos_token_id(&self) -> Option<u32>;
}

/// Llama-family model with its KV cache.
pub struct LlamaChat {
    llama: Llama,
    cache: Cache,
    device: Device,
    max_seq_len: usize,
    eos_token_id: Option<u32>,
}

impl Model for LlamaChat {
    fn forward(&mut self, input_ids: &Tensor, position: usize) -> Result<Tensor> {
        let logits = self
            .llama
            .forward(input_ids, position, &mut self.cache)
            .context("llama forward pass")?;
        Ok(logits)
    }

    fn device(&self) -> &Device {
        &self.device
    }

    fn max_seq_len(&self) -> usize {
        self.max_seq_len
    }

    fn eos_token_id(&self) -> Option<u32> {
        self.eos_token_id
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Open the hub repo described by `config`, wiring in the access token.
///
/// A gated config with no resolvable token fails here, before any network
/// traffic, so the missing-credential case surfaces as a configuration
/// error rather than a download failure.
fn hub_repo(config: &ModelConfig) -> Result<ApiRepo> {
    let token = config.token();
    if config.requires_auth && token.is_none() {
        bail!(
            "model '{}' is licence-gated; set HF_TOKEN or ModelConfig::auth_token",
            config.model_id
        );
    }

    let api = ApiBuilder::new()
        .with_token(token)
        .build()
        .context("failed to initialize HuggingFace Hub API")?;

    let revision = config.revision.clone().unwrap_or_else(|| "main".to_string());
    Ok(api.repo(Repo::with_revision(
        config.model_id.clone(),
        RepoType::Model,
        revision,
    )))
}

/// Fetch-or-reuse `tokenizer.json` for the configured model.
pub fn load_tokenizer(config: &ModelConfig) -> Result<TokenizerWrapper> {
    let repo = hub_repo(config)?;
    tracing::info!(model = %config.model_id, "loading tokenizer");
    let tok_path = repo.get("tokenizer.json").with_context(|| {
        format!("failed to download tokenizer.json from {}", config.model_id)
    })?;
    TokenizerWrapper::from_file(&tok_path)
}

/// Locate the safetensors weight files in the repo: a single
/// `model.safetensors`, else every shard named by
/// `model.safetensors.index.json`.
fn resolve_weight_files(repo: &ApiRepo, model_id: &str) -> Result<Vec<PathBuf>> {
    if let Ok(single) = repo.get("model.safetensors") {
        return Ok(vec![single]);
    }

    let index_path = repo.get("model.safetensors.index.json").with_context(|| {
        format!("no model.safetensors or index found in {model_id}")
    })?;
    let index: serde_json::Value = serde_json::from_reader(
        std::fs::File::open(&index_path)
            .with_context(|| format!("cannot open {}", index_path.display()))?,
    )
    .context("failed to parse safetensors index")?;

    let weight_map = index
        .get("weight_map")
        .and_then(|v| v.as_object())
        .context("safetensors index has no weight_map")?;
    let shards: BTreeSet<&str> = weight_map.values().filter_map(|v| v.as_str()).collect();
    if shards.is_empty() {
        bail!("safetensors index of {model_id} names no shard files");
    }

    let mut files = Vec::with_capacity(shards.len());
    for shard in shards {
        tracing::info!(%shard, "fetching weight shard");
        let path = repo
            .get(shard)
            .with_context(|| format!("failed to download {shard} from {model_id}"))?;
        files.push(path);
    }
    Ok(files)
}

/// Fetch model artifacts and build the weight graph on the target device
/// at the target's precision.
pub fn load_model(config: &ModelConfig, target: &ExecutionTarget) -> Result<Box<dyn Model>> {
    let repo = hub_repo(config)?;
    let device = target.device()?;
    let dtype = target.dtype();
    tracing::info!(model = %config.model_id, %target, ?dtype, "loading model");

    let config_path = repo.get("config.json").with_context(|| {
        format!("failed to download config.json from {}", config.model_id)
    })?;
    let llama_config: LlamaConfig = serde_json::from_reader(
        std::fs::File::open(&config_path)
            .with_context(|| format!("cannot open {}", config_path.display()))?,
    )
    .context("failed to parse model config.json")?;
    let llama_config = llama_config.into_config(false);

    let weight_files = resolve_weight_files(&repo, &config.model_id)?;
    tracing::info!(shards = weight_files.len(), "mapping weights");

    // Mmap is sound here: the hub cache files are not mutated while the
    // process runs.
    let vb = unsafe { VarBuilder::from_mmaped_safetensors(&weight_files, dtype, &device)? };
    let llama = Llama::load(vb, &llama_config).context("failed to build llama graph")?;
    let cache = Cache::new(true, dtype, &llama_config, &device)
        .context("failed to allocate KV cache")?;

    tracing::info!(max_seq_len = llama_config.max_position_embeddings, "model loaded");

    Ok(Box::new(LlamaChat {
        llama,
        cache,
        device,
        max_seq_len: llama_config.max_position_embeddings,
        eos_token_id: eos_from_config(&llama_config),
    }))
}

fn eos_from_config(config: &Config) -> Option<u32> {
    match &config.eos_token_id {
        Some(LlamaEosToks::Single(id)) => Some(*id),
        // With multiple declared EOS ids the tokenizer vocabulary lookup
        // stays authoritative.
        Some(LlamaEosToks::Multiple(_)) | None => None,
    }
}
