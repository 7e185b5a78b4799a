//! Sentence embeddings for chunks and queries.
//!
//! `SentenceEmbedder` runs a BERT-family encoder (bge-large-en-v1.5 by default)
//! through candle and returns L2-normalised vectors. `FakeEmbedder` is a
//! deterministic hashing embedder for tests and development; set
//! `APP_USE_FAKE_EMBEDDINGS=1` to select it from `get_default_embedder`.

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info, warn};

use insight_core::config::{EmbeddingSettings, Pooling};
use insight_core::Embedder;

pub mod device;
pub mod pool;
pub mod tokenize;

pub use pool::{cls_l2, masked_mean_l2};

pub const DEFAULT_DIM: usize = 1024;

struct LoadedEncoder { model: BertModel, tokenizer: Tokenizer }

pub struct SentenceEmbedder {
    model_dir: PathBuf,
    config: BertConfig,
    dim: usize,
    max_len: usize,
    pooling: Pooling,
    device: Device,
    loaded: OnceLock<LoadedEncoder>,
    init_lock: Mutex<()>,
}

impl SentenceEmbedder {
    /// Reads the model config eagerly; weights load on `ensure_loaded` or first use.
    pub fn new(model_dir: &Path, pooling: Pooling, max_len: usize) -> Result<Self> {
        let config_path = model_dir.join("config.json");
        let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow!("Failed to read {}: {}", config_path.display(), e))?)?;
        let dim = raw.get("hidden_size").and_then(|v| v.as_u64()).map(|v| v as usize).unwrap_or(DEFAULT_DIM);
        let config: BertConfig = serde_json::from_value(raw)?;
        Ok(Self {
            model_dir: model_dir.to_path_buf(),
            config,
            dim,
            max_len,
            pooling,
            device: device::select_device(),
            loaded: OnceLock::new(),
            init_lock: Mutex::new(()),
        })
    }

    pub fn from_settings(settings: &EmbeddingSettings) -> Result<Self> {
        let model_dir = resolve_model_dir(settings.model_dir.as_deref())?;
        Self::new(&model_dir, settings.pooling, settings.max_len)
    }

    fn encoder(&self) -> Result<&LoadedEncoder> {
        if let Some(loaded) = self.loaded.get() { return Ok(loaded); }
        let _guard = self.init_lock.lock().map_err(|_| anyhow!("embedder init lock poisoned"))?;
        if let Some(loaded) = self.loaded.get() { return Ok(loaded); }
        let encoder = self.load_encoder()?;
        Ok(self.loaded.get_or_init(|| encoder))
    }

    fn load_encoder(&self) -> Result<LoadedEncoder> {
        info!(dir = %self.model_dir.display(), "loading embedding model");
        let tokenizer_path = self.model_dir.join("tokenizer.json");
        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        tokenizer
            .with_padding(None)
            .with_truncation(Some(TruncationParams { max_length: self.max_len, ..Default::default() }))
            .map_err(|e| anyhow!("Failed to configure truncation: {}", e))?;
        let weights = load_weights(&self.model_dir, &self.device)?;
        let vb = VarBuilder::from_tensors(weights, DType::F32, &self.device);
        let model = BertModel::load(vb, &self.config)?;
        info!(dim = self.dim, "embedding model loaded");
        Ok(LoadedEncoder { model, tokenizer })
    }

    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let encoder = self.encoder()?;
        let input = tokenize::tokenize_on_device(&encoder.tokenizer, text, &self.device)?;
        let hidden = encoder.model.forward(&input.input_ids, &input.token_type_ids, Some(&input.attention_mask))?;
        let pooled = match self.pooling {
            Pooling::Cls => cls_l2(&hidden)?,
            Pooling::Mean => masked_mean_l2(&hidden, &input.attention_mask)?,
        };
        let emb: Vec<f32> = pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1()?;
        if emb.len() != self.dim { return Err(anyhow!("dim mismatch: got {} expected {}", emb.len(), self.dim)); }
        if start.elapsed().as_millis() > 100 { debug!(ms = start.elapsed().as_millis() as u64, "slow embedding"); }
        Ok(emb)
    }
}

impl Embedder for SentenceEmbedder {
    fn ensure_loaded(&self) -> Result<()> { self.encoder().map(|_| ()) }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed_text(t)).collect()
    }
}

/// Prefers safetensors; falls back to a PyTorch pickle.
fn load_weights(model_dir: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        return Ok(candle_core::safetensors::load(&safetensors, device)?);
    }
    let pickle = model_dir.join("pytorch_model.bin");
    if pickle.exists() {
        let weights = candle_core::pickle::read_all(&pickle)?;
        return weights
            .into_iter()
            .map(|(name, t)| Ok((name, t.to_device(device)?)))
            .collect();
    }
    Err(anyhow!("No model weights found in {}", model_dir.display()))
}

/// Deterministic bag-of-tokens hashing embedder. Texts sharing tokens get
/// similar vectors; identical texts get identical vectors.
pub struct FakeEmbedder { dim: usize }

impl FakeEmbedder { pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } } }

impl Default for FakeEmbedder { fn default() -> Self { Self::new(DEFAULT_DIM) } }

impl FakeEmbedder {
    fn embed_one(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher}; use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let token = token.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
            if token.is_empty() { continue; }
            let mut hasher = XxHash64::with_seed(0); token.hash(&mut hasher); let h = hasher.finish();
            let idx = (h as usize) % self.dim; let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6); for x in &mut v { *x /= norm; } v
    }
}

impl Embedder for FakeEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { Ok(texts.iter().map(|t| self.embed_one(t)).collect()) }
}

pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Box<dyn Embedder>> {
    let use_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
    if use_fake || settings.use_fake { warn!("using FakeEmbedder"); return Ok(Box::new(FakeEmbedder::default())); }
    Ok(Box::new(SentenceEmbedder::from_settings(settings)?))
}

fn resolve_model_dir(configured: Option<&str>) -> Result<PathBuf> {
    if let Some(dir) = configured { let p = insight_core::config::expand_path(dir); if p.exists() { return Ok(p); } warn!(dir = %p.display(), "configured embedding model dir missing"); }
    if let Ok(dir) = std::env::var("APP_EMBEDDING_MODEL_DIR") { let p = PathBuf::from(&dir); if p.exists() { return Ok(p); } }
    for candidate in ["models/bge-large-en-v1.5", "../models/bge-large-en-v1.5"] {
        let p = Path::new(candidate); if p.exists() { debug!(dir = %p.display(), "using model dir"); return Ok(p.to_path_buf()); }
    }
    Err(anyhow!("Could not locate embedding model directory"))
}
