use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::t5::{Config as T5Config, T5ForConditionalGeneration};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use insight_core::config::GenerationSettings;
use insight_core::{GenerationParams, Generator, Strategy};

use crate::decode::{beam_search, decode_with, DecodeLimits, StepModel};

struct LoadedModel {
    model: T5ForConditionalGeneration,
    tokenizer: Tokenizer,
    config: T5Config,
}

/// Encoder-decoder text generator (flan-t5 family) running on candle.
///
/// Weights load once, on `ensure_loaded` or the first `generate`. The model
/// sits behind a mutex held for a whole generation, so concurrent callers
/// queue on it.
pub struct T5Generator {
    model_dir: PathBuf,
    device: Device,
    window: usize,
    slot: Mutex<Option<LoadedModel>>,
}

impl T5Generator {
    pub fn new(model_dir: &Path, window: usize) -> Self {
        Self { model_dir: model_dir.to_path_buf(), device: select_device(), window: window.max(2), slot: Mutex::new(None) }
    }

    pub fn from_settings(settings: &GenerationSettings) -> Result<Self> {
        let model_dir = resolve_model_dir(settings.model_dir.as_deref())?;
        Ok(Self::new(&model_dir, settings.context_window_tokens))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<LoadedModel>>> {
        self.slot.lock().map_err(|_| anyhow!("generator slot poisoned"))
    }

    fn load(&self) -> Result<LoadedModel> {
        let start = Instant::now();
        info!(dir = %self.model_dir.display(), "loading generation model");
        let config_path = self.model_dir.join("config.json");
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow!("Failed to read {}: {}", config_path.display(), e))?;
        let mut config: T5Config = serde_json::from_str(&raw)?;
        // decoding re-feeds whole sequences so beams can be reordered freely
        config.use_cache = false;

        let tokenizer_path = self.model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let weights = load_weights(&self.model_dir, &self.device)?;
        let vb = VarBuilder::from_tensors(weights, DType::F32, &self.device);
        let model = T5ForConditionalGeneration::load(vb, &config)?;
        info!(ms = start.elapsed().as_millis() as u64, "generation model loaded");
        Ok(LoadedModel { model, tokenizer, config })
    }

    fn run(&self, loaded: &mut LoadedModel, prompt: &str, params: &GenerationParams) -> Result<String> {
        let eos = loaded.config.eos_token_id as u32;
        let encoding = loaded.tokenizer.encode(prompt, true).map_err(|e| anyhow!("tokenize failed: {}", e))?;
        let mut ids = encoding.get_ids().to_vec();
        if ids.len() > self.window {
            debug!(tokens = ids.len(), window = self.window, "prompt truncated to model window");
            ids.truncate(self.window - 1);
            ids.push(eos);
        }
        let input = Tensor::new(ids.as_slice(), &self.device)?.unsqueeze(0)?;
        loaded.model.clear_kv_cache();
        let encoder_output = loaded.model.encode(&input)?;

        let limits = DecodeLimits {
            start_token: loaded.config.decoder_start_token_id.unwrap_or(loaded.config.pad_token_id) as u32,
            eos_token: eos,
            max_length: params.max_length,
            min_length: params.min_length,
            repetition_penalty: params.repetition_penalty,
        };
        let mut step = T5Step { model: &mut loaded.model, encoder_output: &encoder_output, device: &self.device };
        let decoded = match &params.strategy {
            Strategy::Beam { num_beams, early_stopping } => beam_search(&mut step, limits, *num_beams, *early_stopping)?,
            Strategy::Sampling { temperature, top_p } => {
                let mut processor = LogitsProcessor::new(params.seed, Some(*temperature), Some(*top_p));
                decode_with(&mut step, limits, |logits| {
                    let logits = Tensor::new(logits, &Device::Cpu)?;
                    Ok(processor.sample(&logits)?)
                })?
            }
        };
        loaded
            .tokenizer
            .decode(&decoded.tokens, true)
            .map_err(|e| anyhow!("detokenize failed: {}", e))
    }
}

impl Generator for T5Generator {
    fn ensure_loaded(&self) -> Result<()> {
        let mut slot = self.lock()?;
        if slot.is_none() {
            *slot = Some(self.load()?);
        }
        Ok(())
    }

    fn context_window_tokens(&self) -> usize { self.window }

    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let start = Instant::now();
        let mut slot = self.lock()?;
        if slot.is_none() {
            *slot = Some(self.load()?);
        }
        let loaded = slot.as_mut().ok_or_else(|| anyhow!("generation model unavailable"))?;
        let text = self.run(loaded, prompt, params)?;
        debug!(ms = start.elapsed().as_millis() as u64, chars = text.len(), "generated");
        Ok(text)
    }
}

struct T5Step<'a> {
    model: &'a mut T5ForConditionalGeneration,
    encoder_output: &'a Tensor,
    device: &'a Device,
}

impl StepModel for T5Step<'_> {
    fn next_logits(&mut self, sequences: &[Vec<u32>]) -> Result<Vec<Vec<f32>>> {
        let rows = sequences.len();
        let len = sequences.first().map_or(0, Vec::len);
        if rows == 0 || sequences.iter().any(|s| s.len() != len) {
            return Err(anyhow!("decoder batch must hold equal-length sequences"));
        }
        let flat: Vec<u32> = sequences.iter().flatten().copied().collect();
        let input = Tensor::from_vec(flat, (rows, len), self.device)?;
        let (_, enc_len, hidden) = self.encoder_output.dims3()?;
        let encoder_output = self.encoder_output.broadcast_as((rows, enc_len, hidden))?.contiguous()?;
        self.model.clear_kv_cache();
        let logits = self.model.decode(&input, &encoder_output)?;
        Ok(logits.to_dtype(DType::F32)?.to_device(&Device::Cpu)?.to_vec2::<f32>()?)
    }
}

fn select_device() -> Device {
    #[cfg(feature = "metal")]
    {
        if let Ok(dev) = Device::new_metal(0) { info!("generation device: Metal (MPS)"); return dev; }
    }
    info!("generation device: CPU");
    Device::Cpu
}

/// Prefers safetensors; falls back to a PyTorch pickle.
fn load_weights(model_dir: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        return Ok(candle_core::safetensors::load(&safetensors, device)?);
    }
    let pickle = model_dir.join("pytorch_model.bin");
    if pickle.exists() {
        return candle_core::pickle::read_all(&pickle)?
            .into_iter()
            .map(|(name, t)| Ok((name, t.to_device(device)?)))
            .collect();
    }
    Err(anyhow!("No model weights found in {}", model_dir.display()))
}

fn resolve_model_dir(configured: Option<&str>) -> Result<PathBuf> {
    if let Some(dir) = configured {
        let p = insight_core::config::expand_path(dir);
        if p.exists() { return Ok(p); }
        tracing::warn!(dir = %p.display(), "configured generation model dir missing");
    }
    if let Ok(dir) = std::env::var("APP_GENERATION_MODEL_DIR") {
        let p = PathBuf::from(&dir);
        if p.exists() { return Ok(p); }
    }
    for candidate in ["models/flan-t5-base", "../models/flan-t5-base"] {
        let p = Path::new(candidate);
        if p.exists() { return Ok(p.to_path_buf()); }
    }
    Err(anyhow!("Could not locate generation model directory"))
}
