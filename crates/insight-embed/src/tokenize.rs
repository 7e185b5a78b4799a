use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

/// Encoded single-sequence inputs, shaped `[1, T]`.
pub struct EncodedInput {
    pub input_ids: Tensor,
    pub attention_mask: Tensor,
    pub token_type_ids: Tensor,
}

/// Tokenizes one text; the tokenizer's own truncation keeps special tokens intact.
pub fn tokenize_on_device(tokenizer: &Tokenizer, text: &str, device: &Device) -> Result<EncodedInput> {
    let enc = tokenizer.encode(text, true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
    let len = enc.get_ids().len();
    if len == 0 { return Err(anyhow!("Tokenization produced no tokens")); }
    let input_ids = Tensor::new(enc.get_ids(), device)?.reshape((1, len))?;
    let attention_mask = Tensor::new(enc.get_attention_mask(), device)?.reshape((1, len))?;
    let token_type_ids = Tensor::new(enc.get_type_ids(), device)?.reshape((1, len))?;
    Ok(EncodedInput { input_ids, attention_mask, token_type_ids })
}
