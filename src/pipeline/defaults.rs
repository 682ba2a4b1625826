use candle_core::{DType, IndexOp, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertEncoderConfig};
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

use crate::config::ScreenerConfig;
use crate::error::ScreenError;
use crate::pipeline::model_runtime::select_device;
use crate::pipeline::traits::{SentenceTokenizer, TextEncoder, TokenizedBatch};

/// HuggingFace subword tokenizer configured for fixed-length output: every
/// sentence is truncated and padded to the same token count.
pub struct HfSentenceTokenizer {
    inner: Tokenizer,
}

impl HfSentenceTokenizer {
    pub fn from_file(path: &str, max_token_len: usize) -> Result<Self, ScreenError> {
        let mut inner =
            Tokenizer::from_file(path).map_err(|e| ScreenError::runtime("load tokenizer", e))?;
        inner.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::Fixed(max_token_len),
            ..Default::default()
        }));
        inner
            .with_truncation(Some(TruncationParams {
                max_length: max_token_len,
                ..Default::default()
            }))
            .map_err(|e| ScreenError::runtime("configure truncation", e))?;
        Ok(Self { inner })
    }
}

impl SentenceTokenizer for HfSentenceTokenizer {
    fn encode_batch(&self, sentences: &[String]) -> Result<TokenizedBatch, ScreenError> {
        let encodings = self
            .inner
            .encode_batch(sentences.to_vec(), true)
            .map_err(|e| ScreenError::runtime("tokenize sentences", e))?;

        let mut batch = TokenizedBatch::default();
        for encoding in &encodings {
            batch.input_ids.push(encoding.get_ids().to_vec());
            batch.type_ids.push(encoding.get_type_ids().to_vec());
            batch
                .attention_mask
                .push(encoding.get_attention_mask().to_vec());
        }
        Ok(batch)
    }
}

/// BERT-family sentence encoder; each sentence is represented by its
/// first-token hidden state.
pub struct BertSentenceEncoder {
    model: BertModel,
    device: candle_core::Device,
}

impl BertSentenceEncoder {
    pub fn load(config: &ScreenerConfig) -> Result<Self, ScreenError> {
        let device = select_device(&config.device)?;
        let config_data = std::fs::read_to_string(&config.encoder_config_path)
            .map_err(|e| ScreenError::io("read encoder config", e))?;
        let encoder_cfg: BertEncoderConfig = serde_json::from_str(&config_data)
            .map_err(|e| ScreenError::json("parse encoder config", e))?;

        let model_data = std::fs::read(&config.encoder_path)
            .map_err(|e| ScreenError::io("read encoder safetensors", e))?;
        let vb = VarBuilder::from_buffered_safetensors(model_data, DType::F32, &device)
            .map_err(|e| ScreenError::runtime("load encoder safetensors", e))?;
        let model = BertModel::load(vb, &encoder_cfg)
            .map_err(|e| ScreenError::runtime("build sentence encoder", e))?;

        tracing::info!(
            hidden_size = encoder_cfg.hidden_size,
            ?device,
            "sentence encoder loaded"
        );

        Ok(Self { model, device })
    }

    fn id_tensor(&self, rows: &[Vec<u32>], width: usize) -> Result<Tensor, ScreenError> {
        if rows.iter().any(|row| row.len() != width) {
            return Err(ScreenError::runtime(
                "sentence encoding",
                "tokenizer produced rows of unequal length",
            ));
        }
        let flat: Vec<u32> = rows.iter().flatten().copied().collect();
        Tensor::from_vec(flat, (rows.len(), width), &self.device)
            .map_err(|e| ScreenError::runtime("token tensor creation", e))
    }
}

impl TextEncoder for BertSentenceEncoder {
    fn embed(&self, batch: &TokenizedBatch) -> Result<Vec<Vec<f32>>, ScreenError> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let width = batch.input_ids[0].len();
        let input_ids = self.id_tensor(&batch.input_ids, width)?;
        let type_ids = self.id_tensor(&batch.type_ids, width)?;
        let attention_mask = self.id_tensor(&batch.attention_mask, width)?;

        let hidden = self
            .model
            .forward(&input_ids, &type_ids, Some(&attention_mask))
            .map_err(|e| ScreenError::runtime("encoder forward pass", e))?;
        let first_token = hidden
            .i((.., 0))
            .map_err(|e| ScreenError::runtime("first-token pooling", e))?;
        first_token
            .to_vec2()
            .map_err(|e| ScreenError::runtime("embeddings to host", e))
    }
}
