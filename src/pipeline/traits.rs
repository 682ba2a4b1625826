use crate::error::ScreenError;
use crate::types::FEATURE_DIM;

/// Fixed-length token encodings for a batch of sentences. Every row has the
/// same length (the configured token cap), padded or truncated by the
/// tokenizer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenizedBatch {
    pub input_ids: Vec<Vec<u32>>,
    /// Segment ids; all zero for single-segment sentences. Carried because
    /// BERT-family encoders require them.
    pub type_ids: Vec<Vec<u32>>,
    pub attention_mask: Vec<Vec<u32>>,
}

impl TokenizedBatch {
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }
}

/// Raw model outputs for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInference {
    /// Unnormalized class logits, healthy first, dementia second.
    pub logits: Vec<f32>,
    /// Softmax attention weight per sentence, before display normalization.
    pub attention_scores: Vec<f32>,
}

/// Subword tokenizer boundary: fixed-length ids and masks per sentence.
pub trait SentenceTokenizer: Send + Sync {
    fn encode_batch(&self, sentences: &[String]) -> Result<TokenizedBatch, ScreenError>;
}

/// Contextual sentence-embedding boundary: one fixed-width vector per
/// tokenized sentence, conventionally the encoder's first-token state.
pub trait TextEncoder: Send + Sync {
    fn embed(&self, batch: &TokenizedBatch) -> Result<Vec<Vec<f32>>, ScreenError>;
}

/// Session classifier boundary: per-sentence embeddings and feature vectors
/// in, class logits and attention scores out.
pub trait ModelBackend: Send + Sync {
    fn infer(
        &self,
        embeddings: &[Vec<f32>],
        features: &[[f32; FEATURE_DIM]],
    ) -> Result<SessionInference, ScreenError>;
}
