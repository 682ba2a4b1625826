use std::path::Path;

use crate::error::ScreenError;

#[derive(Debug, Clone)]
pub struct ScreenerConfig {
    /// Safetensors file holding the fusion/LSTM/attention/classifier weights.
    pub model_path: String,
    /// JSON file describing the model dimensions ([`HybridModelConfig`]).
    pub config_path: String,
    /// `tokenizer.json` for the subword tokenizer.
    pub tokenizer_path: String,
    /// Safetensors file for the sentence encoder.
    pub encoder_path: String,
    /// JSON config for the sentence encoder.
    pub encoder_config_path: String,
    pub device: String,
    /// Sessions longer than this keep only their most recent lines.
    pub max_session_len: usize,
    /// Fixed token length every sentence is padded/truncated to.
    pub max_token_len: usize,
    /// Dementia-class probability at or above which the label flips to
    /// DEMENTIA. Deliberately below 0.5 to favor recall.
    pub threshold: f32,
}

impl ScreenerConfig {
    pub const DEFAULT_MAX_SESSION_LEN: usize = 64;
    pub const DEFAULT_MAX_TOKEN_LEN: usize = 40;
    pub const DEFAULT_THRESHOLD: f32 = 0.20;
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            model_path: String::new(),
            config_path: String::new(),
            tokenizer_path: String::new(),
            encoder_path: String::new(),
            encoder_config_path: String::new(),
            device: "cpu".to_string(),
            max_session_len: Self::DEFAULT_MAX_SESSION_LEN,
            max_token_len: Self::DEFAULT_MAX_TOKEN_LEN,
            threshold: Self::DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct HybridModelConfig {
    #[serde(default = "default_embed_dim")]
    pub embed_dim: usize,
    #[serde(default = "default_feature_dim")]
    pub feature_dim: usize,
    #[serde(default = "default_lstm_hidden")]
    pub lstm_hidden: usize,
    #[serde(default = "default_lstm_layers")]
    pub lstm_layers: usize,
    #[serde(default = "default_attention_hidden")]
    pub attention_hidden: usize,
    #[serde(default = "default_classifier_hidden")]
    pub classifier_hidden: usize,
    #[serde(default = "default_num_classes")]
    pub num_classes: usize,
    #[serde(default = "default_eps")]
    pub layer_norm_eps: f64,
    #[serde(default = "default_eps")]
    pub batch_norm_eps: f64,
}

fn default_embed_dim() -> usize {
    768
}
fn default_feature_dim() -> usize {
    6
}
fn default_lstm_hidden() -> usize {
    256
}
fn default_lstm_layers() -> usize {
    2
}
fn default_attention_hidden() -> usize {
    128
}
fn default_classifier_hidden() -> usize {
    128
}
fn default_num_classes() -> usize {
    2
}
fn default_eps() -> f64 {
    1e-5
}

impl Default for HybridModelConfig {
    fn default() -> Self {
        Self {
            embed_dim: default_embed_dim(),
            feature_dim: default_feature_dim(),
            lstm_hidden: default_lstm_hidden(),
            lstm_layers: default_lstm_layers(),
            attention_hidden: default_attention_hidden(),
            classifier_hidden: default_classifier_hidden(),
            num_classes: default_num_classes(),
            layer_norm_eps: default_eps(),
            batch_norm_eps: default_eps(),
        }
    }
}

impl HybridModelConfig {
    pub(crate) fn load(path: &Path) -> Result<Self, ScreenError> {
        let data =
            std::fs::read_to_string(path).map_err(|e| ScreenError::io("read model config", e))?;
        serde_json::from_str(&data).map_err(|e| ScreenError::json("parse model config", e))
    }

    /// Per-position output width of the bidirectional sequence encoder.
    pub(crate) fn encoder_out_dim(&self) -> usize {
        2 * self.lstm_hidden
    }
}
