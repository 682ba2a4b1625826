use std::path::Path;

use crate::config::{HybridModelConfig, ScreenerConfig};
use crate::error::ScreenError;
use crate::pipeline::defaults::{BertSentenceEncoder, HfSentenceTokenizer};
use crate::pipeline::model_runtime::CandleModelBackend;
use crate::pipeline::runtime::{Screener, ScreenerParts};
use crate::pipeline::traits::{ModelBackend, SentenceTokenizer, TextEncoder};

pub struct ScreenerBuilder {
    config: ScreenerConfig,
    tokenizer: Option<Box<dyn SentenceTokenizer>>,
    text_encoder: Option<Box<dyn TextEncoder>>,
    model_backend: Option<Box<dyn ModelBackend>>,
}

impl ScreenerBuilder {
    pub fn new(config: ScreenerConfig) -> Self {
        Self {
            config,
            tokenizer: None,
            text_encoder: None,
            model_backend: None,
        }
    }

    pub fn with_tokenizer(mut self, tokenizer: Box<dyn SentenceTokenizer>) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    pub fn with_text_encoder(mut self, text_encoder: Box<dyn TextEncoder>) -> Self {
        self.text_encoder = Some(text_encoder);
        self
    }

    pub fn with_model_backend(mut self, model_backend: Box<dyn ModelBackend>) -> Self {
        self.model_backend = Some(model_backend);
        self
    }

    /// Loads every component not overridden above and assembles the
    /// screener. With all three seams overridden, no file is touched.
    pub fn build(self) -> Result<Screener, ScreenError> {
        if !(0.0..=1.0).contains(&self.config.threshold) {
            return Err(ScreenError::invalid_input(format!(
                "decision threshold {} outside [0, 1]",
                self.config.threshold
            )));
        }
        if self.config.max_session_len == 0 {
            return Err(ScreenError::invalid_input("max_session_len must be positive"));
        }

        let tokenizer = match self.tokenizer {
            Some(tokenizer) => tokenizer,
            None => Box::new(HfSentenceTokenizer::from_file(
                &self.config.tokenizer_path,
                self.config.max_token_len,
            )?),
        };
        let text_encoder = match self.text_encoder {
            Some(text_encoder) => text_encoder,
            None => Box::new(BertSentenceEncoder::load(&self.config)?),
        };
        let model_backend = match self.model_backend {
            Some(model_backend) => model_backend,
            None => {
                let model_cfg = HybridModelConfig::load(Path::new(&self.config.config_path))?;
                Box::new(CandleModelBackend::load(&self.config, &model_cfg)?)
            }
        };

        Ok(Screener::from_parts(ScreenerParts {
            tokenizer,
            text_encoder,
            model_backend,
            max_session_len: self.config.max_session_len,
            threshold: self.config.threshold,
        }))
    }
}
