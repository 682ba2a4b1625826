pub mod config;
pub mod error;
mod model;
pub mod pipeline;
pub mod transcript;
pub mod types;

pub use config::{HybridModelConfig, ScreenerConfig};
pub use error::ScreenError;
pub use pipeline::builder::ScreenerBuilder;
pub use pipeline::defaults::{BertSentenceEncoder, HfSentenceTokenizer};
pub use pipeline::runtime::Screener;
pub use pipeline::traits::{
    ModelBackend, SentenceTokenizer, SessionInference, TextEncoder, TokenizedBatch,
};
pub use types::{Label, ParsedSession, Screening, SentenceAttention, FEATURE_DIM};
