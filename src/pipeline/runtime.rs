use crate::error::ScreenError;
use crate::pipeline::traits::{ModelBackend, SentenceTokenizer, TextEncoder};
use crate::transcript::{parse_bytes, PARTICIPANT_TAG};
use crate::types::{Label, Screening, SentenceAttention};

/// One fully assembled inference pipeline: parser, tokenizer, sentence
/// encoder and session classifier behind immutable shared state.
///
/// `screen` takes `&self` and mutates nothing, so a single instance may be
/// shared across concurrent callers.
pub struct Screener {
    tokenizer: Box<dyn SentenceTokenizer>,
    text_encoder: Box<dyn TextEncoder>,
    model_backend: Box<dyn ModelBackend>,
    max_session_len: usize,
    threshold: f32,
}

pub(crate) struct ScreenerParts {
    pub tokenizer: Box<dyn SentenceTokenizer>,
    pub text_encoder: Box<dyn TextEncoder>,
    pub model_backend: Box<dyn ModelBackend>,
    pub max_session_len: usize,
    pub threshold: f32,
}

impl Screener {
    pub(crate) fn from_parts(parts: ScreenerParts) -> Self {
        Self {
            tokenizer: parts.tokenizer,
            text_encoder: parts.text_encoder,
            model_backend: parts.model_backend,
            max_session_len: parts.max_session_len,
            threshold: parts.threshold,
        }
    }

    /// Screens one transcript and returns the labelled prediction with its
    /// per-sentence attention map.
    pub fn screen(&self, filename: &str, content: &[u8]) -> Result<Screening, ScreenError> {
        let mut session = parse_bytes(content);
        if session.is_empty() {
            return Err(ScreenError::invalid_input(format!(
                "no {PARTICIPANT_TAG} lines found in {filename}"
            )));
        }
        if session.len() > self.max_session_len {
            tracing::debug!(
                lines = session.len(),
                cap = self.max_session_len,
                "session over length cap, keeping the most recent lines"
            );
            session.truncate_to_tail(self.max_session_len);
        }

        let batch = self.tokenizer.encode_batch(&session.sentences)?;
        let embeddings = self.text_encoder.embed(&batch)?;
        if embeddings.len() != session.len() {
            return Err(ScreenError::runtime(
                "text encoding",
                format!(
                    "{} embeddings returned for {} sentences",
                    embeddings.len(),
                    session.len()
                ),
            ));
        }

        let inference = self.model_backend.infer(&embeddings, &session.features)?;
        if inference.logits.len() < 2 {
            return Err(ScreenError::runtime(
                "session inference",
                format!("expected 2 class logits, got {}", inference.logits.len()),
            ));
        }

        let confidence = softmax(&inference.logits)[1];
        let is_dementia = confidence >= self.threshold;
        let prediction = if is_dementia {
            Label::Dementia
        } else {
            Label::HealthyControl
        };

        let mut scores = inference.attention_scores;
        scores.truncate(session.len());
        normalize_attention(&mut scores);

        let attention_map = session
            .sentences
            .iter()
            .zip(&scores)
            .map(|(sentence, score)| SentenceAttention {
                sentence: sentence.clone(),
                attention_score: *score,
            })
            .collect();

        tracing::debug!(
            filename,
            %prediction,
            confidence,
            sentences = session.len(),
            "transcript screened"
        );

        Ok(Screening {
            filename: filename.to_string(),
            prediction,
            confidence,
            is_dementia,
            attention_map,
        })
    }
}

/// Numerically stable softmax over a small logit slice.
fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

/// Min-max normalizes attention scores across the session for display. Equal
/// scores (zero range) are left untouched rather than divided by zero.
fn normalize_attention(scores: &mut [f32]) {
    let Some(min) = scores.iter().copied().reduce(f32::min) else {
        return;
    };
    let Some(max) = scores.iter().copied().reduce(f32::max) else {
        return;
    };
    let range = max - min;
    if range <= 0.0 {
        return;
    }
    for score in scores {
        *score = (*score - min) / range;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::traits::{SessionInference, TokenizedBatch};
    use crate::types::FEATURE_DIM;

    struct StubTokenizer;

    impl SentenceTokenizer for StubTokenizer {
        fn encode_batch(&self, sentences: &[String]) -> Result<TokenizedBatch, ScreenError> {
            let mut batch = TokenizedBatch::default();
            for _ in sentences {
                batch.input_ids.push(vec![101, 7592, 102, 0]);
                batch.type_ids.push(vec![0; 4]);
                batch.attention_mask.push(vec![1, 1, 1, 0]);
            }
            Ok(batch)
        }
    }

    struct StubEncoder;

    impl TextEncoder for StubEncoder {
        fn embed(&self, batch: &TokenizedBatch) -> Result<Vec<Vec<f32>>, ScreenError> {
            Ok(vec![vec![0.5; 8]; batch.len()])
        }
    }

    /// Backend returning fixed logits and linearly increasing raw scores.
    struct FixedBackend {
        logits: Vec<f32>,
        equal_scores: bool,
    }

    impl ModelBackend for FixedBackend {
        fn infer(
            &self,
            embeddings: &[Vec<f32>],
            features: &[[f32; FEATURE_DIM]],
        ) -> Result<SessionInference, ScreenError> {
            assert_eq!(embeddings.len(), features.len());
            let count = embeddings.len();
            let attention_scores = if self.equal_scores {
                vec![1.0 / count as f32; count]
            } else {
                (1..=count).map(|i| i as f32 * 0.1).collect()
            };
            Ok(SessionInference {
                logits: self.logits.clone(),
                attention_scores,
            })
        }
    }

    fn screener(backend: FixedBackend, threshold: f32) -> Screener {
        Screener::from_parts(ScreenerParts {
            tokenizer: Box::new(StubTokenizer),
            text_encoder: Box::new(StubEncoder),
            model_backend: Box::new(backend),
            max_session_len: 64,
            threshold,
        })
    }

    const TRANSCRIPT: &str = "*INV:\ttell me about the picture .\n\
        *PAR:\t&-uh the boy is on the stool .\n\
        *PAR:\tthe water is (..) running over .\n\
        *PAR:\tthe cookie [/] cookie jar is up there .\n";

    #[test]
    fn probability_above_threshold_flags_dementia() {
        // softmax([ln 3, 0]) puts 0.25 on the dementia class
        let backend = FixedBackend {
            logits: vec![3.0f32.ln(), 0.0],
            equal_scores: false,
        };
        let screening = screener(backend, 0.20)
            .screen("sample.cha", TRANSCRIPT.as_bytes())
            .expect("screen");
        assert!((screening.confidence - 0.25).abs() < 1e-6);
        assert!(screening.is_dementia);
        assert_eq!(screening.prediction, Label::Dementia);
    }

    #[test]
    fn probability_below_threshold_is_healthy() {
        let backend = FixedBackend {
            logits: vec![3.0f32.ln(), 0.0],
            equal_scores: false,
        };
        let screening = screener(backend, 0.30)
            .screen("sample.cha", TRANSCRIPT.as_bytes())
            .expect("screen");
        assert!(!screening.is_dementia);
        assert_eq!(screening.prediction, Label::HealthyControl);
    }

    #[test]
    fn attention_map_is_min_max_normalized() {
        let backend = FixedBackend {
            logits: vec![0.0, 0.0],
            equal_scores: false,
        };
        let screening = screener(backend, 0.20)
            .screen("sample.cha", TRANSCRIPT.as_bytes())
            .expect("screen");
        assert_eq!(screening.attention_map.len(), 3);
        assert!((screening.attention_map[0].attention_score - 0.0).abs() < 1e-6);
        assert!((screening.attention_map[2].attention_score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn equal_attention_scores_are_left_unscaled() {
        let backend = FixedBackend {
            logits: vec![0.0, 0.0],
            equal_scores: true,
        };
        let screening = screener(backend, 0.20)
            .screen("sample.cha", TRANSCRIPT.as_bytes())
            .expect("screen");
        for entry in &screening.attention_map {
            assert!((entry.attention_score - 1.0 / 3.0).abs() < 1e-6);
        }
    }

    #[test]
    fn empty_transcript_is_an_input_error() {
        let backend = FixedBackend {
            logits: vec![0.0, 0.0],
            equal_scores: true,
        };
        let result = screener(backend, 0.20).screen("empty.cha", b"*INV:\thello .\n");
        assert!(matches!(result, Err(ScreenError::InvalidInput { .. })));
    }

    #[test]
    fn softmax_is_stable_and_sums_to_one() {
        let probs = softmax(&[1000.0, 1000.0]);
        assert!((probs[0] - 0.5).abs() < 1e-6);
        let probs = softmax(&[-3.0, 1.0, 0.5]);
        let total: f32 = probs.iter().sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_attention_handles_empty_and_flat_inputs() {
        let mut empty: Vec<f32> = Vec::new();
        normalize_attention(&mut empty);

        let mut flat = vec![0.25, 0.25, 0.25];
        normalize_attention(&mut flat);
        assert_eq!(flat, vec![0.25, 0.25, 0.25]);

        let mut spread = vec![0.1, 0.3, 0.2];
        normalize_attention(&mut spread);
        assert_eq!(spread[0], 0.0);
        assert_eq!(spread[1], 1.0);
        assert!((spread[2] - 0.5).abs() < 1e-6);
    }
}
