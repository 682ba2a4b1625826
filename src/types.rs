use serde::Serialize;

/// Number of engineered linguistic features per utterance.
pub const FEATURE_DIM: usize = 6;

/// Aligned output of parsing one transcript, restricted to participant lines.
///
/// The three vectors always have the same length; index `i` of each refers to
/// the same original utterance line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedSession {
    /// Markup-stripped display text, one per participant line.
    pub sentences: Vec<String>,
    /// `[ttr, fillers/n, repetitions/n, retracings/n, errors/n, pauses/n]`
    /// per line, with the lexical-diversity term shared session-wide.
    pub features: Vec<[f32; FEATURE_DIM]>,
    /// Trimmed raw lines as they appeared in the transcript.
    pub raw_lines: Vec<String>,
}

impl ParsedSession {
    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    /// Keeps only the trailing `max_len` utterances, dropping the oldest
    /// lines from all three sequences identically.
    pub fn truncate_to_tail(&mut self, max_len: usize) {
        if self.sentences.len() <= max_len {
            return;
        }
        let drop = self.sentences.len() - max_len;
        self.sentences.drain(..drop);
        self.features.drain(..drop);
        self.raw_lines.drain(..drop);
    }
}

/// Binary screening outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Label {
    #[serde(rename = "DEMENTIA")]
    Dementia,
    #[serde(rename = "HEALTHY CONTROL")]
    HealthyControl,
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Label::Dementia => f.write_str("DEMENTIA"),
            Label::HealthyControl => f.write_str("HEALTHY CONTROL"),
        }
    }
}

/// One sentence with its normalized model-assigned importance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentenceAttention {
    pub sentence: String,
    /// In [0, 1] after min-max normalization across the session, unless all
    /// raw scores were equal (then the raw softmax weights are kept).
    pub attention_score: f32,
}

/// Per-request screening result. Ephemeral, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Screening {
    pub filename: String,
    pub prediction: Label,
    /// Softmax probability of the dementia class, in [0, 1].
    pub confidence: f32,
    pub is_dementia: bool,
    pub attention_map: Vec<SentenceAttention>,
}
