//! Per-utterance disfluency statistics and display cleaning for CHAT
//! transcript lines.
//!
//! All statistics are matched against the raw annotated line; the cleaned
//! display string and the word list used for counting are derived separately,
//! because CHAT markup that must disappear from display text (timing codes,
//! alignment brackets) still carries countable annotations.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::FEATURE_DIM;

/// Leading speaker tag of a participant utterance, including the
/// whitespace that follows it.
static SPEAKER_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\*PAR:\s+").expect("speaker tag regex"));

/// CHAT timing codes: a NAK-delimited `start_end` millisecond pair.
static TIMING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x15\d+_\d+\x15").expect("timing regex"));

/// Alignment angle brackets; contents are kept.
static ANGLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[<>]").expect("angle regex"));

/// Any bracketed annotation span, non-greedy.
static BRACKET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[.*?\]").expect("bracket regex"));

/// Filler tokens: the `&-` sigil followed by lowercase letters.
static FILLER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)&-([a-z]+)").expect("filler regex"));

/// Repetition markers `[/]`, `[//]`, `[///]`, ...
static REPETITION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[/+\]").expect("repetition regex"));

/// Retracing markers `[//]`.
static RETRACING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[//\]").expect("retracing regex"));

/// Incompletion markers such as `+...` and `+/.`.
static INCOMPLETE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\+[\./]+").expect("incompletion regex"));

/// Bracketed error annotations `[* ...]`.
static ERROR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\*.*?\]").expect("error regex"));

/// Parenthesized pause runs `(.)`, `(..)`, `(...)`.
static PAUSE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(\.+\)").expect("pause regex"));

/// Everything that is neither a word character nor whitespace.
static PUNCT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").expect("punct regex"));

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Disfluency counts for one raw utterance line. Immutable once computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UtteranceStats {
    pub fillers: usize,
    pub repetitions: usize,
    pub retracings: usize,
    pub incompletions: usize,
    pub errors: usize,
    pub pauses: usize,
    pub word_count: usize,
}

impl UtteranceStats {
    /// Word count clamped for use as a rate denominator.
    pub fn denominator(&self) -> f32 {
        self.word_count.max(1) as f32
    }
}

/// Strips CHAT markup from a raw line, leaving the text shown to the model
/// and the user.
///
/// Bracketed annotation spans are removed before pause substitution; pause
/// markers are parenthesized, so they survive the bracket pass and the
/// inserted `[PAUSE]` literal is never stripped again.
pub fn clean_display(raw: &str) -> String {
    let text = SPEAKER_TAG_RE.replace(raw, "");
    let text = TIMING_RE.replace_all(&text, "");
    let text = ANGLE_RE.replace_all(&text, "");
    let text = BRACKET_RE.replace_all(&text, "");
    let text = PAUSE_RE.replace_all(&text, "[PAUSE]");
    let text = text.replace('_', " ");
    let text = WHITESPACE_RE.replace_all(&text, " ");
    text.trim().to_string()
}

/// Lowercased words of one line as used for word counts and lexical
/// diversity. Not the display string: annotations, filler tokens and all
/// punctuation are dropped before splitting.
fn counting_words(raw: &str) -> Vec<String> {
    let text = BRACKET_RE.replace_all(raw, "");
    let text = FILLER_RE.replace_all(&text, "");
    let text = PUNCT_RE.replace_all(&text, "");
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Counts the six disfluency categories against the raw line and derives the
/// word count from the separately cleaned word list.
pub fn disfluency_stats(raw: &str) -> UtteranceStats {
    UtteranceStats {
        fillers: FILLER_RE.find_iter(raw).count(),
        repetitions: REPETITION_RE.find_iter(raw).count(),
        retracings: RETRACING_RE.find_iter(raw).count(),
        incompletions: INCOMPLETE_RE.find_iter(raw).count(),
        errors: ERROR_RE.find_iter(raw).count(),
        pauses: PAUSE_RE.find_iter(raw).count(),
        word_count: counting_words(raw).len(),
    }
}

/// Assembles the fixed-order feature vector for one line.
///
/// `global_ttr` carries the session-wide lexical diversity; when absent the
/// ratio is computed from this line alone. Rates are normalized by
/// `max(word_count, 1)` so empty lines never divide by zero.
pub fn feature_vector(raw: &str, global_ttr: Option<f32>) -> [f32; FEATURE_DIM] {
    let stats = disfluency_stats(raw);
    let n = stats.denominator();

    let ttr = match global_ttr {
        Some(value) => value,
        None => {
            let words = counting_words(raw);
            let distinct: std::collections::HashSet<&str> =
                words.iter().map(String::as_str).collect();
            distinct.len() as f32 / n
        }
    };

    [
        ttr,
        stats.fillers as f32 / n,
        stats.repetitions as f32 / n,
        stats.retracings as f32 / n,
        stats.errors as f32 / n,
        stats.pauses as f32 / n,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleaning_strips_speaker_tag_and_timing_codes() {
        let raw = "*PAR:\tthe boy is falling \u{15}1500_3200\u{15}";
        assert_eq!(clean_display(raw), "the boy is falling");
    }

    #[test]
    fn cleaning_drops_brackets_but_keeps_angle_contents() {
        let raw = "*PAR:\t<the boy> [//] the girl [* s:r] runs .";
        assert_eq!(clean_display(raw), "the boy the girl runs .");
    }

    #[test]
    fn cleaning_preserves_pause_markers() {
        let raw = "*PAR:\tand then (...) the water [/] overflowed .";
        assert_eq!(clean_display(raw), "and then [PAUSE] the water overflowed .");
    }

    #[test]
    fn cleaning_replaces_underscores_and_collapses_whitespace() {
        let raw = "*PAR:\tcookie_jar   is   full";
        assert_eq!(clean_display(raw), "cookie jar is full");
    }

    #[test]
    fn bracket_only_line_cleans_to_empty() {
        let raw = "*PAR:\t[+ exc] [* jargon]";
        let cleaned = clean_display(raw);
        assert!(cleaned.trim().is_empty());
        // only the tag letters survive the word-count cleaning
        assert_eq!(disfluency_stats(raw).word_count, 1);
        assert_eq!(disfluency_stats("[+ exc] [* jargon]").word_count, 0);
    }

    #[test]
    fn stats_count_each_category() {
        let raw = "*PAR:\t&-uh the the [/] boy [//] went +... (..) [* m:a] there &-um";
        let stats = disfluency_stats(raw);
        assert_eq!(stats.fillers, 2);
        // `[/+]` also matches the retracing marker.
        assert_eq!(stats.repetitions, 2);
        assert_eq!(stats.retracings, 1);
        assert_eq!(stats.incompletions, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.pauses, 1);
    }

    #[test]
    fn word_count_excludes_fillers_and_annotations() {
        let raw = "*PAR:\t&-uh the boy [//] fell down .";
        let stats = disfluency_stats(raw);
        // the boy fell down + "par" (tag letters survive punctuation stripping)
        assert_eq!(stats.word_count, 5);
    }

    #[test]
    fn one_filler_in_four_words_yields_quarter_rate() {
        // Tag letters count as a word in the raw-line word list, so use a
        // tagless line to pin the 1-in-4 rate exactly.
        let raw = "&-uh this is a";
        let vector = feature_vector(raw, Some(0.5));
        assert_eq!(vector.len(), FEATURE_DIM);
        assert!((vector[1] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn vector_uses_global_ttr_when_given() {
        let raw = "*PAR:\tthe dog and the dog";
        let with_global = feature_vector(raw, Some(0.9));
        assert!((with_global[0] - 0.9).abs() < 1e-6);
        let local = feature_vector(raw, None);
        assert!(local[0] < 0.9);
    }

    #[test]
    fn empty_line_rates_fall_back_to_unit_denominator() {
        let raw = "*PAR:\t(..) [* n:uk]";
        let stats = disfluency_stats(raw);
        assert_eq!(stats.word_count, 1); // "par" survives punctuation stripping
        let vector = feature_vector("(..) [* n:uk]", Some(0.0));
        // zero words: every rate is the raw count
        assert!((vector[4] - 1.0).abs() < 1e-6);
        assert!((vector[5] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn vector_entries_are_non_negative() {
        let raw = "*PAR:\t&-um well I (.) I [/] think so \u{15}100_200\u{15}";
        let vector = feature_vector(raw, None);
        assert!(vector.iter().all(|v| *v >= 0.0));
        assert!(vector[0] >= 0.0 && vector[0] <= 1.0);
    }
}
