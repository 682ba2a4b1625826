//! Session-level CHAT transcript parsing.
//!
//! Two passes over the participant lines: the first accumulates the
//! session-wide word list and computes the lexical-diversity ratio, the
//! second produces the aligned sentence/feature/raw-line sequences with that
//! ratio fixed into every feature vector.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::transcript::features::{clean_display, feature_vector};
use crate::types::ParsedSession;

/// Tag identifying utterances of the participant being evaluated. Lines with
/// any other tag (interviewer, headers, comments) are skipped.
pub const PARTICIPANT_TAG: &str = "*PAR:";

static PUNCT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("punct regex"));

/// Parses raw transcript bytes. Input is split on line boundaries and
/// decoded lossily, so stray non-UTF-8 bytes cannot fail a request.
pub fn parse_bytes(content: &[u8]) -> ParsedSession {
    let text = String::from_utf8_lossy(content);
    parse_lines(text.lines())
}

/// Parses an ordered sequence of transcript lines.
///
/// Returns an empty session when no participant lines are present; callers
/// must treat that as a user-input error, since no prediction is possible.
pub fn parse_lines<I, S>(lines: I) -> ParsedSession
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let lines: Vec<String> = lines
        .into_iter()
        .filter(|line| line.as_ref().starts_with(PARTICIPANT_TAG))
        .map(|line| line.as_ref().to_string())
        .collect();

    let global_ttr = session_lexical_diversity(&lines);

    let mut session = ParsedSession::default();
    for line in &lines {
        session.sentences.push(clean_display(line));
        session.features.push(feature_vector(line, Some(global_ttr)));
        session.raw_lines.push(line.trim().to_string());
    }
    session
}

/// Distinct-word / total-word ratio over every participant line, 0.0 for a
/// wordless session. Word splitting here intentionally differs from the
/// per-line counting rules: only the tag and punctuation are stripped.
fn session_lexical_diversity(participant_lines: &[String]) -> f32 {
    let mut total = 0usize;
    let mut distinct: HashSet<String> = HashSet::new();
    for line in participant_lines {
        let stripped = line.replace(PARTICIPANT_TAG, "");
        let cleaned = PUNCT_RE.replace_all(&stripped, "");
        for word in cleaned.to_lowercase().split_whitespace() {
            total += 1;
            distinct.insert(word.to_string());
        }
    }
    if total == 0 {
        0.0
    } else {
        distinct.len() as f32 / total as f32
    }
}
