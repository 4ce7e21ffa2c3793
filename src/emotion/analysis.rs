//! Heuristic emotion deltas derived from a response text.
//!
//! The mapping is a pure function of the text: the same response always
//! yields the same delta.

use super::{EmotionDelta, EmotionDimension};
use crate::routing::keywords::tokenize;

const HEDGES: &[&str] = &["maybe", "perhaps", "might", "possibly", "unsure", "unclear"];
const HEDGE_PHRASES: &[&str] = &["not sure", "i think"];
const POSITIVE: &[&str] = &[
    "great", "glad", "happy", "excellent", "love", "wonderful", "success", "delighted",
];
const NEGATIVE: &[&str] = &[
    "error", "sorry", "apologize", "cannot", "cant", "failed", "unable", "unfortunately",
];

const MAX_HITS: usize = 3;
const LONG_RESPONSE_WORDS: usize = 20;
const SHORT_RESPONSE_WORDS: usize = 5;

fn count_words(tokens: &[String], words: &[&str]) -> usize {
    tokens
        .iter()
        .filter(|t| words.contains(&t.as_str()))
        .count()
        .min(MAX_HITS)
}

fn count_phrases(tokens: &[String], phrases: &[&str]) -> usize {
    let joined = format!(" {} ", tokens.join(" "));
    phrases
        .iter()
        .map(|p| joined.matches(&format!(" {} ", p)).count())
        .sum::<usize>()
        .min(MAX_HITS)
}

pub fn analyze(text: &str) -> EmotionDelta {
    use EmotionDimension::*;

    let tokens = tokenize(text);
    let mut delta = EmotionDelta::new();

    if tokens.is_empty() {
        return delta
            .with(Confidence, -0.1)
            .with(Satisfaction, -0.1);
    }

    if tokens.len() >= LONG_RESPONSE_WORDS {
        delta.add(Satisfaction, 0.05);
    } else if tokens.len() < SHORT_RESPONSE_WORDS {
        delta.add(Satisfaction, -0.03);
    }

    let exclamations = text.matches('!').count().min(MAX_HITS) as f32;
    delta.add(Joy, 0.03 * exclamations);
    delta.add(Energy, 0.04 * exclamations);

    let questions = text.matches('?').count().min(MAX_HITS) as f32;
    delta.add(Curiosity, 0.04 * questions);

    let hedges = (count_words(&tokens, HEDGES) + count_phrases(&tokens, HEDGE_PHRASES))
        .min(MAX_HITS) as f32;
    if hedges > 0.0 {
        delta.add(Confidence, -0.05 * hedges);
        delta.add(Calmness, -0.02 * hedges);
    } else {
        delta.add(Confidence, 0.03);
    }

    let positive = count_words(&tokens, POSITIVE) as f32;
    delta.add(Joy, 0.04 * positive);
    delta.add(Satisfaction, 0.03 * positive);

    let negative = count_words(&tokens, NEGATIVE) as f32;
    delta.add(Satisfaction, -0.05 * negative);
    delta.add(Calmness, -0.04 * negative);
    delta.add(Joy, -0.02 * negative);

    delta
}
