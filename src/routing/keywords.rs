use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "can", "could", "do", "does", "for",
    "from", "how", "i", "im", "in", "is", "it", "its", "me", "my", "of", "on", "or", "please",
    "should", "so", "that", "the", "their", "there", "this", "to", "was", "we", "what", "whats",
    "when", "where", "which", "who", "why", "will", "with", "would", "you", "your",
];

fn punctuation() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\p{L}\p{N}\s]+").expect("static regex"))
}

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Lowercase, drop punctuation and split. Apostrophes are removed rather than
/// split on, so `what's` becomes `whats`.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase().replace(['\'', '\u{2019}'], "");
    punctuation()
        .replace_all(&lowered, " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Normalised token stream with stop-words removed, in input order.
pub fn content_tokens(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| !is_stop_word(t))
        .collect()
}

pub fn extract_keywords(text: &str) -> HashSet<String> {
    content_tokens(text).into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_strips_punctuation() {
        assert_eq!(
            tokenize("What's the weather in Tokyo?"),
            vec!["whats", "the", "weather", "in", "tokyo"]
        );
        assert_eq!(tokenize("  rust,   code!! "), vec!["rust", "code"]);
    }

    #[test]
    fn test_extract_keywords_removes_stop_words() {
        let keywords = extract_keywords("What's the weather in Tokyo?");
        assert_eq!(keywords.len(), 2);
        assert!(keywords.contains("weather"));
        assert!(keywords.contains("tokyo"));
    }

    #[test]
    fn test_empty_input() {
        assert!(extract_keywords("").is_empty());
        assert!(extract_keywords("?!...").is_empty());
    }
}
