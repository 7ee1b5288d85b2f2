//! Tokenization shared by the keyword index and snippet deduplication.

use std::collections::HashSet;

/// English stop words dropped from every token stream.
pub const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is",
    "are", "was", "were", "be", "been", "being", "have", "has", "had", "do", "does", "did", "will",
    "would", "could", "should",
];

pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

/// Case-fold, treat everything except alphanumerics and `_` as a
/// separator, and drop stop words. Order and repeats are preserved.
pub fn tokenize(text: &str) -> Vec<String> {
    let folded: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { ' ' })
        .collect();

    folded
        .split_whitespace()
        .filter(|t| !is_stop_word(t))
        .map(str::to_string)
        .collect()
}

pub fn token_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}

/// Jaccard similarity of two token sets; 0 when either is empty.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_folds_and_splits() {
        assert_eq!(
            tokenize("Refund-Policy: 30 DAYS, no_questions!"),
            vec!["refund", "policy", "30", "days", "no_questions"]
        );
    }

    #[test]
    fn test_tokenize_drops_stop_words() {
        assert_eq!(tokenize("The cat and the hat"), vec!["cat", "hat"]);
        assert!(tokenize("the a an of").is_empty());
    }

    #[test]
    fn test_tokenize_keeps_unicode_letters() {
        assert_eq!(tokenize("Café crème"), vec!["café", "crème"]);
    }

    #[test]
    fn test_jaccard() {
        let a = token_set("alpha beta gamma");
        let b = token_set("beta gamma delta");
        assert!((jaccard(&a, &b) - 0.5).abs() < 1e-9);
        assert_eq!(jaccard(&a, &a), 1.0);
        assert_eq!(jaccard(&a, &HashSet::new()), 0.0);
    }
}
