//! Query-centred excerpts for search hits.
//!
//! Works on `char`s throughout so windows never split a UTF-8 sequence.
//! Matching is case-insensitive: each character is folded to the first
//! character of its lowercase mapping, which keeps positions aligned with
//! the original text.

use crate::tokenize::tokenize;

pub const DEFAULT_SNIPPET_WIDTH: usize = 280;

const LEADING_MARK: &str = "… ";
const TRAILING_MARK: &str = " …";

fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

fn find_chars(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Locate the query in `text`: the full query first, then the earliest
/// occurrence of any query token. Returns `(start, len)` in chars.
fn locate(folded: &[char], query: &str) -> Option<(usize, usize)> {
    let q: Vec<char> = query.trim().chars().map(fold).collect();
    if let Some(pos) = find_chars(folded, &q) {
        return Some((pos, q.len()));
    }
    tokenize(query)
        .into_iter()
        .filter_map(|token| {
            let t: Vec<char> = token.chars().collect();
            find_chars(folded, &t).map(|pos| (pos, t.len()))
        })
        .min_by_key(|&(pos, _)| pos)
}

/// Excerpt of at most `width` characters around the first query match.
///
/// The match is centred when it fits; a match longer than `width` is cut
/// after its first `width` characters. Truncated sides are marked with `…`,
/// which is not counted against `width`. Without a match the leading
/// `width` characters are returned.
pub fn extract_snippet(text: &str, query: &str, width: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return String::new();
    }
    let folded: Vec<char> = chars.iter().copied().map(fold).collect();

    let Some((pos, len)) = locate(&folded, query) else {
        let head: String = chars.iter().take(width).collect();
        let head = head.trim().to_string();
        return if chars.len() > width {
            format!("{}{}", head, TRAILING_MARK)
        } else {
            head
        };
    };

    let pad = width.saturating_sub(len) / 2;
    let end = (pos.saturating_sub(pad) + width).min(chars.len());
    let start = if len >= width { pos } else { end.saturating_sub(width) };

    let body: String = chars[start..end].iter().collect();
    let mut snippet = body.trim().to_string();
    if start > 0 {
        snippet.insert_str(0, LEADING_MARK);
    }
    if end < chars.len() {
        snippet.push_str(TRAILING_MARK);
    }
    snippet
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_returned_whole() {
        assert_eq!(
            extract_snippet("Refunds within 30 days.", "refund", 280),
            "Refunds within 30 days."
        );
    }

    #[test]
    fn test_empty_text() {
        assert_eq!(extract_snippet("", "anything", 280), "");
    }

    #[test]
    fn test_window_centred_on_match_with_markers() {
        let text = format!("{}needle{}", "a ".repeat(100), " b".repeat(100));
        let snippet = extract_snippet(&text, "NEEDLE", 20);
        assert!(snippet.starts_with("… "));
        assert!(snippet.ends_with(" …"));
        assert!(snippet.contains("needle"));
    }

    #[test]
    fn test_falls_back_to_token_match() {
        let text = format!("{} the invoice total is due {}", "x".repeat(50), "y".repeat(50));
        let snippet = extract_snippet(&text, "overdue invoice", 20);
        assert!(snippet.contains("invoice"));
    }

    #[test]
    fn test_earliest_token_wins() {
        let text = "beta comes first, then alpha";
        let snippet = extract_snippet(text, "alpha beta", 8);
        assert!(snippet.starts_with("beta"));
    }

    #[test]
    fn test_no_match_returns_leading_text() {
        let text = "z".repeat(500);
        let snippet = extract_snippet(&text, "missing", 280);
        assert!(snippet.ends_with(" …"));
        assert_eq!(snippet.chars().count(), 280 + 2);
        assert_eq!(extract_snippet("short", "missing", 280), "short");
    }

    #[test]
    fn test_window_never_exceeds_width() {
        let text = format!("{} refund policy for annual plans {}", "a".repeat(60), "b".repeat(60));
        for width in [5, 12, 40] {
            let snippet = extract_snippet(&text, "refund policy for annual plans", width);
            let body = snippet.trim_start_matches(LEADING_MARK).trim_end_matches(TRAILING_MARK);
            assert!(body.chars().count() <= width, "width {width}: {snippet:?}");
            if width >= 30 {
                assert!(body.contains("refund policy for annual plans"));
            } else {
                assert!("refund policy for annual plans".starts_with(body), "{body:?}");
            }
        }
    }

    #[test]
    fn test_window_near_end_keeps_full_width() {
        let text = format!("{}tail", "x".repeat(50));
        let snippet = extract_snippet(&text, "tail", 10);
        assert_eq!(snippet, "… xxxxxxtail");
    }

    #[test]
    fn test_multibyte_text_is_safe() {
        let text = format!("{}Ünïcödé match{}", "é".repeat(300), "ß".repeat(300));
        let snippet = extract_snippet(&text, "ünïcödé", 10);
        assert!(snippet.contains("Ünïcödé"));
    }
}
