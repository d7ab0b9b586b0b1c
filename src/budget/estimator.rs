//! Token estimation utilities.
//!
//! Wrapped commands never report real token counts, so this module provides
//! a word/punctuation heuristic that is cheap enough to run on every chunk of
//! captured output.

/// Characters that usually become tokens of their own in source code.
const SPECIAL_CHARS: &str = "{}()[]<>:;,.\"'`~!@#$%^&*+=|\\/?-";

/// Estimate the number of tokens in `text`.
///
/// Returns `0` for an empty string and at least `1` for anything else,
/// including whitespace-only input.
pub fn estimate(text: &str) -> u64 {
    if text.is_empty() {
        return 0;
    }

    let mut tokens: u64 = text.split_whitespace().map(word_tokens).sum();

    let mut specials = 0u64;
    let mut newlines = 0u64;
    for c in text.chars() {
        if c == '\n' {
            newlines += 1;
        } else if SPECIAL_CHARS.contains(c) {
            specials += 1;
        }
    }

    // Half a token per special character, rounded up
    tokens += specials.div_ceil(2);
    tokens += newlines;

    tokens.max(1)
}

/// Token cost of a single whitespace-delimited word.
fn word_tokens(word: &str) -> u64 {
    let len = word.chars().count() as u64;
    match len {
        0..=4 => 1,
        5..=8 => len.div_ceil(4),
        _ => len.div_ceil(3),
    }
}

/// Format a token count for humans (`950`, `12.3k`, `1.25M`).
pub fn format_tokens(count: u64) -> String {
    if count >= 1_000_000 {
        format!("{:.2}M", count as f64 / 1_000_000.0)
    } else if count >= 1_000 {
        format!("{:.1}k", count as f64 / 1_000.0)
    } else {
        count.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_string() {
        assert_eq!(estimate(""), 0);
    }

    #[test]
    fn test_non_empty_is_at_least_one() {
        assert_eq!(estimate(" "), 1);
        assert_eq!(estimate("\t \t"), 1);
        assert_eq!(estimate("a"), 1);
    }

    #[test]
    fn test_short_words() {
        // Four short words, no punctuation
        assert_eq!(estimate("the cat sat down"), 4);
    }

    #[test]
    fn test_medium_and_long_words() {
        // "hello" (5) -> 2, "function" (8) -> 2, "implementation" (14) -> 5
        assert_eq!(estimate("hello"), 2);
        assert_eq!(estimate("function"), 2);
        assert_eq!(estimate("implementation"), 5);
    }

    #[test]
    fn test_special_characters() {
        // "fn" 1 + "main()" 2 + "{}" 1 = 4 words, 4 specials -> +2
        assert_eq!(estimate("fn main() {}"), 6);
        // A single special rounds up to one extra token
        assert_eq!(estimate("a."), 2);
    }

    #[test]
    fn test_newlines_counted() {
        // Two words + two newlines
        assert_eq!(estimate("one\ntwo\n"), 4);
    }

    #[test]
    fn test_multibyte_characters_counted_by_char() {
        // Four chars even though it is more than four bytes
        assert_eq!(estimate("héllo"), 2);
        assert_eq!(estimate("日本語だ"), 1);
    }

    #[test]
    fn test_deterministic() {
        let text = "let x = vec![1, 2, 3];\nprintln!(\"{:?}\", x);\n";
        assert_eq!(estimate(text), estimate(text));
    }

    #[test]
    fn test_format_tokens() {
        assert_eq!(format_tokens(0), "0");
        assert_eq!(format_tokens(999), "999");
        assert_eq!(format_tokens(1_000), "1.0k");
        assert_eq!(format_tokens(12_345), "12.3k");
        assert_eq!(format_tokens(1_000_000), "1.00M");
        assert_eq!(format_tokens(2_345_678), "2.35M");
    }
}
