//! Token estimation
//!
//! Rough chars/4 heuristic used for rate-limit admission estimates and as
//! a fallback when a vendor response omits usage counters.

/// Estimate the token count of a text.
///
/// Uses the common ~4 characters per token approximation and never
/// returns zero, so even an empty text counts as one token.
#[must_use]
pub fn estimate_tokens(text: &str) -> u32 {
    let chars = text.chars().count();
    ((chars / 4).max(1)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens_short_text() {
        // Fewer than 4 chars still counts as one token
        assert_eq!(estimate_tokens(""), 1);
        assert_eq!(estimate_tokens("hi"), 1);
    }

    #[test]
    fn test_estimate_tokens_scales_with_length() {
        assert_eq!(estimate_tokens(&"a".repeat(400)), 100);
        assert_eq!(estimate_tokens(&"a".repeat(401)), 100);
        assert_eq!(estimate_tokens(&"a".repeat(404)), 101);
    }

    #[test]
    fn test_estimate_tokens_counts_chars_not_bytes() {
        // 8 multibyte chars -> 2 tokens
        assert_eq!(estimate_tokens("日本語のテキスト"), 2);
    }
}
