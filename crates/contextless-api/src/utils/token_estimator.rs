//! Token estimation for compression statistics.
//!
//! Word-based heuristic: English prose averages ~1.3 LLM tokens per word.
//! The reported compression ratio is computed from these estimates.

/// Tokens per word, expressed in tenths to keep the math in integers.
const TOKENS_PER_WORD_X10: usize = 13;

/// Estimate tokens as `ceil(words * 1.3)`.
pub fn estimate_tokens(text: &str) -> usize {
    let words = text.split_whitespace().count();
    (words * TOKENS_PER_WORD_X10).div_ceil(10)
}

/// Percentage of tokens saved, rounded. Negative when the output grew.
pub fn compression_ratio(original_tokens: usize, optimized_tokens: usize) -> i64 {
    if original_tokens == 0 {
        return 0;
    }

    let saved = original_tokens as f64 - optimized_tokens as f64;
    (saved / original_tokens as f64 * 100.0).round() as i64
}
