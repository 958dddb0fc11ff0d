//! Token estimation.
//!
//! Uses a character-based heuristic: ~4 bytes per token, rounded up.
//! Accurate within ~10% for BPE tokenizers on English text, and cheap
//! enough to run on every rendered block during assembly.

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 bytes. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    tokens_for_len(text.len())
}

/// Token estimate for a text of `len` bytes. Lets callers price a join
/// without building the joined string.
pub fn tokens_for_len(len: usize) -> usize {
    len.div_ceil(4)
}
