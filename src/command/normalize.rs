//! Transcript normalization for command matching.

/// Characters stripped from the ends of a transcript before matching:
/// space, tab, newline, carriage return, form feed, vertical tab.
const TRANSCRIPT_TRIM: &[char] = &[' ', '\t', '\n', '\r', '\u{000C}', '\u{000B}'];

/// Normalize a raw transcript for matching: trim the whitespace set above
/// from both ends, then lowercase with locale-invariant casing. No other
/// transformation — no accent stripping, no punctuation removal.
pub fn normalize(transcript: &str) -> String {
    transcript.trim_matches(TRANSCRIPT_TRIM).to_lowercase()
}
