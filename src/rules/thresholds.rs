//! Per-rule match thresholds for candidate prefiltering.
//!
//! Thresholds state how much of a rule must be present in a query run for
//! the rule to stay a candidate: longer rules tolerate partial presence,
//! short rules must be there nearly whole. They are derived once at index
//! build from the rule length and its minimum coverage.

/// Minimum token count for an approximate match to be worth aligning.
pub const MIN_MATCH_LENGTH: usize = 4;

/// Minimum count of high (legalese) tokens for an approximate match.
pub const MIN_MATCH_HIGH_LENGTH: usize = 3;

/// Rules shorter than this must match all their tokens in the prefilter.
pub const SMALL_RULE: usize = 15;

/// Rules shorter than this are excluded from sequence alignment entirely
/// and served by the hash and automaton matchers only.
pub const TINY_RULE: usize = 6;

/// Minimum token presence a rule demands from a query run.
///
/// Two instances exist per rule: one counting unique token IDs (the set
/// stage) and one counting occurrences (the multiset stage).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// High (legalese) token count of the rule in this domain.
    pub high_len: usize,
    /// Low token count of the rule in this domain.
    pub low_len: usize,
    /// Total token count of the rule in this domain.
    pub length: usize,
    /// Minimum high tokens that must intersect.
    pub min_high: usize,
    /// Minimum total tokens that must intersect.
    pub min_len: usize,
    /// Small rules must match all their tokens.
    pub small: bool,
}

impl Thresholds {
    /// Thresholds over token occurrences.
    ///
    /// `length` and `high_length` count every occurrence. A rule with
    /// minimum coverage 100 must be present whole; otherwise the floor
    /// relaxes with rule length.
    pub fn from_occurrences(minimum_coverage: u8, length: usize, high_length: usize) -> Self {
        let (min_len, min_high) = if minimum_coverage == 100 {
            (length, high_length)
        } else if length < 10 {
            (length, high_length)
        } else if length < 30 {
            (length / 2, high_length.min(MIN_MATCH_HIGH_LENGTH))
        } else if length < 200 {
            (MIN_MATCH_LENGTH, high_length.min(MIN_MATCH_HIGH_LENGTH))
        } else {
            (length / 10, high_length / 10)
        };
        Self {
            high_len: high_length,
            low_len: length - high_length,
            length,
            min_high,
            min_len,
            small: length < SMALL_RULE,
        }
    }

    /// Thresholds over unique token IDs.
    ///
    /// Banding still follows the rule's full `length`; the counts and
    /// floors are in unique-token terms.
    pub fn from_unique(
        minimum_coverage: u8,
        length: usize,
        length_unique: usize,
        high_length_unique: usize,
    ) -> Self {
        let (min_len, min_high) = if minimum_coverage == 100 {
            (length_unique, high_length_unique)
        } else if length > 200 {
            (length / 10, high_length_unique / 10)
        } else if length < 5 {
            (length_unique, high_length_unique)
        } else if length < 10 {
            let min_len = if length_unique < 2 {
                length_unique
            } else {
                length_unique - 1
            };
            (min_len, high_length_unique)
        } else if length < 20 {
            (high_length_unique, high_length_unique)
        } else {
            (
                MIN_MATCH_LENGTH,
                high_length_unique.min(MIN_MATCH_HIGH_LENGTH),
            )
        };
        Self {
            high_len: high_length_unique,
            low_len: length_unique - high_length_unique,
            length: length_unique,
            min_high,
            min_len,
            small: length < SMALL_RULE,
        }
    }
}
