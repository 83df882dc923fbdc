//! The license rule index.
//!
//! The index owns the rules and everything derived from their token
//! sequences: the vocabulary, per-rule token arrays and set structures for
//! the prefilter, high-token postings for sequence alignment, the
//! whole-rule hash table and the small-rule automaton. It is built once
//! and read-only afterwards, so it can be shared across threads behind an
//! `Arc` with no locking.

pub mod builder;
pub mod cache;
pub mod token_sets;
pub mod vocabulary;

use std::collections::HashMap;

use aho_corasick::AhoCorasick;
use bit_set::BitSet;
use sha1::{Digest, Sha1};

use crate::models::Rule;
use crate::rules::thresholds::Thresholds;

use self::token_sets::TokenMultiset;
use self::vocabulary::Vocabulary;

/// High-token postings of one rule: token ID to the sorted rule positions
/// holding it.
pub(crate) type Postings = HashMap<u16, Vec<usize>>;

#[derive(Debug)]
pub struct LicenseIndex {
    pub(crate) rules: Vec<Rule>,
    pub(crate) vocabulary: Vocabulary,

    // per-rule data, keyed by dense rule ID; set structures and thresholds
    // leave junk tokens out
    pub(crate) tids_by_rid: Vec<Vec<u16>>,
    pub(crate) sets_by_rid: Vec<BitSet>,
    pub(crate) high_sets_by_rid: Vec<BitSet>,
    pub(crate) msets_by_rid: Vec<TokenMultiset>,
    pub(crate) high_msets_by_rid: Vec<TokenMultiset>,
    pub(crate) postings_by_rid: Vec<Postings>,
    pub(crate) occurrence_thresholds_by_rid: Vec<Thresholds>,
    pub(crate) unique_thresholds_by_rid: Vec<Thresholds>,
    /// Eligible for sequence alignment; tiny, continuous and
    /// false-positive rules are served by hash and automaton only.
    pub(crate) approx_matchable_by_rid: Vec<bool>,

    /// SHA-1 over a whole token sequence, to the rule ID holding it.
    pub(crate) sequence_hashes: HashMap<[u8; 20], usize>,

    /// Automaton over all small rules, patterns being token sequences
    /// encoded as little-endian byte pairs.
    pub(crate) automaton: AhoCorasick,
    /// Automaton pattern index to rule ID.
    pub(crate) automaton_rids: Vec<usize>,
}

impl LicenseIndex {
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule(&self, rid: usize) -> &Rule {
        &self.rules[rid]
    }

    /// Number of indexed rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub(crate) fn rule_tokens(&self, rid: usize) -> &[u16] {
        &self.tids_by_rid[rid]
    }
}

/// SHA-1 over a token-ID sequence in little-endian byte order. Identical
/// sequences hash identically regardless of the texts they tokenized from.
pub(crate) fn token_sequence_hash(tids: &[u16]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    for &tid in tids {
        hasher.update(tid.to_le_bytes());
    }
    hasher.finalize().into()
}

/// Encode a token-ID sequence as bytes for the automaton: two bytes per
/// token, little endian, so every token boundary sits at an even offset.
pub(crate) fn encode_tokens(tids: &[u16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(tids.len() * 2);
    for &tid in tids {
        bytes.extend_from_slice(&tid.to_le_bytes());
    }
    bytes
}
