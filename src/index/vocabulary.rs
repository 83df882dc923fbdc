//! Token string to token ID mapping.
//!
//! The vocabulary is owned by the index, grows only during index build, and
//! is read-only to queries. Legalese words are seeded first so their IDs sit
//! below `len_legalese`; a token ID below that bound is a "high" token.
//! Digit-only and single-letter tokens are tracked in a junk side set; the
//! prefilter ignores them when counting how much of a rule is present.

use std::collections::HashMap;

use bit_set::BitSet;

use crate::rules::legalese::LEGALESE_WORDS;

/// Sentinel token ID for query tokens never seen by the index.
/// Not a valid vocabulary ID and never matchable.
pub const UNKNOWN_TID: u16 = u16::MAX;

#[derive(Debug, Clone)]
pub struct Vocabulary {
    ids: HashMap<String, u16>,
    words: Vec<String>,
    len_legalese: u16,
    junk_tids: BitSet,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new()
    }
}

impl Vocabulary {
    /// A vocabulary seeded with the legalese words at IDs `0..len_legalese`.
    pub fn new() -> Self {
        let mut ids = HashMap::with_capacity(LEGALESE_WORDS.len() * 2);
        let mut words = Vec::with_capacity(LEGALESE_WORDS.len() * 2);
        for (id, word) in LEGALESE_WORDS.iter().enumerate() {
            ids.insert((*word).to_string(), id as u16);
            words.push((*word).to_string());
        }
        Self {
            ids,
            words,
            len_legalese: LEGALESE_WORDS.len() as u16,
            junk_tids: BitSet::new(),
        }
    }

    /// Look up a token, interning it if new. Returns `None` once the u16 ID
    /// space is exhausted; index build treats that as fatal.
    pub fn get_or_intern(&mut self, token: &str) -> Option<u16> {
        if let Some(&id) = self.ids.get(token) {
            return Some(id);
        }
        // UNKNOWN_TID is reserved, so the last assignable ID is MAX - 1
        if self.words.len() >= usize::from(UNKNOWN_TID) {
            return None;
        }
        let id = self.words.len() as u16;
        self.ids.insert(token.to_string(), id);
        self.words.push(token.to_string());
        if is_junk_word(token) {
            self.junk_tids.insert(usize::from(id));
        }
        Some(id)
    }

    /// Read-only lookup for query tokenization.
    pub fn get(&self, token: &str) -> Option<u16> {
        self.ids.get(token).copied()
    }

    /// The word behind an ID, for diagnostics.
    pub fn word(&self, tid: u16) -> Option<&str> {
        self.words.get(usize::from(tid)).map(String::as_str)
    }

    /// Number of distinct tokens known.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Count of legalese words; IDs below this bound are high tokens.
    pub fn len_legalese(&self) -> u16 {
        self.len_legalese
    }

    /// True for legalese (discriminating) token IDs. `UNKNOWN_TID` is never
    /// high.
    pub fn is_high(&self, tid: u16) -> bool {
        tid < self.len_legalese
    }

    /// True for junk token IDs: digit-only and single-letter tokens, too
    /// common to count toward a rule's presence in the prefilter.
    pub fn is_junk(&self, tid: u16) -> bool {
        self.junk_tids.contains(usize::from(tid))
    }

    /// Take a token out of the junk set. The index builder protects tokens
    /// that make up a whole one-token rule, which must stay countable.
    pub(crate) fn clear_junk(&mut self, tid: u16) {
        self.junk_tids.remove(usize::from(tid));
    }
}

/// Digit-only tokens ("2", "1991") and single ASCII letters are junk: they
/// appear everywhere in prose and version strings and say nothing about
/// whether license text is present. Tokens are already case-folded.
fn is_junk_word(token: &str) -> bool {
    let bytes = token.as_bytes();
    if bytes.len() == 1 && bytes[0].is_ascii_lowercase() {
        return true;
    }
    !bytes.is_empty() && bytes.iter().all(u8::is_ascii_digit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legalese_seeded_in_order() {
        let vocab = Vocabulary::new();
        assert_eq!(vocab.get("license"), Some(0));
        assert_eq!(vocab.get("licence"), Some(1));
        assert_eq!(vocab.len(), LEGALESE_WORDS.len());
        assert_eq!(usize::from(vocab.len_legalese()), LEGALESE_WORDS.len());
    }

    #[test]
    fn test_intern_assigns_next_id() {
        let mut vocab = Vocabulary::new();
        let first = vocab.get_or_intern("hello").unwrap();
        assert_eq!(first, vocab.len_legalese());
        let second = vocab.get_or_intern("world").unwrap();
        assert_eq!(second, first + 1);
    }

    #[test]
    fn test_intern_is_idempotent() {
        let mut vocab = Vocabulary::new();
        let a = vocab.get_or_intern("hello").unwrap();
        let b = vocab.get_or_intern("hello").unwrap();
        assert_eq!(a, b);
        assert_eq!(vocab.len(), LEGALESE_WORDS.len() + 1);
    }

    #[test]
    fn test_get_unseen_is_none() {
        let vocab = Vocabulary::new();
        assert_eq!(vocab.get("zzz-not-a-token"), None);
    }

    #[test]
    fn test_is_high_boundary() {
        let mut vocab = Vocabulary::new();
        assert!(vocab.is_high(0));
        assert!(vocab.is_high(vocab.len_legalese() - 1));
        let low = vocab.get_or_intern("ordinary").unwrap();
        assert!(!vocab.is_high(low));
        assert!(!vocab.is_high(UNKNOWN_TID));
    }

    #[test]
    fn test_word_reverse_lookup() {
        let mut vocab = Vocabulary::new();
        let tid = vocab.get_or_intern("hello").unwrap();
        assert_eq!(vocab.word(tid), Some("hello"));
        assert_eq!(vocab.word(0), Some("license"));
        assert_eq!(vocab.word(UNKNOWN_TID), None);
    }

    #[test]
    fn test_digits_and_single_letters_are_junk() {
        let mut vocab = Vocabulary::new();
        for junk in ["2", "0", "1991", "c", "x"] {
            let tid = vocab.get_or_intern(junk).unwrap();
            assert!(vocab.is_junk(tid), "{junk}");
        }
        for word in ["v2", "x11", "hello", "ee"] {
            let tid = vocab.get_or_intern(word).unwrap();
            assert!(!vocab.is_junk(tid), "{word}");
        }
    }

    #[test]
    fn test_legalese_is_never_junk() {
        let vocab = Vocabulary::new();
        assert!(!vocab.is_junk(vocab.get("license").unwrap()));
        assert!(!vocab.is_junk(vocab.get("mit").unwrap()));
        assert!(!vocab.is_junk(UNKNOWN_TID));
    }

    #[test]
    fn test_clear_junk() {
        let mut vocab = Vocabulary::new();
        let tid = vocab.get_or_intern("996").unwrap();
        assert!(vocab.is_junk(tid));
        vocab.clear_junk(tid);
        assert!(!vocab.is_junk(tid));
        // re-seeing the token does not reclassify it
        assert_eq!(vocab.get_or_intern("996").unwrap(), tid);
        assert!(!vocab.is_junk(tid));
    }
}
