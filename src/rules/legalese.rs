//! Built-in dictionary of license-discriminating words (legalese).
//!
//! These words are seeded into the vocabulary first, in list order, so they
//! occupy the low token-ID range. A token ID below the legalese count marks
//! a "high" token: one that carries real signal that license text is
//! present, as opposed to common prose words.

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Words specific to license and legal texts, lowercased, one token each.
/// Order is part of the index format: the vocabulary assigns IDs in list
/// order, so reordering this list changes token IDs.
pub static LEGALESE_WORDS: &[&str] = &[
    "license",
    "licence",
    "licensed",
    "licensee",
    "licensor",
    "sublicense",
    "copyright",
    "copyrighted",
    "copyleft",
    "redistribute",
    "redistribution",
    "redistributions",
    "reproduce",
    "reproduction",
    "permission",
    "permissions",
    "permitted",
    "derivative",
    "derived",
    "noncommercial",
    "agreement",
    "warranty",
    "warranties",
    "disclaimer",
    "disclaimers",
    "disclaimed",
    "liability",
    "liabilities",
    "liable",
    "contributor",
    "contributors",
    "contribution",
    "contributions",
    "modification",
    "modifications",
    "restriction",
    "restrictions",
    "intellectual",
    "proprietary",
    "patent",
    "patents",
    "trademark",
    "trademarks",
    "infringement",
    "merchantability",
    "fitness",
    "noninfringement",
    "damages",
    "incidental",
    "consequential",
    "exemplary",
    "punitive",
    "indemnify",
    "indemnification",
    "accordance",
    "pursuant",
    "hereby",
    "herein",
    "hereunder",
    "hereinafter",
    "thereof",
    "foregoing",
    "aforementioned",
    "notwithstanding",
    "whereas",
    "terminate",
    "terminated",
    "termination",
    "grant",
    "granted",
    "grants",
    "obligations",
    "enforceable",
    "statutory",
    "severability",
    "jurisdiction",
    "governing",
    "perpetual",
    "irrevocable",
    "revocable",
    "royalty",
    "royalties",
    "worldwide",
    "sublicensable",
    "transferable",
    "acknowledgement",
    "acknowledgment",
    "attribution",
    "tort",
    "negligence",
    "waiver",
    "lawful",
    "unenforceable",
    "conveyance",
    "stipulated",
    // license family names and acronyms
    "gnu",
    "gpl",
    "lgpl",
    "agpl",
    "affero",
    "lesser",
    "mit",
    "bsd",
    "apache",
    "mozilla",
    "mpl",
    "epl",
    "eclipse",
    "cddl",
    "zlib",
    "openssl",
    "unlicense",
    "freeware",
    "shareware",
    "spdx",
    "eula",
];

static LEGALESE_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| LEGALESE_WORDS.iter().copied().collect());

pub fn is_legalese_word(word: &str) -> bool {
    LEGALESE_SET.contains(word)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenize::tokenize_words;

    #[test]
    fn test_known_words() {
        assert!(is_legalese_word("license"));
        assert!(is_legalese_word("licence"));
        assert!(is_legalese_word("copyright"));
        assert!(is_legalese_word("merchantability"));
        assert!(is_legalese_word("gpl"));
        assert!(is_legalese_word("mit"));
    }

    #[test]
    fn test_common_prose_is_not_legalese() {
        assert!(!is_legalese_word("hello"));
        assert!(!is_legalese_word("the"));
        assert!(!is_legalese_word("software"));
    }

    #[test]
    fn test_no_duplicates() {
        assert_eq!(LEGALESE_SET.len(), LEGALESE_WORDS.len());
    }

    #[test]
    fn test_words_survive_the_tokenizer() {
        // every legalese word must tokenize to itself, or it could never
        // be seen in a token stream
        for word in LEGALESE_WORDS {
            assert_eq!(tokenize_words(word), vec![word.to_string()], "{word}");
        }
    }

    #[test]
    fn test_words_are_lowercase() {
        for word in LEGALESE_WORDS {
            assert_eq!(*word, word.to_lowercase(), "{word}");
        }
    }
}
