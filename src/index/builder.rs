//! Index construction and corpus validation.
//!
//! Building is deterministic: rules keep their given order, rule IDs are
//! their positions, and the vocabulary interns tokens in first-seen order
//! starting from the legalese seed. Any rule defect aborts the build with
//! a typed [`InvalidRuleError`].

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use aho_corasick::{AhoCorasick, MatchKind};
use anyhow::{Context, Result};

use crate::models::{InvalidRuleError, Rule};
use crate::rules::thresholds::{Thresholds, SMALL_RULE, TINY_RULE};
use crate::tokenize::tokenize_words;

use super::token_sets::{build_set_and_mset, high_multiset, high_subset, multiset_len};
use super::vocabulary::Vocabulary;
use super::{encode_tokens, token_sequence_hash, LicenseIndex, Postings};

/// Compile loaded rules into a [`LicenseIndex`].
pub fn build_index(rules: Vec<Rule>) -> Result<LicenseIndex> {
    let mut vocabulary = Vocabulary::new();
    let len_legalese = vocabulary.len_legalese();

    let count = rules.len();
    let mut tids_by_rid = Vec::with_capacity(count);
    let mut sets_by_rid = Vec::with_capacity(count);
    let mut high_sets_by_rid = Vec::with_capacity(count);
    let mut msets_by_rid = Vec::with_capacity(count);
    let mut high_msets_by_rid = Vec::with_capacity(count);
    let mut postings_by_rid = Vec::with_capacity(count);
    let mut occurrence_thresholds_by_rid = Vec::with_capacity(count);
    let mut unique_thresholds_by_rid = Vec::with_capacity(count);
    let mut approx_matchable_by_rid = Vec::with_capacity(count);
    let mut sequence_hashes: HashMap<[u8; 20], usize> = HashMap::with_capacity(count);
    let mut automaton_patterns: Vec<Vec<u8>> = Vec::new();
    let mut automaton_rids: Vec<usize> = Vec::new();

    for (rid, rule) in rules.iter().enumerate() {
        let words = tokenize_words(&rule.text);
        if words.is_empty() {
            return Err(InvalidRuleError::EmptyRule {
                identifier: rule.identifier.clone(),
            }
            .into());
        }
        let mut tids = Vec::with_capacity(words.len());
        for word in &words {
            let tid = vocabulary.get_or_intern(word).ok_or_else(|| {
                InvalidRuleError::VocabularyOverflow {
                    identifier: rule.identifier.clone(),
                }
            })?;
            tids.push(tid);
        }
        // the whole text of a one-token rule must stay countable
        if tids.len() == 1 {
            vocabulary.clear_junk(tids[0]);
        }

        match sequence_hashes.entry(token_sequence_hash(&tids)) {
            Entry::Occupied(existing) => {
                let other = &rules[*existing.get()];
                if other.license_expression != rule.license_expression {
                    return Err(InvalidRuleError::DuplicateRule {
                        identifier: rule.identifier.clone(),
                        duplicate_of: other.identifier.clone(),
                    }
                    .into());
                }
                log::warn!(
                    "rule {} repeats the token sequence of {} with the same expression",
                    rule.identifier,
                    other.identifier
                );
            }
            Entry::Vacant(slot) => {
                slot.insert(rid);
            }
        }

        tids_by_rid.push(tids);
    }

    // derived structures need the final junk set, so they wait until every
    // rule has been interned
    for (rid, rule) in rules.iter().enumerate() {
        let tids = &tids_by_rid[rid];
        let good = tids.iter().copied().filter(|&tid| !vocabulary.is_junk(tid));
        let (set, mset) = build_set_and_mset(good);
        let high_set = high_subset(&set, len_legalese);
        let high_mset = high_multiset(&mset, len_legalese);

        let length = tids.len();
        let good_length = multiset_len(&mset);
        let high_length = multiset_len(&high_mset);
        occurrence_thresholds_by_rid.push(Thresholds::from_occurrences(
            rule.minimum_coverage,
            good_length,
            high_length,
        ));
        unique_thresholds_by_rid.push(Thresholds::from_unique(
            rule.minimum_coverage,
            good_length,
            set.len(),
            high_set.len(),
        ));

        let mut postings = Postings::new();
        for (pos, &tid) in tids.iter().enumerate() {
            if tid < len_legalese {
                postings.entry(tid).or_insert_with(Vec::new).push(pos);
            }
        }

        if length < SMALL_RULE {
            automaton_patterns.push(encode_tokens(tids));
            automaton_rids.push(rid);
        }

        approx_matchable_by_rid
            .push(!rule.is_false_positive && !rule.is_continuous && length >= TINY_RULE);

        sets_by_rid.push(set);
        high_sets_by_rid.push(high_set);
        msets_by_rid.push(mset);
        high_msets_by_rid.push(high_mset);
        postings_by_rid.push(postings);
    }

    // overlapping search needs standard match semantics
    let automaton = AhoCorasick::builder()
        .match_kind(MatchKind::Standard)
        .build(&automaton_patterns)
        .context("building the small-rule automaton")?;

    log::debug!(
        "indexed {} rules: {} vocabulary tokens, {} small-rule patterns",
        count,
        vocabulary.len(),
        automaton_rids.len()
    );

    Ok(LicenseIndex {
        rules,
        vocabulary,
        tids_by_rid,
        sets_by_rid,
        high_sets_by_rid,
        msets_by_rid,
        high_msets_by_rid,
        postings_by_rid,
        occurrence_thresholds_by_rid,
        unique_thresholds_by_rid,
        approx_matchable_by_rid,
        sequence_hashes,
        automaton,
        automaton_rids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{make_false_positive, make_rule};

    #[test]
    fn test_build_assigns_dense_rule_ids() {
        let index = build_index(vec![
            make_rule("apache_ref", "apache-2.0", "licensed under the apache license"),
            make_rule("mit_ref", "mit", "released under the mit license"),
        ])
        .unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(index.rule(0).identifier, "apache_ref");
        assert_eq!(index.rule(1).identifier, "mit_ref");
    }

    #[test]
    fn test_vocabulary_covers_rule_tokens() {
        let index = build_index(vec![make_rule(
            "mit_ref",
            "mit",
            "released under the mit license",
        )])
        .unwrap();

        let vocab = index.vocabulary();
        for word in ["released", "under", "the", "mit", "license"] {
            assert!(vocab.get(word).is_some(), "{word} missing");
        }
        // legalese words keep their seeded low IDs
        assert!(vocab.is_high(vocab.get("license").unwrap()));
        assert!(vocab.is_high(vocab.get("mit").unwrap()));
        assert!(!vocab.is_high(vocab.get("released").unwrap()));
    }

    #[test]
    fn test_token_sequences_are_recorded() {
        let index = build_index(vec![make_rule("mit_ref", "mit", "mit license")]).unwrap();
        let tids = index.rule_tokens(0);
        assert_eq!(tids.len(), 2);
        assert_eq!(index.vocabulary().word(tids[0]), Some("mit"));
        assert_eq!(index.vocabulary().word(tids[1]), Some("license"));
    }

    #[test]
    fn test_hash_table_finds_whole_sequences() {
        let index = build_index(vec![
            make_rule("apache_ref", "apache-2.0", "licensed under the apache license"),
            make_rule("mit_ref", "mit", "released under the mit license"),
        ])
        .unwrap();

        let hash = token_sequence_hash(index.rule_tokens(1));
        assert_eq!(index.sequence_hashes.get(&hash), Some(&1));
    }

    #[test]
    fn test_small_rules_feed_the_automaton() {
        let long_text = "permission is hereby granted free of charge to any person \
                         obtaining a copy of this software and associated documentation \
                         files to deal in the software without restriction";
        let index = build_index(vec![
            make_rule("short", "mit", "mit license"),
            make_rule("long", "mit", long_text),
        ])
        .unwrap();

        assert_eq!(index.automaton_rids, vec![0]);
    }

    #[test]
    fn test_duplicate_with_different_expression_fails() {
        let err = build_index(vec![
            make_rule("a", "mit", "licensed under the mit license"),
            make_rule("b", "apache-2.0", "Licensed under the MIT License!"),
        ])
        .unwrap_err();

        let rule_err = err.downcast_ref::<InvalidRuleError>().unwrap();
        assert!(matches!(rule_err, InvalidRuleError::DuplicateRule { .. }));
    }

    #[test]
    fn test_duplicate_with_same_expression_is_tolerated() {
        let index = build_index(vec![
            make_rule("a", "mit", "licensed under the mit license"),
            make_rule("b", "mit", "Licensed under the MIT License!"),
        ])
        .unwrap();
        assert_eq!(index.len(), 2);
        // the hash table keeps the first
        let hash = token_sequence_hash(index.rule_tokens(0));
        assert_eq!(index.sequence_hashes.get(&hash), Some(&0));
    }

    #[test]
    fn test_approx_matchable_classification() {
        let seq_text = "this software is provided by the copyright holders and \
                        contributors as is and any express or implied warranties are disclaimed";
        let index = build_index(vec![
            make_rule("normal", "bsd-2-clause", seq_text),
            make_rule("tiny", "mit", "mit license"),
            make_false_positive("fp", "licensed premises of the public house"),
            Rule {
                is_continuous: true,
                ..make_rule("continuous", "mit", "permission is hereby granted free of charge")
            },
        ])
        .unwrap();

        assert!(index.approx_matchable_by_rid[0]);
        assert!(!index.approx_matchable_by_rid[1]);
        assert!(!index.approx_matchable_by_rid[2]);
        assert!(!index.approx_matchable_by_rid[3]);
    }

    #[test]
    fn test_junk_tokens_are_left_out_of_the_prefilter_sets() {
        let index = build_index(vec![make_rule(
            "gpl2_ref",
            "gpl-2.0",
            "gnu general public license version 2 or later",
        )])
        .unwrap();

        let vocab = index.vocabulary();
        assert!(vocab.is_junk(vocab.get("2").unwrap()));
        // eight tokens in the rule, seven once the digit is dropped
        assert_eq!(index.rule_tokens(0).len(), 8);
        assert_eq!(index.occurrence_thresholds_by_rid[0].length, 7);
        assert_eq!(index.unique_thresholds_by_rid[0].length, 7);
    }

    #[test]
    fn test_one_token_rules_protect_their_token_from_junk() {
        let index = build_index(vec![
            make_rule("anti_996_ref", "996-icu", "licensed under the anti 996 license"),
            make_rule("anti_996_tag", "996-icu", "996"),
        ])
        .unwrap();
        let vocab = index.vocabulary();
        assert!(!vocab.is_junk(vocab.get("996").unwrap()));
        assert_eq!(index.occurrence_thresholds_by_rid[0].length, 6);

        // without the one-token rule the digits stay junk
        let index = build_index(vec![make_rule(
            "anti_996_ref",
            "996-icu",
            "licensed under the anti 996 license",
        )])
        .unwrap();
        let vocab = index.vocabulary();
        assert!(vocab.is_junk(vocab.get("996").unwrap()));
        assert_eq!(index.occurrence_thresholds_by_rid[0].length, 5);
    }

    #[test]
    fn test_postings_hold_high_token_positions() {
        let index = build_index(vec![make_rule(
            "mit_ref",
            "mit",
            "the mit license covers this mit software",
        )])
        .unwrap();

        let tids = index.rule_tokens(0);
        let mit = index.vocabulary().get("mit").unwrap();
        assert_eq!(index.postings_by_rid[0].get(&mit), Some(&vec![1, 5]));
        // low tokens are not posted
        let the = index.vocabulary().get("the").unwrap();
        assert!(!index.postings_by_rid[0].contains_key(&the));
        assert_eq!(tids.len(), 7);
    }

    #[test]
    fn test_build_is_deterministic() {
        let rules = || {
            vec![
                make_rule("apache_ref", "apache-2.0", "licensed under the apache license"),
                make_rule("mit_ref", "mit", "released under the mit license"),
            ]
        };
        let a = build_index(rules()).unwrap();
        let b = build_index(rules()).unwrap();
        assert_eq!(a.tids_by_rid, b.tids_by_rid);
        assert_eq!(a.automaton_rids, b.automaton_rids);
    }

    #[test]
    fn test_empty_corpus_builds() {
        let index = build_index(Vec::new()).unwrap();
        assert!(index.is_empty());
    }
}
