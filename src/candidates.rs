//! Prefilter: narrow the rule set to candidates worth aligning.
//!
//! Sequence alignment is the expensive stage, so before it runs every
//! approx-matchable rule is screened with two cheap set comparisons
//! against the query run: first unique token IDs, then occurrence counts.
//! A rule survives only when the intersection can still satisfy its
//! thresholds. The output carries no ranking and no truncation; order is
//! by rule ID so downstream tie-breaking stays deterministic.

use crate::index::token_sets::{
    build_set_and_mset, high_multiset, high_subset, multiset_intersection_len, multiset_len,
    set_intersection_len,
};
use crate::index::LicenseIndex;
use crate::query::QueryRun;
use crate::rules::thresholds::Thresholds;

/// A rule that survived the prefilter, with its set-similarity measures.
#[derive(Debug, Clone)]
pub(crate) struct CandidateRule {
    pub(crate) rid: usize,
    /// Shared occurrences over the occurrence union, in 0..=1.
    pub(crate) resemblance: f32,
    /// Shared occurrences over the rule length, in 0..=1.
    pub(crate) containment: f32,
}

/// Compare matchable query-run tokens against every approx-matchable rule
/// and keep the rules whose thresholds are still reachable.
pub(crate) fn compute_candidates(run: &QueryRun<'_, '_>, index: &LicenseIndex) -> Vec<CandidateRule> {
    let vocabulary = index.vocabulary();
    let len_legalese = vocabulary.len_legalese();
    // junk tokens count for neither side of the comparison
    let (qset, qmset) = build_set_and_mset(
        run.matchable_tokens()
            .filter(|&tid| !vocabulary.is_junk(tid)),
    );
    let qhigh_set = high_subset(&qset, len_legalese);
    if qhigh_set.is_empty() {
        return Vec::new();
    }
    let qhigh_mset = high_multiset(&qmset, len_legalese);
    let qmset_len = multiset_len(&qmset);

    let mut candidates = Vec::new();
    for rid in 0..index.len() {
        if !index.approx_matchable_by_rid[rid] {
            continue;
        }

        // set stage: unique token IDs
        let high_inter = set_intersection_len(&qhigh_set, &index.high_sets_by_rid[rid]);
        let inter = set_intersection_len(&qset, &index.sets_by_rid[rid]);
        let unique = &index.unique_thresholds_by_rid[rid];
        if !meets_thresholds(high_inter, inter - high_inter, unique) {
            continue;
        }

        // multiset stage: occurrences
        let high_minter = multiset_intersection_len(&qhigh_mset, &index.high_msets_by_rid[rid]);
        let minter = multiset_intersection_len(&qmset, &index.msets_by_rid[rid]);
        let occurrences = &index.occurrence_thresholds_by_rid[rid];
        if !meets_thresholds(high_minter, minter - high_minter, occurrences) {
            continue;
        }

        let union_len = qmset_len + occurrences.length - minter;
        candidates.push(CandidateRule {
            rid,
            resemblance: minter as f32 / union_len as f32,
            containment: minter as f32 / occurrences.length as f32,
        });
    }

    log::debug!(
        "prefilter: {} of {} rules survive",
        candidates.len(),
        index.len()
    );
    candidates
}

/// True when an intersection of `high_inter` high and `low_inter` low
/// tokens can still satisfy the thresholds. Small rules must account for
/// every token they have; others only for the derived floors.
fn meets_thresholds(high_inter: usize, low_inter: usize, thresholds: &Thresholds) -> bool {
    if high_inter == 0 {
        return false;
    }
    if thresholds.small && high_inter < thresholds.high_len {
        return false;
    }
    if high_inter < thresholds.min_high {
        return false;
    }
    let inter = high_inter + low_inter;
    if thresholds.small && inter < thresholds.length {
        return false;
    }
    inter >= thresholds.min_len
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Query;
    use crate::test_utils::{
        build_test_index, make_false_positive, make_rule, make_rule_with_coverage,
    };

    fn candidates_for(index: &LicenseIndex, text: &str) -> Vec<CandidateRule> {
        let query = Query::new(text, index);
        let mut all = Vec::new();
        for &(start, end) in query.run_ranges() {
            all.extend(compute_candidates(&query.run(start, end), index));
        }
        all
    }

    #[test]
    fn test_whole_rule_present_is_a_candidate() {
        let index = build_test_index(vec![make_rule(
            "mit_terms",
            "mit",
            "licensed under the terms of the mit license",
        )]);
        let found = candidates_for(&index, "licensed under the terms of the mit license");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].rid, 0);
        assert_eq!(found[0].containment, 1.0);
        assert_eq!(found[0].resemblance, 1.0);
    }

    #[test]
    fn test_unrelated_query_yields_nothing() {
        let index = build_test_index(vec![make_rule(
            "mit_terms",
            "mit",
            "licensed under the terms of the mit license",
        )]);
        assert!(candidates_for(&index, "the quick brown fox jumps over it").is_empty());
    }

    #[test]
    fn test_false_positive_rules_never_survive() {
        let index = build_test_index(vec![make_false_positive(
            "fp_license_file_ref",
            "see the license file in the top level directory",
        )]);
        let found = candidates_for(&index, "see the license file in the top level directory");
        assert!(found.is_empty());
    }

    #[test]
    fn test_tiny_rules_are_not_candidates() {
        let index = build_test_index(vec![make_rule("mit_short", "mit", "the mit license")]);
        assert!(candidates_for(&index, "the mit license").is_empty());
    }

    #[test]
    fn test_partial_presence_below_thresholds_is_rejected() {
        let index = build_test_index(vec![make_rule(
            "mit_terms",
            "mit",
            "licensed under the terms of the mit license",
        )]);
        // half the rule, and minimum_coverage is 100
        assert!(candidates_for(&index, "licensed under the terms").is_empty());
    }

    #[test]
    fn test_small_rule_missing_a_token_is_rejected() {
        let index = build_test_index(vec![make_rule_with_coverage(
            "mit_terms",
            "mit",
            "licensed under the terms of the mit license",
            0,
        )]);
        // rules under ten tokens must be present whole even without a
        // minimum coverage
        assert!(candidates_for(&index, "licensed under the terms of the mit").is_empty());
    }

    #[test]
    fn test_relaxed_coverage_tolerates_partial_text() {
        let index = build_test_index(vec![make_rule_with_coverage(
            "apache_notice",
            "apache-2.0",
            "this software is licensed under the apache license version two \
             you may not use this file except in compliance with",
            50,
        )]);
        let found = candidates_for(
            &index,
            "this software is licensed under the apache license version two you may",
        );
        assert_eq!(found.len(), 1);
        assert!(found[0].containment < 1.0);
        assert!(found[0].containment >= 0.5);
    }

    #[test]
    fn test_digit_tokens_do_not_gate_candidacy() {
        let index = build_test_index(vec![make_rule(
            "gpl2_ref",
            "gpl-2.0",
            "gnu general public license version 2 or later",
        )]);
        // the digit is missing from the query; candidacy is decided on
        // the word tokens alone
        let found = candidates_for(&index, "gnu general public license version or later");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].containment, 1.0);
    }

    #[test]
    fn test_candidates_ordered_by_rule_id() {
        let index = build_test_index(vec![
            make_rule(
                "mit_terms",
                "mit",
                "licensed under the terms of the mit license",
            ),
            make_rule(
                "apache_terms",
                "apache-2.0",
                "licensed under the terms of the apache license",
            ),
        ]);
        let found = candidates_for(
            &index,
            "licensed under the terms of the mit license and also \
             licensed under the terms of the apache license",
        );
        let rids: Vec<usize> = found.iter().map(|c| c.rid).collect();
        assert_eq!(rids, vec![0, 1]);
    }

    #[test]
    fn test_consumed_positions_do_not_feed_the_prefilter() {
        let index = build_test_index(vec![make_rule(
            "mit_terms",
            "mit",
            "licensed under the terms of the mit license",
        )]);
        let mut query = Query::new("licensed under the terms of the mit license", &index);
        let whole = crate::spans::Span::from_bounds(0, query.len() - 1);
        query.subtract(&whole);
        let run = query.run(0, query.len());
        assert!(compute_candidates(&run, &index).is_empty());
    }
}
