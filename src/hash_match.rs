//! Exact whole-run matching through the token-sequence hash table.

use anyhow::Result;

use crate::deadline::Deadline;
use crate::index::{token_sequence_hash, LicenseIndex};
use crate::models::{LicenseMatch, MatcherKind};
use crate::query::QueryRun;
use crate::spans::Span;

/// Match a query run that is, post-tokenization, exactly one rule text.
///
/// One hash and one table lookup, so it runs before everything else; a
/// hit settles the whole run at full coverage. Runs holding any token the
/// index has never seen can never hit, since the sentinel ID occurs in no
/// indexed sequence.
pub(crate) fn hash_match(
    index: &LicenseIndex,
    run: &QueryRun<'_, '_>,
    deadline: &Deadline,
) -> Result<Vec<LicenseMatch>> {
    if deadline.exceeded() {
        return Ok(Vec::new());
    }

    let digest = token_sequence_hash(run.tokens());
    let mut matches = Vec::new();
    if let Some(&rid) = index.sequence_hashes.get(&digest) {
        let qspan = Span::from_range(run.start..run.end);
        let ispan = Span::from_range(0..index.rule_tokens(rid).len());
        matches.push(LicenseMatch::from_rule_spans(
            index,
            run.query,
            rid,
            MatcherKind::Hash,
            qspan,
            ispan,
        ));
    }
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Query;
    use crate::test_utils::{build_test_index, make_rule};

    fn match_whole_text(index: &LicenseIndex, text: &str) -> Vec<LicenseMatch> {
        let query = Query::new(text, index);
        let mut found = Vec::new();
        for &(start, end) in query.run_ranges() {
            let run = query.run(start, end);
            found.extend(hash_match(index, &run, &Deadline::none()).unwrap());
        }
        found
    }

    fn two_rule_index() -> LicenseIndex {
        build_test_index(vec![
            make_rule("mit_ref", "mit", "released under the mit license"),
            make_rule("apache_ref", "apache-2.0", "licensed under the apache license"),
        ])
    }

    #[test]
    fn test_exact_text_matches_whole_rule() {
        let index = two_rule_index();
        let found = match_whole_text(&index, "released under the MIT license");
        assert_eq!(found.len(), 1);

        let m = &found[0];
        assert_eq!(m.rule_id, Some(0));
        assert_eq!(m.license_expression, "mit");
        assert_eq!(m.matcher, MatcherKind::Hash);
        assert_eq!(m.match_coverage, 100.0);
        assert_eq!(m.score, 100.0);
        assert_eq!(m.qspan, Span::from_bounds(0, 4));
        assert_eq!(m.ispan, Span::from_bounds(0, 4));
        assert_eq!(m.matched_length, 5);
    }

    #[test]
    fn test_second_rule_resolves_to_its_own_id() {
        let index = two_rule_index();
        let found = match_whole_text(&index, "licensed under the apache license");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].rule_id, Some(1));
        assert_eq!(found[0].license_expression, "apache-2.0");
    }

    #[test]
    fn test_extra_token_defeats_the_hash() {
        let index = two_rule_index();
        assert!(match_whole_text(&index, "code released under the mit license").is_empty());
    }

    #[test]
    fn test_partial_text_does_not_match() {
        let index = two_rule_index();
        assert!(match_whole_text(&index, "under the mit license").is_empty());
    }

    #[test]
    fn test_high_span_covers_legalese_positions_only() {
        let index = two_rule_index();
        let found = match_whole_text(&index, "released under the mit license");
        // released/under/the are low; mit and license are high
        assert_eq!(found[0].hispan, Span::from_bounds(3, 4));
    }

    #[test]
    fn test_line_range_spans_the_run() {
        let index = two_rule_index();
        let found = match_whole_text(&index, "released under\nthe mit license");
        assert_eq!(found[0].start_line, 1);
        assert_eq!(found[0].end_line, 2);
    }

    #[test]
    fn test_expired_deadline_returns_nothing() {
        let index = two_rule_index();
        let query = Query::new("released under the mit license", &index);
        let run = query.run(0, query.len());
        let deadline = Deadline::after(std::time::Duration::ZERO);
        assert!(hash_match(&index, &run, &deadline).unwrap().is_empty());
    }
}
