//! Small-rule exact matching with the Aho-Corasick automaton.
//!
//! Rules too short for sequence alignment are found here instead: one
//! automaton pass over the run's encoded token stream yields every
//! occurrence of every small rule, overlaps included. Hits are byte
//! ranges, so each one is checked for token alignment and for landing
//! entirely on still-matchable positions before it becomes a match.

use anyhow::Result;

use crate::deadline::Deadline;
use crate::index::{encode_tokens, LicenseIndex};
use crate::models::{LicenseMatch, MatcherKind};
use crate::query::QueryRun;
use crate::spans::Span;

/// Find every small-rule occurrence in a query run.
pub(crate) fn aho_match(
    index: &LicenseIndex,
    run: &QueryRun<'_, '_>,
    deadline: &Deadline,
) -> Result<Vec<LicenseMatch>> {
    let mut matches = Vec::new();
    if deadline.exceeded() {
        return Ok(matches);
    }

    let encoded = encode_tokens(run.tokens());
    for hit in index.automaton.find_overlapping_iter(&encoded) {
        if deadline.exceeded() {
            break;
        }
        let Some((tstart, tend)) = token_bounds(hit.start(), hit.end()) else {
            continue;
        };
        let qstart = run.start + tstart;
        let qend = run.start + tend;
        if !(qstart..qend).all(|pos| run.query.is_matchable(pos)) {
            continue;
        }

        let rid = index.automaton_rids[hit.pattern().as_usize()];
        let qspan = Span::from_range(qstart..qend);
        let ispan = Span::from_range(0..index.rule_tokens(rid).len());
        matches.push(LicenseMatch::from_rule_spans(
            index,
            run.query,
            rid,
            MatcherKind::Aho,
            qspan,
            ispan,
        ));
    }
    Ok(matches)
}

/// Convert a byte hit to token positions. Tokens are two bytes wide, so a
/// genuine hit starts and ends on even offsets; a pattern that happens to
/// match across a token boundary is rejected here.
fn token_bounds(byte_start: usize, byte_end: usize) -> Option<(usize, usize)> {
    if byte_start % 2 != 0 || byte_end % 2 != 0 {
        return None;
    }
    Some((byte_start / 2, byte_end / 2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Query;
    use crate::test_utils::{build_test_index, make_rule};

    fn match_all_runs(index: &LicenseIndex, text: &str) -> Vec<LicenseMatch> {
        let query = Query::new(text, index);
        let mut found = Vec::new();
        for &(start, end) in query.run_ranges() {
            let run = query.run(start, end);
            found.extend(aho_match(index, &run, &Deadline::none()).unwrap());
        }
        found
    }

    #[test]
    fn test_small_rule_found_inside_larger_text() {
        let index = build_test_index(vec![make_rule("mit_name", "mit", "mit license")]);
        let found = match_all_runs(&index, "this code ships under the mit license for everyone");
        assert_eq!(found.len(), 1);

        let m = &found[0];
        assert_eq!(m.rule_id, Some(0));
        assert_eq!(m.matcher, MatcherKind::Aho);
        assert_eq!(m.match_coverage, 100.0);
        assert_eq!(m.score, 100.0);
        assert_eq!(m.qspan, Span::from_bounds(5, 6));
        assert_eq!(m.ispan, Span::from_bounds(0, 1));
    }

    #[test]
    fn test_every_occurrence_is_found() {
        let index = build_test_index(vec![make_rule("mit_name", "mit", "mit license")]);
        let found = match_all_runs(&index, "mit license here and mit license there");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].qspan, Span::from_bounds(0, 1));
        assert_eq!(found[1].qspan, Span::from_bounds(4, 5));
    }

    #[test]
    fn test_overlapping_rules_are_all_reported() {
        let index = build_test_index(vec![
            make_rule("mit_name", "mit", "mit license"),
            make_rule("mit_name_the", "mit", "the mit license"),
        ]);
        let found = match_all_runs(&index, "released under the mit license");
        assert_eq!(found.len(), 2);

        let mut rids: Vec<_> = found.iter().map(|m| m.rule_id).collect();
        rids.sort();
        assert_eq!(rids, vec![Some(0), Some(1)]);
    }

    #[test]
    fn test_consumed_positions_reject_hits() {
        let index = build_test_index(vec![make_rule("mit_name", "mit", "mit license")]);
        let mut query = Query::new("the mit license", &index);
        query.subtract(&Span::from_bounds(1, 1));
        let run = query.run(0, query.len());
        assert!(aho_match(&index, &run, &Deadline::none())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_rules_at_the_small_threshold_are_not_in_the_automaton() {
        // 15 tokens once the stopword "a" is dropped, right at the bound
        let text = "permission is hereby granted free of charge \
                    to any person obtaining a copy of this software";
        let index = build_test_index(vec![make_rule("mit_grant", "mit", text)]);
        assert!(match_all_runs(&index, text).is_empty());
    }

    #[test]
    fn test_token_bounds_require_even_offsets() {
        assert_eq!(token_bounds(0, 4), Some((0, 2)));
        assert_eq!(token_bounds(4, 10), Some((2, 5)));
        assert_eq!(token_bounds(1, 5), None);
        assert_eq!(token_bounds(2, 5), None);
    }

    #[test]
    fn test_expired_deadline_returns_nothing() {
        let index = build_test_index(vec![make_rule("mit_name", "mit", "mit license")]);
        let query = Query::new("the mit license", &index);
        let run = query.run(0, query.len());
        let deadline = Deadline::after(std::time::Duration::ZERO);
        assert!(aho_match(&index, &run, &deadline).unwrap().is_empty());
    }
}
