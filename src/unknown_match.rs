//! Fallback detection of license-like text no rule accounts for.
//!
//! After the real matchers have run, any stretch of query positions they
//! did not claim is examined for legalese density. A long, dense stretch
//! is almost certainly license text the corpus simply has no rule for, so
//! it is reported as a synthetic `unknown` match rather than silently
//! dropped. This separates "no license here" from "a license is here and
//! we could not name it".

use anyhow::Result;
use bit_set::BitSet;

use crate::deadline::Deadline;
use crate::index::LicenseIndex;
use crate::models::{LicenseMatch, MatcherKind};
use crate::query::Query;
use crate::rules::loader::NO_EXPRESSION;
use crate::spans::Span;

/// Identifier reported in place of a rule name for unknown matches.
pub const UNKNOWN_RULE_IDENTIFIER: &str = "unknown-license-detection";

/// Fewest tokens an unrecognized region must hold, after trimming to its
/// outermost high tokens.
const MIN_UNKNOWN_REGION_LENGTH: usize = 24;

/// Fewest positions holding high tokens the region must have.
const MIN_UNKNOWN_HIGH_POSITIONS: usize = 5;

/// Fraction of the region that must be high tokens.
const MIN_UNKNOWN_HIGH_RATIO: f32 = 0.4;

/// An unknown match is a strong hint, not a named detection.
const UNKNOWN_RELEVANCE: u8 = 50;

/// Find legalese-dense regions left unclaimed by `known` matches.
pub(crate) fn unknown_match(
    index: &LicenseIndex,
    query: &Query<'_>,
    known: &[LicenseMatch],
    deadline: &Deadline,
) -> Result<Vec<LicenseMatch>> {
    let mut covered = BitSet::with_capacity(query.len());
    for m in known {
        for pos in m.qspan.positions() {
            covered.insert(pos);
        }
    }

    let mut matches = Vec::new();
    for &(start, end) in query.run_ranges() {
        if deadline.exceeded() {
            break;
        }
        for (region_start, region_end) in uncovered_regions(start, end, &covered) {
            if let Some(m) = evaluate_region(index, query, region_start, region_end) {
                matches.push(m);
            }
        }
    }
    Ok(matches)
}

/// Maximal stretches of `start..end` free of covered positions,
/// half-open.
fn uncovered_regions(start: usize, end: usize, covered: &BitSet) -> Vec<(usize, usize)> {
    let mut regions = Vec::new();
    let mut region_start = None;
    for pos in start..end {
        if covered.contains(pos) {
            if let Some(from) = region_start.take() {
                regions.push((from, pos));
            }
        } else if region_start.is_none() {
            region_start = Some(pos);
        }
    }
    if let Some(from) = region_start {
        regions.push((from, end));
    }
    regions
}

/// Judge one uncovered region. The region is first trimmed to its
/// outermost high tokens so surrounding prose does not dilute the ratio.
fn evaluate_region(
    index: &LicenseIndex,
    query: &Query<'_>,
    start: usize,
    end: usize,
) -> Option<LicenseMatch> {
    let vocabulary = index.vocabulary();
    let tokens = query.tokens();
    let is_high = |pos: &usize| vocabulary.is_high(tokens[*pos]);

    let first_high = (start..end).find(is_high)?;
    let last_high = (start..end).rev().find(is_high)?;

    let length = last_high - first_high + 1;
    if length < MIN_UNKNOWN_REGION_LENGTH {
        return None;
    }
    let high_positions = (first_high..=last_high).filter(is_high).count();
    if high_positions < MIN_UNKNOWN_HIGH_POSITIONS {
        return None;
    }
    if (high_positions as f32) < (length as f32) * MIN_UNKNOWN_HIGH_RATIO {
        return None;
    }

    log::debug!(
        "unknown region at {first_high}..={last_high}: {high_positions} high of {length}"
    );

    let qspan = Span::from_bounds(first_high, last_high);
    let hispan: Span = (first_high..=last_high)
        .filter(is_high)
        .map(|pos| pos - first_high)
        .collect();
    let (start_line, end_line) = query.lines_for_span(&qspan);
    Some(LicenseMatch {
        rule_id: None,
        license_expression: NO_EXPRESSION.to_string(),
        rule_identifier: UNKNOWN_RULE_IDENTIFIER.to_string(),
        matcher: MatcherKind::Unknown,
        qspan,
        ispan: Span::from_range(0..length),
        hispan,
        start_line,
        end_line,
        matched_length: length,
        match_coverage: 100.0,
        rule_relevance: UNKNOWN_RELEVANCE,
        score: f32::from(UNKNOWN_RELEVANCE),
        matched_text: None,
    })
}
