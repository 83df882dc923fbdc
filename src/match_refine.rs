//! Merging, filtering and scoring of raw matches.
//!
//! Matchers emit overlapping, fragmented and duplicate claims: a hash and
//! an automaton match can cover the same region, and sequence alignment
//! reports each aligned fragment of a rule separately. This module turns
//! that raw pile into the final result: false-positive rules veto their
//! matches, fragments of one rule merge, merged matches are rescored,
//! contained weaker matches drop out, coverage and score floors apply, and
//! the survivors come out in a deterministic order with their query
//! positions consumed.

use std::cmp::Ordering;

use crate::engine::EngineOptions;
use crate::index::LicenseIndex;
use crate::models::LicenseMatch;
use crate::query::Query;

/// Widest run of unmatched query positions allowed between two fragments
/// of the same rule before they stop merging into one match.
const MAX_MERGE_GAP: usize = 10;

/// Refine raw matches into the final per-query result.
///
/// Survivors are ordered by start position, then rule ID, and their query
/// positions are consumed.
pub(crate) fn refine_matches(
    index: &LicenseIndex,
    raw: Vec<LicenseMatch>,
    query: &mut Query<'_>,
    options: &EngineOptions,
) -> Vec<LicenseMatch> {
    if raw.is_empty() {
        return raw;
    }
    let total = raw.len();

    let survivors = discard_false_positives(index, raw);
    let mut merged = merge_same_rule_matches(survivors);
    rescore(index, query, &mut merged);
    let resolved = filter_contained_matches(merged);
    let mut kept = apply_floors(index, resolved, options);

    kept.sort_by(|a, b| {
        a.qspan
            .start()
            .cmp(&b.qspan.start())
            .then(a.rule_id.cmp(&b.rule_id))
    });
    for m in &kept {
        query.subtract(&m.qspan);
    }

    log::debug!("refined {total} raw matches to {}", kept.len());
    kept
}

/// A false-positive rule matching means the text is known to look like a
/// license without being one; such matches are never reported.
fn discard_false_positives(index: &LicenseIndex, mut matches: Vec<LicenseMatch>) -> Vec<LicenseMatch> {
    matches.retain(|m| {
        !m.rule_id
            .is_some_and(|rid| index.rule(rid).is_false_positive)
    });
    matches
}

/// Merge fragments of the same rule into single matches.
///
/// Fragments merge while the rule-side span keeps moving forward and the
/// query-side gap stays within [`MAX_MERGE_GAP`]. A fragment whose rule
/// span restarts is a second occurrence of the rule and stays separate.
/// Unknown matches have no rule to continue through and never merge.
fn merge_same_rule_matches(mut matches: Vec<LicenseMatch>) -> Vec<LicenseMatch> {
    matches.sort_by(|a, b| {
        a.rule_id
            .cmp(&b.rule_id)
            .then(a.qspan.start().cmp(&b.qspan.start()))
            .then(a.ispan.start().cmp(&b.ispan.start()))
    });

    let mut merged: Vec<LicenseMatch> = Vec::with_capacity(matches.len());
    for m in matches {
        let Some(current) = merged.last_mut() else {
            merged.push(m);
            continue;
        };
        if current.rule_id != m.rule_id || m.rule_id.is_none() || !try_merge(current, &m) {
            merged.push(m);
        }
    }
    merged
}

/// Fold `next` into `current` when they claim one region of one rule.
/// Returns false when `next` must stand on its own.
fn try_merge(current: &mut LicenseMatch, next: &LicenseMatch) -> bool {
    // a duplicate claim of an already-covered region collapses into the
    // higher-priority matcher
    if current.qspan.contains(&next.qspan) && current.ispan.contains(&next.ispan) {
        current.matcher = current.matcher.min(next.matcher);
        return true;
    }

    let within_gap = current.qspan.distance_to(&next.qspan) <= MAX_MERGE_GAP;
    let rule_side_continues = next.ispan.start() > current.ispan.start()
        && next.ispan.end() > current.ispan.end();
    if within_gap && rule_side_continues {
        current.qspan = current.qspan.union(&next.qspan);
        current.ispan = current.ispan.union(&next.ispan);
        current.hispan = current.hispan.union(&next.hispan);
        current.matcher = current.matcher.min(next.matcher);
        return true;
    }
    false
}

/// Recompute length, coverage, score and line range after merging.
/// Unknown matches carry no rule and keep their synthetic values.
fn rescore(index: &LicenseIndex, query: &Query<'_>, matches: &mut [LicenseMatch]) {
    for m in matches {
        let Some(rid) = m.rule_id else {
            continue;
        };
        let rule_length = index.rule_tokens(rid).len();
        m.matched_length = m.ispan.len();
        // multiply before dividing so exact ratios stay exact in f32
        m.match_coverage = m.matched_length as f32 * 100.0 / rule_length as f32;
        m.rule_relevance = index.rule(rid).relevance;
        m.score = f32::from(m.rule_relevance) * m.match_coverage / 100.0;
        let (start_line, end_line) = query.lines_for_span(&m.qspan);
        m.start_line = start_line;
        m.end_line = end_line;
    }
}

/// Resolve cross-rule containment: of two matches where one query span
/// contains the other, only the preferred one survives. Overlap without
/// containment keeps both, as distinct license texts legitimately share
/// words.
fn filter_contained_matches(matches: Vec<LicenseMatch>) -> Vec<LicenseMatch> {
    if matches.len() < 2 {
        return matches;
    }

    let mut discarded = vec![false; matches.len()];
    for i in 0..matches.len() {
        if discarded[i] {
            continue;
        }
        for j in (i + 1)..matches.len() {
            if discarded[j] {
                continue;
            }
            let (a, b) = (&matches[i], &matches[j]);
            if !a.qspan.contains(&b.qspan) && !b.qspan.contains(&a.qspan) {
                continue;
            }
            if prefer_first(a, b) {
                discarded[j] = true;
            } else {
                discarded[i] = true;
                break;
            }
        }
    }

    matches
        .into_iter()
        .zip(discarded)
        .filter(|(_, gone)| !gone)
        .map(|(m, _)| m)
        .collect()
}

/// Higher score wins; ties fall to higher coverage, then lower rule ID.
fn prefer_first(a: &LicenseMatch, b: &LicenseMatch) -> bool {
    match a.score.total_cmp(&b.score) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => match a.match_coverage.total_cmp(&b.match_coverage) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => a.rule_id <= b.rule_id,
        },
    }
}

/// Apply the rule's own coverage floor and the global score floor.
/// Unknown matches have no rule floor; the score floor still applies.
fn apply_floors(
    index: &LicenseIndex,
    mut matches: Vec<LicenseMatch>,
    options: &EngineOptions,
) -> Vec<LicenseMatch> {
    matches.retain(|m| {
        if let Some(rid) = m.rule_id {
            let floor = f32::from(index.rule(rid).minimum_coverage);
            if m.match_coverage < floor {
                log::debug!(
                    "dropping {}: coverage {:.1} below rule minimum {floor:.0}",
                    m.rule_identifier,
                    m.match_coverage
                );
                return false;
            }
        }
        m.score >= options.min_score
    });
    matches
}
