//! Approximate matching by local sequence alignment.
//!
//! For every candidate rule the query run is aligned against the rule
//! token array with a longest-matching-block search in the family of
//! difflib: the longest block is found first, then the ranges left and
//! right of it are searched in turn from an explicit worklist. Block
//! search is seeded only on high tokens, through the rule's postings;
//! once a block is found it is extended over any equal matchable tokens
//! on both sides, so low tokens join a block but never start one.
//!
//! One `match_blocks` call returns blocks monotonic in both sequences,
//! so a rule repeated in the run would be found once. The outer loop in
//! [`seq_match`] restarts the search past the last found block until the
//! run is exhausted, which turns up every repetition.

use std::collections::HashMap;

use anyhow::Result;
use bit_set::BitSet;

use crate::candidates::CandidateRule;
use crate::deadline::Deadline;
use crate::index::{LicenseIndex, Postings};
use crate::models::{LicenseMatch, MatcherKind};
use crate::query::QueryRun;
use crate::spans::Span;

/// One aligned region: `a[a_start..a_start + size]` equals
/// `b[b_start..b_start + size]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Block {
    pub(crate) a_start: usize,
    pub(crate) b_start: usize,
    pub(crate) size: usize,
}

/// Align a query run against every candidate rule.
pub(crate) fn seq_match(
    index: &LicenseIndex,
    run: &QueryRun<'_, '_>,
    candidates: &[CandidateRule],
    deadline: &Deadline,
) -> Result<Vec<LicenseMatch>> {
    let mut matches = Vec::new();
    if candidates.is_empty() {
        return Ok(matches);
    }

    let a = run.query.tokens();
    let len_legalese = index.vocabulary().len_legalese();
    let matchables: BitSet = (run.start..run.end)
        .filter(|&pos| run.query.is_matchable(pos))
        .collect();

    for candidate in candidates {
        if deadline.exceeded() {
            break;
        }
        let rid = candidate.rid;
        log::debug!(
            "aligning rule {}: resemblance {:.2}, containment {:.2}",
            index.rule(rid).identifier,
            candidate.resemblance,
            candidate.containment
        );
        let b = index.rule_tokens(rid);
        let b2j = &index.postings_by_rid[rid];

        let mut qstart = run.start;
        while qstart < run.end {
            if deadline.exceeded() {
                break;
            }
            // no high token ahead means no block can be seeded
            if !(qstart..run.end).any(|pos| run.query.is_high_matchable(pos)) {
                break;
            }
            let blocks = match_blocks(a, b, qstart, run.end, b2j, len_legalese, &matchables);
            if blocks.is_empty() {
                break;
            }

            let mut advanced = qstart;
            for block in &blocks {
                let qend = block.a_start + block.size;
                // a lone low token is noise, not evidence
                if block.size > 1 || index.vocabulary().is_high(a[block.a_start]) {
                    let qspan = Span::from_range(block.a_start..qend);
                    let ispan = Span::from_range(block.b_start..block.b_start + block.size);
                    matches.push(LicenseMatch::from_rule_spans(
                        index,
                        run.query,
                        rid,
                        MatcherKind::Seq,
                        qspan,
                        ispan,
                    ));
                }
                advanced = advanced.max(qend);
            }
            qstart = advanced;
        }
    }
    Ok(matches)
}

/// Matching blocks of `a[a_start..a_end]` in `b`, monotonic in both
/// sequences, adjacent blocks collapsed.
///
/// `b2j` holds the positions of each high token in `b`; `matchables` are
/// the `a` positions open for matching.
pub(crate) fn match_blocks(
    a: &[u16],
    b: &[u16],
    a_start: usize,
    a_end: usize,
    b2j: &Postings,
    len_legalese: u16,
    matchables: &BitSet,
) -> Vec<Block> {
    let mut queue = vec![(a_start, a_end, 0, b.len())];
    let mut found = Vec::new();

    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let block = find_longest_match(a, b, alo, ahi, blo, bhi, b2j, len_legalese, matchables);
        if block.size == 0 {
            continue;
        }
        if alo < block.a_start && blo < block.b_start {
            queue.push((alo, block.a_start, blo, block.b_start));
        }
        if block.a_start + block.size < ahi && block.b_start + block.size < bhi {
            queue.push((block.a_start + block.size, ahi, block.b_start + block.size, bhi));
        }
        found.push(block);
    }

    found.sort_by_key(|block| (block.a_start, block.b_start));

    let mut collapsed: Vec<Block> = Vec::with_capacity(found.len());
    for block in found {
        if let Some(last) = collapsed.last_mut() {
            if last.a_start + last.size == block.a_start && last.b_start + last.size == block.b_start
            {
                last.size += block.size;
                continue;
            }
        }
        collapsed.push(block);
    }
    collapsed
}

/// Longest matching block of `a[alo..ahi]` and `b[blo..bhi]`.
///
/// The search chains only consecutive high-token matches, so a block
/// never rests on common words alone; the winner is then extended over
/// any equal matchable tokens on both ends. Of all maximal blocks the
/// one starting earliest in `a`, then earliest in `b`, wins. Size zero
/// means nothing matched.
#[allow(clippy::too_many_arguments)]
fn find_longest_match(
    a: &[u16],
    b: &[u16],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
    b2j: &Postings,
    len_legalese: u16,
    matchables: &BitSet,
) -> Block {
    let mut best_a = alo;
    let mut best_b = blo;
    let mut best_size = 0usize;

    // j2len[j] is the length of the longest high-token chain ending at
    // a[i - 1], b[j]
    let mut j2len: HashMap<usize, usize> = HashMap::new();
    let mut next_j2len: HashMap<usize, usize> = HashMap::new();

    for i in alo..ahi {
        next_j2len.clear();
        let cura = a[i];
        if cura < len_legalese && matchables.contains(i) {
            if let Some(positions) = b2j.get(&cura) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let chain = if j == blo {
                        1
                    } else {
                        j2len.get(&(j - 1)).copied().unwrap_or(0) + 1
                    };
                    next_j2len.insert(j, chain);
                    if chain > best_size {
                        best_a = i + 1 - chain;
                        best_b = j + 1 - chain;
                        best_size = chain;
                    }
                }
            }
        }
        std::mem::swap(&mut j2len, &mut next_j2len);
    }

    extend_match(
        Block {
            a_start: best_a,
            b_start: best_b,
            size: best_size,
        },
        a,
        b,
        alo,
        ahi,
        blo,
        bhi,
        matchables,
    )
}

/// Grow a block over equal matchable tokens on both ends, low tokens
/// included.
#[allow(clippy::too_many_arguments)]
fn extend_match(
    mut block: Block,
    a: &[u16],
    b: &[u16],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
    matchables: &BitSet,
) -> Block {
    if block.size == 0 {
        return block;
    }
    while block.a_start > alo
        && block.b_start > blo
        && a[block.a_start - 1] == b[block.b_start - 1]
        && matchables.contains(block.a_start - 1)
    {
        block.a_start -= 1;
        block.b_start -= 1;
        block.size += 1;
    }
    while block.a_start + block.size < ahi
        && block.b_start + block.size < bhi
        && a[block.a_start + block.size] == b[block.b_start + block.size]
        && matchables.contains(block.a_start + block.size)
    {
        block.size += 1;
    }
    block
}
