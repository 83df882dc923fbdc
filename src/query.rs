//! Query tokenization, matchable positions and query runs.
//!
//! A query is one input text tokenized against the index vocabulary.
//! Tokens the index has never seen map to the sentinel [`UNKNOWN_TID`] and
//! keep their positions, so adjacency in the query mirrors adjacency in
//! the text. Two bitsets track which positions are still open for
//! matching: one for high (legalese) tokens and one for known low tokens;
//! matchers consume positions as matches are accepted.
//!
//! Matchers never see the whole query at once. It is split into query
//! runs: maximal groups of lines holding high tokens, broken where
//! [`LINE_GAP_THRESHOLD`] consecutive lines carry none. License text is
//! dense in legalese, so a long stretch without any is a reliable region
//! boundary.

use bit_set::BitSet;

use crate::index::vocabulary::UNKNOWN_TID;
use crate::index::LicenseIndex;
use crate::spans::Span;
use crate::tokenize::tokenize;

/// Lines without a high token must pile up this deep to break a run.
pub const LINE_GAP_THRESHOLD: usize = 4;

pub struct Query<'a> {
    pub(crate) index: &'a LicenseIndex,
    text: &'a str,
    /// Token IDs by position; `UNKNOWN_TID` at unseen tokens.
    tokens: Vec<u16>,
    /// 1-based line number by position.
    line_by_pos: Vec<usize>,
    /// Byte range of each token in `text`.
    byte_ranges: Vec<(usize, usize)>,
    /// Positions holding an unconsumed high token.
    high_matchables: BitSet,
    /// Positions holding an unconsumed known low token.
    low_matchables: BitSet,
    /// Half-open position ranges of the query runs.
    run_ranges: Vec<(usize, usize)>,
}

impl<'a> Query<'a> {
    pub fn new(text: &'a str, index: &'a LicenseIndex) -> Self {
        let vocabulary = index.vocabulary();
        let raw_tokens = tokenize(text);

        let line_starts = line_start_offsets(text);
        let total_lines = line_starts.len();

        let mut tokens = Vec::with_capacity(raw_tokens.len());
        let mut line_by_pos = Vec::with_capacity(raw_tokens.len());
        let mut byte_ranges = Vec::with_capacity(raw_tokens.len());
        let mut high_matchables = BitSet::with_capacity(raw_tokens.len());
        let mut low_matchables = BitSet::with_capacity(raw_tokens.len());

        for token in &raw_tokens {
            let pos = tokens.len();
            let tid = vocabulary.get(&token.text).unwrap_or(UNKNOWN_TID);
            if vocabulary.is_high(tid) {
                high_matchables.insert(pos);
            } else if tid != UNKNOWN_TID {
                low_matchables.insert(pos);
            }
            tokens.push(tid);
            line_by_pos.push(line_of_offset(&line_starts, token.start));
            byte_ranges.push((token.start, token.end));
        }

        let run_ranges = partition_runs(&tokens, &line_by_pos, &high_matchables, total_lines);

        log::debug!(
            "query: {} tokens, {} high, {} runs",
            tokens.len(),
            high_matchables.len(),
            run_ranges.len()
        );

        Self {
            index,
            text,
            tokens,
            line_by_pos,
            byte_ranges,
            high_matchables,
            low_matchables,
            run_ranges,
        }
    }

    pub(crate) fn tokens(&self) -> &[u16] {
        &self.tokens
    }

    pub(crate) fn len(&self) -> usize {
        self.tokens.len()
    }

    pub(crate) fn run_ranges(&self) -> &[(usize, usize)] {
        &self.run_ranges
    }

    pub(crate) fn run(&self, start: usize, end: usize) -> QueryRun<'_, 'a> {
        QueryRun {
            query: self,
            start,
            end,
        }
    }

    /// True when the position still holds an unconsumed known token.
    pub(crate) fn is_matchable(&self, pos: usize) -> bool {
        self.high_matchables.contains(pos) || self.low_matchables.contains(pos)
    }

    pub(crate) fn is_high_matchable(&self, pos: usize) -> bool {
        self.high_matchables.contains(pos)
    }

    /// Mark the span's positions consumed, closing them to later matchers.
    pub(crate) fn subtract(&mut self, qspan: &Span) {
        for pos in qspan.positions() {
            self.high_matchables.remove(pos);
            self.low_matchables.remove(pos);
        }
    }

    /// 1-based line range covered by a query span.
    pub(crate) fn lines_for_span(&self, qspan: &Span) -> (usize, usize) {
        match (qspan.start(), qspan.end()) {
            (Some(s), Some(e)) => (self.line_by_pos[s], self.line_by_pos[e]),
            _ => (0, 0),
        }
    }

    /// Original text slice from the first to the last position of a span.
    pub(crate) fn text_for_span(&self, qspan: &Span) -> Option<&'a str> {
        let (start, end) = (qspan.start()?, qspan.end()?);
        let from = self.byte_ranges[start].0;
        let to = self.byte_ranges[end].1;
        Some(&self.text[from..to])
    }
}

/// A contiguous sub-range of a query processed as one unit by matchers.
/// Runs hold fixed position bounds; matchability within them shrinks as
/// positions are consumed.
pub(crate) struct QueryRun<'q, 'a> {
    pub(crate) query: &'q Query<'a>,
    pub(crate) start: usize,
    /// Exclusive.
    pub(crate) end: usize,
}

impl QueryRun<'_, '_> {
    pub(crate) fn tokens(&self) -> &[u16] {
        &self.query.tokens[self.start..self.end]
    }

    pub(crate) fn len(&self) -> usize {
        self.end - self.start
    }

    /// Unconsumed known token IDs in the run, in position order.
    pub(crate) fn matchable_tokens(&self) -> impl Iterator<Item = u16> + '_ {
        (self.start..self.end)
            .filter(|&pos| self.query.is_matchable(pos))
            .map(|pos| self.query.tokens[pos])
    }

    /// Count of unconsumed high positions in the run.
    pub(crate) fn high_matchable_count(&self) -> usize {
        (self.start..self.end)
            .filter(|&pos| self.query.is_high_matchable(pos))
            .count()
    }

    pub(crate) fn has_matchables(&self) -> bool {
        (self.start..self.end).any(|pos| self.query.is_matchable(pos))
    }
}

/// Byte offset of each line start, one entry per line.
fn line_start_offsets(text: &str) -> Vec<usize> {
    if text.is_empty() {
        return Vec::new();
    }
    let mut starts = vec![0];
    for (i, b) in text.bytes().enumerate() {
        if b == b'\n' && i + 1 < text.len() {
            starts.push(i + 1);
        }
    }
    starts
}

/// 1-based line number of a byte offset.
fn line_of_offset(line_starts: &[usize], offset: usize) -> usize {
    line_starts.partition_point(|&start| start <= offset)
}

/// Group lines holding high tokens into runs, breaking where
/// `LINE_GAP_THRESHOLD` consecutive lines hold none. A run spans from the
/// first position of its first such line to the last position of its last
/// one, including everything between.
fn partition_runs(
    tokens: &[u16],
    line_by_pos: &[usize],
    high_matchables: &BitSet,
    total_lines: usize,
) -> Vec<(usize, usize)> {
    if tokens.is_empty() {
        return Vec::new();
    }

    let mut line_has_high = vec![false; total_lines + 1];
    let mut first_pos_on_line = vec![usize::MAX; total_lines + 1];
    let mut last_pos_on_line = vec![0usize; total_lines + 1];
    for (pos, &line) in line_by_pos.iter().enumerate() {
        if high_matchables.contains(pos) {
            line_has_high[line] = true;
        }
        first_pos_on_line[line] = first_pos_on_line[line].min(pos);
        last_pos_on_line[line] = last_pos_on_line[line].max(pos);
    }

    let mut runs = Vec::new();
    let mut current: Option<(usize, usize)> = None;
    let mut gap = 0;
    for line in 1..=total_lines {
        if line_has_high[line] {
            gap = 0;
            let first = first_pos_on_line[line];
            let last = last_pos_on_line[line];
            current = match current {
                None => Some((first, last)),
                Some((start, _)) => Some((start, last)),
            };
        } else {
            gap += 1;
            if gap >= LINE_GAP_THRESHOLD {
                if let Some((start, last)) = current.take() {
                    runs.push((start, last + 1));
                }
            }
        }
    }
    if let Some((start, last)) = current {
        runs.push((start, last + 1));
    }
    runs
}
