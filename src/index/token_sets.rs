//! Token-ID sets and multisets for the prefilter.
//!
//! The set side is a bit vector over token IDs, so intersection and
//! cardinality are word-wise operations; the multiset side is a count map
//! for occurrence-aware refinement.

use bit_set::BitSet;
use std::collections::HashMap;

/// Token occurrence counts keyed by token ID.
pub type TokenMultiset = HashMap<u16, usize>;

/// Build the unique-ID bitset and the occurrence multiset for a token
/// sequence.
pub fn build_set_and_mset(tids: impl IntoIterator<Item = u16>) -> (BitSet, TokenMultiset) {
    let mut set = BitSet::new();
    let mut mset = TokenMultiset::new();
    for tid in tids {
        set.insert(usize::from(tid));
        *mset.entry(tid).or_insert(0) += 1;
    }
    (set, mset)
}

/// The subset of a bitset holding high (legalese) token IDs.
pub fn high_subset(set: &BitSet, len_legalese: u16) -> BitSet {
    set.iter()
        .take_while(|&tid| tid < usize::from(len_legalese))
        .collect()
}

/// The subset of a bitset holding low token IDs.
pub fn low_subset(set: &BitSet, len_legalese: u16) -> BitSet {
    set.iter()
        .skip_while(|&tid| tid < usize::from(len_legalese))
        .collect()
}

/// The subset of a multiset holding high (legalese) token IDs.
pub fn high_multiset(mset: &TokenMultiset, len_legalese: u16) -> TokenMultiset {
    mset.iter()
        .filter(|&(&tid, _)| tid < len_legalese)
        .map(|(&tid, &count)| (tid, count))
        .collect()
}

/// The subset of a multiset holding low token IDs.
pub fn low_multiset(mset: &TokenMultiset, len_legalese: u16) -> TokenMultiset {
    mset.iter()
        .filter(|&(&tid, _)| tid >= len_legalese)
        .map(|(&tid, &count)| (tid, count))
        .collect()
}

/// Total occurrences in a multiset.
pub fn multiset_len(mset: &TokenMultiset) -> usize {
    mset.values().sum()
}

/// Count of IDs present in both bitsets.
pub fn set_intersection_len(a: &BitSet, b: &BitSet) -> usize {
    a.intersection(b).count()
}

/// Total shared occurrences: per ID, the smaller of the two counts.
pub fn multiset_intersection_len(a: &TokenMultiset, b: &TokenMultiset) -> usize {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .filter_map(|(tid, &count)| large.get(tid).map(|&other| count.min(other)))
        .sum()
}
