//! Core data model: rules, matches, matcher kinds and corpus errors.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::expression::ParseError;
use crate::index::LicenseIndex;
use crate::query::Query;
use crate::spans::Span;

/// One detectable unit of the corpus: a full license text, a notice, a tag
/// or a short reference, with its license expression and match policy.
///
/// Rules are loaded from paired corpus files and immutable after index
/// build. Token data derived from `text` lives in the index, keyed by the
/// dense rule ID assigned at build time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Corpus file stem, unique, e.g. `apache-2.0_names`.
    pub identifier: String,
    /// Normalized license expression; `unknown` for false-positive rules
    /// that carry none.
    pub license_expression: String,
    /// The matchable rule text.
    pub text: String,
    /// Weight of this rule as license evidence, 0-100.
    pub relevance: u8,
    /// Minimum coverage a match of this rule must reach to be reported,
    /// 0-100.
    pub minimum_coverage: u8,
    pub is_license_text: bool,
    pub is_license_notice: bool,
    pub is_license_tag: bool,
    pub is_license_reference: bool,
    /// Must match as one unbroken region; excluded from sequence
    /// alignment.
    pub is_continuous: bool,
    /// Matches of this rule veto, and are never reported.
    pub is_false_positive: bool,
    pub notes: Option<String>,
}

/// The strategy that produced a match. Declaration order is priority
/// order, highest first; when two matchers claim the same region the
/// lower variant wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatcherKind {
    /// Whole-rule exact match via the token-sequence hash table.
    Hash,
    /// Small-rule exact match via the Aho-Corasick automaton.
    Aho,
    /// Approximate match via sequence alignment.
    Seq,
    /// Synthetic match over an unrecognized legalese-dense region.
    Unknown,
}

impl MatcherKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hash => "hash",
            Self::Aho => "aho",
            Self::Seq => "seq",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for MatcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detected license region in a query.
#[derive(Debug, Clone)]
pub struct LicenseMatch {
    /// Dense index rule ID; `None` for unknown-license matches, which have
    /// no backing rule.
    pub rule_id: Option<usize>,
    pub license_expression: String,
    pub rule_identifier: String,
    pub matcher: MatcherKind,
    /// Matched query token positions.
    pub qspan: Span,
    /// Matched rule token positions.
    pub ispan: Span,
    /// Matched rule positions holding high (legalese) tokens.
    pub hispan: Span,
    /// 1-based line range of the match in the query text.
    pub start_line: usize,
    pub end_line: usize,
    /// Count of matched token positions.
    pub matched_length: usize,
    /// Percentage of the rule's tokens present in the match, 0-100.
    pub match_coverage: f32,
    /// The rule's relevance, 0-100.
    pub rule_relevance: u8,
    /// `rule_relevance * match_coverage / 100`, 0-100.
    pub score: f32,
    /// Original query text the match covers, when requested.
    pub matched_text: Option<String>,
}

impl LicenseMatch {
    /// Build a match of an indexed rule from its query and rule spans.
    ///
    /// Derives the high-token span, line range, coverage and score; the
    /// matched text is filled in separately when requested.
    pub(crate) fn from_rule_spans(
        index: &LicenseIndex,
        query: &Query<'_>,
        rid: usize,
        matcher: MatcherKind,
        qspan: Span,
        ispan: Span,
    ) -> Self {
        let rule = index.rule(rid);
        let tids = index.rule_tokens(rid);
        let hispan: Span = ispan
            .positions()
            .filter(|&pos| index.vocabulary().is_high(tids[pos]))
            .collect();
        let matched_length = ispan.len();
        // multiply before dividing so exact ratios stay exact in f32
        let match_coverage = matched_length as f32 * 100.0 / tids.len() as f32;
        let score = f32::from(rule.relevance) * match_coverage / 100.0;
        let (start_line, end_line) = query.lines_for_span(&qspan);
        Self {
            rule_id: Some(rid),
            license_expression: rule.license_expression.clone(),
            rule_identifier: rule.identifier.clone(),
            matcher,
            qspan,
            ispan,
            hispan,
            start_line,
            end_line,
            matched_length,
            match_coverage,
            rule_relevance: rule.relevance,
            score,
            matched_text: None,
        }
    }

    /// First matched query token position.
    pub fn start_position(&self) -> usize {
        self.qspan.start().unwrap_or(0)
    }

    /// Last matched query token position.
    pub fn end_position(&self) -> usize {
        self.qspan.end().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.matched_length
    }

    pub fn is_empty(&self) -> bool {
        self.matched_length == 0
    }
}

/// A corpus or rule defect found while loading rules or building the
/// index. Always fatal to that build.
#[derive(Debug)]
pub enum InvalidRuleError {
    /// A corpus file could not be read.
    UnreadableFile {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A `.RULE` text file has no `.yml` metadata sidecar.
    MissingSidecar { path: PathBuf },
    /// A `.yml` sidecar has no `.RULE` text file.
    OrphanSidecar { path: PathBuf },
    /// A sidecar is not valid YAML or has ill-typed fields.
    InvalidMetadata { path: PathBuf, message: String },
    /// The rule's license expression does not parse.
    InvalidExpression {
        identifier: String,
        source: ParseError,
    },
    /// A rule that is not a false positive has no license expression.
    MissingExpression { identifier: String },
    /// `relevance` or `minimum_coverage` outside 0-100.
    OutOfRange {
        identifier: String,
        field: &'static str,
        value: i64,
    },
    /// The rule text has no matchable tokens.
    EmptyRule { identifier: String },
    /// Two rules share one token sequence but map to different license
    /// expressions.
    DuplicateRule {
        identifier: String,
        duplicate_of: String,
    },
    /// The corpus holds more distinct tokens than the u16 ID space.
    VocabularyOverflow { identifier: String },
}

impl fmt::Display for InvalidRuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnreadableFile { path, source } => {
                write!(f, "cannot read rule file {}: {source}", path.display())
            }
            Self::MissingSidecar { path } => {
                write!(f, "rule text {} has no .yml sidecar", path.display())
            }
            Self::OrphanSidecar { path } => {
                write!(f, "sidecar {} has no .RULE text file", path.display())
            }
            Self::InvalidMetadata { path, message } => {
                write!(f, "invalid metadata in {}: {message}", path.display())
            }
            Self::InvalidExpression { identifier, source } => {
                write!(f, "rule {identifier}: invalid license expression: {source}")
            }
            Self::MissingExpression { identifier } => {
                write!(f, "rule {identifier}: missing license expression")
            }
            Self::OutOfRange {
                identifier,
                field,
                value,
            } => {
                write!(f, "rule {identifier}: {field} = {value} is outside 0-100")
            }
            Self::EmptyRule { identifier } => {
                write!(f, "rule {identifier}: text has no matchable tokens")
            }
            Self::DuplicateRule {
                identifier,
                duplicate_of,
            } => {
                write!(
                    f,
                    "rule {identifier}: same token sequence as {duplicate_of} \
                     but a different license expression"
                )
            }
            Self::VocabularyOverflow { identifier } => {
                write!(
                    f,
                    "rule {identifier}: corpus exceeds the u16 token ID space"
                )
            }
        }
    }
}

impl std::error::Error for InvalidRuleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::UnreadableFile { source, .. } => Some(source),
            Self::InvalidExpression { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matcher_kind_priority_order() {
        assert!(MatcherKind::Hash < MatcherKind::Aho);
        assert!(MatcherKind::Aho < MatcherKind::Seq);
        assert!(MatcherKind::Seq < MatcherKind::Unknown);
    }

    #[test]
    fn test_matcher_kind_names() {
        assert_eq!(MatcherKind::Hash.as_str(), "hash");
        assert_eq!(MatcherKind::Aho.as_str(), "aho");
        assert_eq!(MatcherKind::Seq.as_str(), "seq");
        assert_eq!(MatcherKind::Unknown.as_str(), "unknown");
        assert_eq!(MatcherKind::Hash.to_string(), "hash");
    }

    #[test]
    fn test_match_positions() {
        let m = LicenseMatch {
            rule_id: Some(0),
            license_expression: "mit".to_string(),
            rule_identifier: "mit_1".to_string(),
            matcher: MatcherKind::Hash,
            qspan: Span::from_bounds(3, 7),
            ispan: Span::from_bounds(0, 4),
            hispan: Span::from_positions(vec![0, 2]),
            start_line: 1,
            end_line: 2,
            matched_length: 5,
            match_coverage: 100.0,
            rule_relevance: 100,
            score: 100.0,
            matched_text: None,
        };
        assert_eq!(m.start_position(), 3);
        assert_eq!(m.end_position(), 7);
        assert_eq!(m.len(), 5);
        assert!(!m.is_empty());
    }

    #[test]
    fn test_invalid_rule_error_display() {
        let err = InvalidRuleError::MissingExpression {
            identifier: "foo_1".to_string(),
        };
        assert_eq!(err.to_string(), "rule foo_1: missing license expression");

        let err = InvalidRuleError::OutOfRange {
            identifier: "foo_2".to_string(),
            field: "relevance",
            value: 150,
        };
        assert!(err.to_string().contains("relevance = 150"));
    }

    #[test]
    fn test_invalid_expression_carries_source() {
        use std::error::Error;
        let err = InvalidRuleError::InvalidExpression {
            identifier: "bad".to_string(),
            source: ParseError::Empty,
        };
        assert!(err.source().is_some());
    }
}
