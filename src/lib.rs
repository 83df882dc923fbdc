//! Multi-strategy license detection over a corpus of license rules.
//!
//! Text is tokenized and matched against indexed rule texts by a pipeline
//! of matchers: whole-run hashing for exact rule texts, an Aho-Corasick
//! automaton for small rules, token sequence alignment for approximate
//! and partial matches, and a legalese-density fallback for license-like
//! regions no rule accounts for. [`LicenseEngine`] ties the stages
//! together; matches come back as [`LicenseMatch`] records carrying
//! spans, line ranges, coverage and score.

mod aho_match;
mod candidates;
mod deadline;
mod engine;
pub mod expression;
mod hash_match;
pub mod index;
mod match_refine;
mod models;
mod query;
pub mod rules;
mod seq_match;
pub mod spans;
#[cfg(test)]
mod test_utils;
mod tokenize;
mod unknown_match;

pub use engine::{DetectionResult, EngineOptions, LicenseEngine};
pub use expression::{LicenseExpression, ParseError};
pub use index::builder::build_index;
pub use index::LicenseIndex;
pub use models::{InvalidRuleError, LicenseMatch, MatcherKind, Rule};
pub use rules::loader::{load_rules, NO_EXPRESSION};
pub use spans::Span;
pub use unknown_match::UNKNOWN_RULE_IDENTIFIER;
