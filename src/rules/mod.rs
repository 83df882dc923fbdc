//! The rule corpus: loading, legalese, and per-rule match thresholds.

pub mod legalese;
pub mod loader;
pub mod thresholds;
