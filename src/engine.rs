//! The detection engine: corpus loading, index ownership and the matcher
//! pipeline.
//!
//! [`LicenseEngine`] builds a [`LicenseIndex`] from a rule corpus once and
//! answers any number of detection calls against it. Each call walks the
//! query runs and applies the matchers in priority order: whole-run hash,
//! then the small-rule automaton, then sequence alignment over the
//! prefiltered candidates. Positions claimed by an exact match are
//! subtracted before the next stage so nothing is matched twice. Unknown
//! detection and refinement run once at the end, over the accumulated
//! matches of all runs.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::aho_match::aho_match;
use crate::candidates::compute_candidates;
use crate::deadline::Deadline;
use crate::hash_match::hash_match;
use crate::index::builder::build_index;
use crate::index::cache::{corpus_checksum, read_artifact, write_artifact};
use crate::index::LicenseIndex;
use crate::match_refine::refine_matches;
use crate::models::{LicenseMatch, MatcherKind, Rule};
use crate::query::Query;
use crate::rules::loader::load_rules;
use crate::seq_match::seq_match;
use crate::unknown_match::unknown_match;

/// Detection knobs. The default is unbounded time, no score floor,
/// unknown detection on and no matched-text capture.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Time budget per detection call; `None` is unbounded.
    pub timeout: Option<Duration>,
    /// Matches scoring below this floor are dropped during refinement.
    pub min_score: f32,
    /// Report legalese-dense regions that no rule accounts for.
    pub detect_unknown: bool,
    /// Copy the original text slice of each match into the result.
    pub include_text: bool,
    /// Where to read and write the serialized corpus artifact.
    pub cache_path: Option<PathBuf>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            min_score: 0.0,
            detect_unknown: true,
            include_text: false,
            cache_path: None,
        }
    }
}

/// The outcome of one detection call.
///
/// Matching-time failures never abort a call; they land in `errors` and
/// the matches found despite them are still returned.
#[derive(Debug, Clone, Default)]
pub struct DetectionResult {
    /// Final matches, ordered by query position.
    pub matches: Vec<LicenseMatch>,
    /// The deadline ran out; `matches` holds what was found in time.
    pub timed_out: bool,
    /// Diagnostics for failures met along the way, one message each.
    pub errors: Vec<String>,
}

/// License detection engine over a rule corpus.
///
/// The index sits behind a lock only so [`reindex`](Self::reindex) can
/// swap in a rebuild; detection calls take an `Arc` snapshot up front and
/// never hold the lock while matching, so scans in flight during a
/// reindex simply finish against the index they started with.
#[derive(Debug)]
pub struct LicenseEngine {
    index: RwLock<Arc<LicenseIndex>>,
    corpus_dir: PathBuf,
    options: EngineOptions,
}

impl LicenseEngine {
    /// Build an engine from a directory of `.RULE`/`.yml` pairs with
    /// default options.
    pub fn new<P: Into<PathBuf>>(corpus_dir: P) -> Result<Self> {
        Self::with_options(corpus_dir, EngineOptions::default())
    }

    pub fn with_options<P: Into<PathBuf>>(corpus_dir: P, options: EngineOptions) -> Result<Self> {
        let corpus_dir = corpus_dir.into();
        let index = load_index(&corpus_dir, options.cache_path.as_deref())?;
        Ok(Self {
            index: RwLock::new(Arc::new(index)),
            corpus_dir,
            options,
        })
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Snapshot of the current index.
    pub fn index(&self) -> Arc<LicenseIndex> {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Rebuild the index from the corpus directory and swap it in. When a
    /// cache path is configured the artifact is refreshed as well.
    pub fn reindex(&self) -> Result<()> {
        let rebuilt = load_index(&self.corpus_dir, self.options.cache_path.as_deref())?;
        let mut current = self.index.write().unwrap_or_else(PoisonError::into_inner);
        *current = Arc::new(rebuilt);
        Ok(())
    }

    /// Detect licenses in a text.
    pub fn detect_text(&self, text: &str) -> DetectionResult {
        self.detect_with_deadline(text, Deadline::from_timeout(self.options.timeout))
    }

    /// Like [`detect_text`](Self::detect_text), additionally honoring an
    /// external cancellation flag. A cancelled call reports `timed_out`.
    pub fn detect_text_with_cancel(&self, text: &str, cancel: Arc<AtomicBool>) -> DetectionResult {
        let deadline = Deadline::from_timeout(self.options.timeout).with_cancel(cancel);
        self.detect_with_deadline(text, deadline)
    }

    /// Detect licenses in one file. An unreadable file is a diagnostic in
    /// the result, not a panic or an abort.
    pub fn detect_file(&self, path: &Path) -> DetectionResult {
        match fs::read_to_string(path) {
            Ok(text) => self.detect_text(&text),
            Err(e) => {
                log::warn!("cannot read {}: {e}", path.display());
                DetectionResult {
                    errors: vec![format!("cannot read {}: {e}", path.display())],
                    ..DetectionResult::default()
                }
            }
        }
    }

    /// Scan many files in parallel. Results come back in input order, one
    /// per path; a file that fails to read or times out carries its
    /// diagnostics without disturbing the other files.
    pub fn detect_files(&self, paths: &[PathBuf]) -> Vec<DetectionResult> {
        paths.par_iter().map(|path| self.detect_file(path)).collect()
    }

    fn detect_with_deadline(&self, text: &str, deadline: Deadline) -> DetectionResult {
        let index = self.index();
        let mut query = Query::new(text, &index);
        let mut raw: Vec<LicenseMatch> = Vec::new();
        let mut errors: Vec<String> = Vec::new();

        let runs = query.run_ranges().to_vec();
        for (start, end) in runs {
            if deadline.exceeded() {
                break;
            }
            if !query.run(start, end).has_matchables() {
                continue;
            }

            // An exact whole-run hit settles the run outright.
            let found = matcher_output(
                hash_match(&index, &query.run(start, end), &deadline),
                MatcherKind::Hash,
                &mut errors,
            );
            if !found.is_empty() {
                for m in &found {
                    query.subtract(&m.qspan);
                }
                raw.extend(found);
                continue;
            }

            // Small-rule occurrences are exact too, so they consume their
            // positions before alignment runs.
            let found = matcher_output(
                aho_match(&index, &query.run(start, end), &deadline),
                MatcherKind::Aho,
                &mut errors,
            );
            for m in &found {
                query.subtract(&m.qspan);
            }
            raw.extend(found);

            let found = {
                let run = query.run(start, end);
                let candidates = compute_candidates(&run, &index);
                matcher_output(
                    seq_match(&index, &run, &candidates, &deadline),
                    MatcherKind::Seq,
                    &mut errors,
                )
            };
            // Approximate matches stay matchable for later stages; only a
            // full-coverage alignment consumes its positions.
            for m in &found {
                if m.match_coverage >= 100.0 {
                    query.subtract(&m.qspan);
                }
            }
            raw.extend(found);
        }

        if self.options.detect_unknown {
            let found = matcher_output(
                unknown_match(&index, &query, &raw, &deadline),
                MatcherKind::Unknown,
                &mut errors,
            );
            raw.extend(found);
        }

        let mut matches = refine_matches(&index, raw, &mut query, &self.options);

        if self.options.include_text {
            for m in &mut matches {
                m.matched_text = query.text_for_span(&m.qspan).map(str::to_string);
            }
        }

        DetectionResult {
            matches,
            timed_out: deadline.exceeded(),
            errors,
        }
    }
}

/// Unpack a matcher result, converting failure into "no matches from this
/// matcher" with a logged, recorded diagnostic.
fn matcher_output(
    found: Result<Vec<LicenseMatch>>,
    matcher: MatcherKind,
    errors: &mut Vec<String>,
) -> Vec<LicenseMatch> {
    match found {
        Ok(found) => found,
        Err(e) => {
            let message = format!("{matcher} matcher failed: {e:#}");
            log::warn!("{message}");
            errors.push(message);
            Vec::new()
        }
    }
}

/// Load the corpus and build the index, going through the serialized
/// artifact when a cache path is configured and its recorded checksum
/// still matches the corpus directory.
fn load_index(corpus_dir: &Path, cache_path: Option<&Path>) -> Result<LicenseIndex> {
    let Some(artifact) = cache_path else {
        return build_index(load_corpus(corpus_dir)?);
    };

    let checksum = corpus_checksum(corpus_dir)?;
    if let Some(rules) = read_artifact(artifact, &checksum) {
        return build_index(rules);
    }
    let rules = load_corpus(corpus_dir)?;
    // A cache write failure costs the next startup some time, nothing
    // else, so it does not fail the build.
    if let Err(e) = write_artifact(artifact, &rules, &checksum) {
        log::warn!("cannot write index artifact {}: {e:#}", artifact.display());
    }
    build_index(rules)
}

fn load_corpus(corpus_dir: &Path) -> Result<Vec<Rule>> {
    let rules = load_rules(corpus_dir)
        .with_context(|| format!("loading license rules from {}", corpus_dir.display()))?;
    Ok(rules)
}
