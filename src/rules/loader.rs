//! Rule corpus loading.
//!
//! A corpus directory holds one pair of files per rule: `<name>.RULE` with
//! the matchable text and `<name>.yml` with the metadata sidecar. Rules are
//! loaded in sorted file-name order so rule IDs are stable across builds of
//! an unchanged corpus. Any defect in any pair fails the whole load.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::expression::LicenseExpression;
use crate::models::{InvalidRuleError, Rule};
use crate::tokenize::tokenize_words;

pub const RULE_TEXT_EXT: &str = "RULE";
pub const RULE_META_EXT: &str = "yml";

/// License expression recorded for false-positive rules that carry none.
pub const NO_EXPRESSION: &str = "unknown";

/// The YAML metadata sidecar. Unknown fields are rejected so a misspelled
/// field fails the load instead of silently falling back to a default.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleMetadata {
    license_expression: Option<String>,
    #[serde(default = "default_percent")]
    relevance: i64,
    #[serde(default = "default_percent")]
    minimum_coverage: i64,
    #[serde(default, deserialize_with = "yes_no_bool")]
    is_license_text: bool,
    #[serde(default, deserialize_with = "yes_no_bool")]
    is_license_notice: bool,
    #[serde(default, deserialize_with = "yes_no_bool")]
    is_license_tag: bool,
    #[serde(default, deserialize_with = "yes_no_bool")]
    is_license_reference: bool,
    #[serde(default, deserialize_with = "yes_no_bool")]
    is_continuous: bool,
    #[serde(default, deserialize_with = "yes_no_bool")]
    is_false_positive: bool,
    #[serde(default)]
    notes: Option<String>,
}

fn default_percent() -> i64 {
    100
}

/// Sidecars in the wild write booleans as `yes`/`no`, which YAML 1.2
/// treats as strings; accept both spellings.
fn yes_no_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum YesNo {
        Bool(bool),
        Text(String),
    }
    match YesNo::deserialize(deserializer)? {
        YesNo::Bool(b) => Ok(b),
        YesNo::Text(s) => match s.to_lowercase().as_str() {
            "yes" | "y" | "true" => Ok(true),
            "no" | "n" | "false" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "not a yes/no value: {other}"
            ))),
        },
    }
}

/// Load every rule pair from a corpus directory, sorted by identifier.
pub fn load_rules(corpus_dir: &Path) -> Result<Vec<Rule>, InvalidRuleError> {
    let entries = fs::read_dir(corpus_dir).map_err(|source| InvalidRuleError::UnreadableFile {
        path: corpus_dir.to_path_buf(),
        source,
    })?;

    // identifier -> (rule text path, sidecar path)
    let mut pairs: BTreeMap<String, (Option<PathBuf>, Option<PathBuf>)> = BTreeMap::new();
    for entry in entries {
        let entry = entry.map_err(|source| InvalidRuleError::UnreadableFile {
            path: corpus_dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let (Some(stem), Some(ext)) = (path.file_stem(), path.extension()) else {
            continue;
        };
        let stem = stem.to_string_lossy().to_string();
        if ext == RULE_TEXT_EXT {
            pairs.entry(stem).or_default().0 = Some(path);
        } else if ext == RULE_META_EXT {
            pairs.entry(stem).or_default().1 = Some(path);
        }
    }

    let mut rules = Vec::with_capacity(pairs.len());
    for (identifier, pair) in pairs {
        let (text_path, meta_path) = match pair {
            (Some(t), Some(m)) => (t, m),
            (Some(t), None) => return Err(InvalidRuleError::MissingSidecar { path: t }),
            (None, Some(m)) => return Err(InvalidRuleError::OrphanSidecar { path: m }),
            (None, None) => unreachable!("pair entries always have one side"),
        };
        rules.push(load_rule(&identifier, &text_path, &meta_path)?);
    }

    log::debug!("loaded {} rules from {}", rules.len(), corpus_dir.display());
    Ok(rules)
}

fn load_rule(
    identifier: &str,
    text_path: &Path,
    meta_path: &Path,
) -> Result<Rule, InvalidRuleError> {
    let text = fs::read_to_string(text_path).map_err(|source| InvalidRuleError::UnreadableFile {
        path: text_path.to_path_buf(),
        source,
    })?;
    let meta_text =
        fs::read_to_string(meta_path).map_err(|source| InvalidRuleError::UnreadableFile {
            path: meta_path.to_path_buf(),
            source,
        })?;

    let meta: RuleMetadata =
        serde_yaml::from_str(&meta_text).map_err(|e| InvalidRuleError::InvalidMetadata {
            path: meta_path.to_path_buf(),
            message: e.to_string(),
        })?;

    for (field, value) in [
        ("relevance", meta.relevance),
        ("minimum_coverage", meta.minimum_coverage),
    ] {
        if !(0..=100).contains(&value) {
            return Err(InvalidRuleError::OutOfRange {
                identifier: identifier.to_string(),
                field,
                value,
            });
        }
    }

    let license_expression = match &meta.license_expression {
        Some(raw) => {
            let parsed = LicenseExpression::parse(raw).map_err(|source| {
                InvalidRuleError::InvalidExpression {
                    identifier: identifier.to_string(),
                    source,
                }
            })?;
            parsed.to_string()
        }
        None if meta.is_false_positive => NO_EXPRESSION.to_string(),
        None => {
            return Err(InvalidRuleError::MissingExpression {
                identifier: identifier.to_string(),
            });
        }
    };

    if tokenize_words(&text).is_empty() {
        return Err(InvalidRuleError::EmptyRule {
            identifier: identifier.to_string(),
        });
    }

    Ok(Rule {
        identifier: identifier.to_string(),
        license_expression,
        text,
        relevance: meta.relevance as u8,
        minimum_coverage: meta.minimum_coverage as u8,
        is_license_text: meta.is_license_text,
        is_license_notice: meta.is_license_notice,
        is_license_tag: meta.is_license_tag,
        is_license_reference: meta.is_license_reference,
        is_continuous: meta.is_continuous,
        is_false_positive: meta.is_false_positive,
        notes: meta.notes,
    })
}
