//! On-disk index artifact.
//!
//! Reading a corpus of thousands of rule pairs dominates engine startup.
//! The artifact stores the loaded rules together with a checksum of the
//! corpus directory, bincode-encoded and zstd-compressed; when the
//! checksum still matches, the engine deserializes the rules and skips the
//! per-file parse. The index structures are always rebuilt from the rules,
//! so the artifact stays small and version drift in derived data cannot
//! occur.
//!
//! A missing, stale or unreadable artifact is never an error, only a cache
//! miss; the engine falls back to the corpus directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::Rule;
use crate::rules::loader::{RULE_META_EXT, RULE_TEXT_EXT};

/// Bumped when the artifact layout changes; older artifacts are misses.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Compression level for artifact writes. Artifacts are written offline
/// and read often, so favor the read side.
const ZSTD_LEVEL: i32 = 19;

#[derive(Serialize, Deserialize)]
struct IndexArtifact {
    format_version: u32,
    corpus_checksum: String,
    rules: Vec<Rule>,
}

/// Hex SHA-256 over the corpus rule files, sorted by file name, covering
/// names and contents. Unrelated files in the directory do not affect it.
pub fn corpus_checksum(corpus_dir: &Path) -> Result<String> {
    let mut files: Vec<(String, PathBuf)> = Vec::new();
    let entries = fs::read_dir(corpus_dir)
        .with_context(|| format!("reading corpus directory {}", corpus_dir.display()))?;
    for entry in entries {
        let path = entry
            .with_context(|| format!("reading corpus directory {}", corpus_dir.display()))?
            .path();
        let Some(ext) = path.extension() else { continue };
        if ext != RULE_TEXT_EXT && ext != RULE_META_EXT {
            continue;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        files.push((name, path));
    }
    files.sort();

    let mut hasher = Sha256::new();
    for (name, path) in files {
        let content =
            fs::read(&path).with_context(|| format!("reading corpus file {}", path.display()))?;
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(&content);
        hasher.update([0u8]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Serialize rules and checksum to `path`.
pub fn write_artifact(path: &Path, rules: &[Rule], corpus_checksum: &str) -> Result<()> {
    let artifact = IndexArtifact {
        format_version: ARTIFACT_FORMAT_VERSION,
        corpus_checksum: corpus_checksum.to_string(),
        rules: rules.to_vec(),
    };
    let encoded = bincode::serde::encode_to_vec(&artifact, bincode::config::standard())
        .context("encoding index artifact")?;
    let compressed =
        zstd::encode_all(encoded.as_slice(), ZSTD_LEVEL).context("compressing index artifact")?;
    fs::write(path, compressed)
        .with_context(|| format!("writing index artifact {}", path.display()))?;
    log::debug!(
        "wrote index artifact {} ({} rules, {} bytes)",
        path.display(),
        rules.len(),
        fs::metadata(path).map(|m| m.len()).unwrap_or(0)
    );
    Ok(())
}

/// Load rules from an artifact if it exists and matches `expected_checksum`.
/// Any mismatch or decode failure is a cache miss, not an error.
pub fn read_artifact(path: &Path, expected_checksum: &str) -> Option<Vec<Rule>> {
    let compressed = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            log::warn!("cannot read index artifact {}: {e}", path.display());
            return None;
        }
    };
    let encoded = match zstd::decode_all(compressed.as_slice()) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("corrupt index artifact {}: {e}", path.display());
            return None;
        }
    };
    let artifact: IndexArtifact =
        match bincode::serde::decode_from_slice(&encoded, bincode::config::standard()) {
            Ok((artifact, _)) => artifact,
            Err(e) => {
                log::warn!("cannot decode index artifact {}: {e}", path.display());
                return None;
            }
        };

    if artifact.format_version != ARTIFACT_FORMAT_VERSION {
        log::debug!(
            "index artifact {} has format {}, want {}",
            path.display(),
            artifact.format_version,
            ARTIFACT_FORMAT_VERSION
        );
        return None;
    }
    if artifact.corpus_checksum != expected_checksum {
        log::debug!("index artifact {} is stale", path.display());
        return None;
    }
    Some(artifact.rules)
}
