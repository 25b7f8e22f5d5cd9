//! Payload extraction from distribution containers.
//!
//! Registries publish some distributions as zip-structured package
//! containers rather than bare tarballs: a `.appx` wraps the root
//! filesystem archive directly, and a `.appxbundle` wraps one `.appx` per
//! CPU architecture. This module digs the usable archive out of either,
//! bounded to a fixed nesting depth, and validates what it produced by
//! its leading bytes before declaring success.
//!
//! "No payload found anywhere inside" is a normal, handled outcome and is
//! reported as `Ok(None)`; only real I/O failures and corrupt containers
//! become errors. Either way no corrupt stub is left at the target.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::catalog::Architecture;
use crate::error::{VaultError, VaultResult};

/// Entry name suffixes recognized as a usable filesystem archive.
const PAYLOAD_SUFFIXES: &[&str] = &[".tar.gz", ".tgz", ".tar.xz", ".tar"];

/// Maximum number of zip layers opened per extraction. A bundle holds an
/// inner package which holds the payload; anything deeper is treated as
/// hostile input and reported as "not found".
const MAX_NESTING: usize = 2;

/// Container format, detected from the source URL's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContainerKind {
    /// Single-architecture package, one zip layer around the payload.
    PackageArchive,
    /// Package-of-packages, one inner package per CPU architecture.
    PackageBundle,
    /// Already a usable archive; no extraction needed.
    Passthrough,
}

impl ContainerKind {
    fn from_url(url: &str) -> Self {
        let path = url
            .split(['?', '#'])
            .next()
            .unwrap_or(url)
            .to_lowercase();

        if path.ends_with(".appxbundle") {
            Self::PackageBundle
        } else if path.ends_with(".appx") {
            Self::PackageArchive
        } else {
            Self::Passthrough
        }
    }
}

/// Extracts the usable archive out of downloaded containers.
#[derive(Debug, Clone)]
pub struct PayloadExtractor {
    max_nesting: usize,
}

impl Default for PayloadExtractor {
    fn default() -> Self {
        Self {
            max_nesting: MAX_NESTING,
        }
    }
}

impl PayloadExtractor {
    /// Create an extractor with the default nesting bound.
    pub fn new() -> Self {
        Self::default()
    }

    /// Turn a downloaded file into a usable archive at `target`.
    ///
    /// The container format is detected from `source_url`'s extension;
    /// files that are not containers are moved to `target` unchanged. The
    /// source file is consumed on success (renamed or left behind as an
    /// emptied container for the caller to delete).
    ///
    /// Returns `Ok(None)` when no payload archive exists at any nesting
    /// level; the target is guaranteed absent in that case and after any
    /// error.
    pub async fn extract_payload(
        &self,
        source: &Path,
        source_url: &str,
        target: &Path,
        arch: Architecture,
    ) -> VaultResult<Option<PathBuf>> {
        let kind = ContainerKind::from_url(source_url);
        debug!(source = %source.display(), ?kind, "extracting payload");

        let found = match kind {
            ContainerKind::Passthrough => {
                tokio::fs::rename(source, target)
                    .await
                    .map_err(|e| VaultError::io(target, e))?;
                true
            }
            ContainerKind::PackageArchive | ContainerKind::PackageBundle => {
                let source = source.to_path_buf();
                let target_owned = target.to_path_buf();
                let levels_below = self.max_nesting.saturating_sub(1);

                let task = tokio::task::spawn_blocking(move || {
                    unpack_zip_layer(&source, &target_owned, arch, levels_below)
                })
                .await
                .map_err(|e| VaultError::Extraction {
                    path: target.to_path_buf(),
                    reason: format!("extraction task failed: {e}"),
                });

                match task.and_then(|inner| inner) {
                    Ok(found) => found,
                    Err(e) => {
                        remove_stub(target);
                        return Err(e);
                    }
                }
            }
        };

        if !found {
            return Ok(None);
        }

        match looks_like_archive(target) {
            Ok(true) => Ok(Some(target.to_path_buf())),
            Ok(false) => {
                remove_stub(target);
                Err(VaultError::Extraction {
                    path: target.to_path_buf(),
                    reason: "produced file is not a recognized archive format".to_string(),
                })
            }
            Err(e) => {
                remove_stub(target);
                Err(VaultError::io(target, e))
            }
        }
    }
}

/// Search one zip layer for a payload archive, descending into nested
/// packages while the nesting bound allows.
///
/// Returns `Ok(true)` when the payload was written to `target`.
fn unpack_zip_layer(
    source: &Path,
    target: &Path,
    arch: Architecture,
    levels_below: usize,
) -> VaultResult<bool> {
    let file = File::open(source).map_err(|e| VaultError::io(source, e))?;
    let mut archive =
        zip::ZipArchive::new(BufReader::new(file)).map_err(|e| VaultError::Extraction {
            path: source.to_path_buf(),
            reason: format!("not a readable zip container: {e}"),
        })?;

    let names: Vec<String> = archive.file_names().map(str::to_string).collect();

    // Payload found at this layer wins, even inside a bundle.
    if let Some(payload) = names.iter().find(|n| is_payload_name(n)) {
        debug!(entry = %payload, "payload archive located");
        copy_entry(&mut archive, payload, target)?;
        return Ok(true);
    }

    if levels_below == 0 {
        return Ok(false);
    }

    let nested: Vec<&str> = names
        .iter()
        .map(String::as_str)
        .filter(|n| n.to_lowercase().ends_with(".appx"))
        .collect();
    let Some(&first) = nested.first() else {
        return Ok(false);
    };

    let chosen = nested
        .iter()
        .copied()
        .find(|n| matches_architecture(n, arch))
        .unwrap_or(first);
    if !matches_architecture(chosen, arch) {
        warn!(entry = %chosen, %arch, "no package for this architecture, using first");
    }

    let nested_path = target.with_extension("nested.appx");
    copy_entry(&mut archive, chosen, &nested_path)?;

    let result = unpack_zip_layer(&nested_path, target, arch, levels_below - 1);
    let _ = std::fs::remove_file(&nested_path);
    result
}

/// Stream one zip entry out to a file.
fn copy_entry<R: Read + std::io::Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
    dest: &Path,
) -> VaultResult<()> {
    let mut entry = archive.by_name(name).map_err(|e| VaultError::Extraction {
        path: dest.to_path_buf(),
        reason: format!("failed to open container entry {name:?}: {e}"),
    })?;
    let mut out = File::create(dest).map_err(|e| VaultError::io(dest, e))?;
    std::io::copy(&mut entry, &mut out).map_err(|e| VaultError::io(dest, e))?;
    Ok(())
}

fn is_payload_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    PAYLOAD_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix))
}

fn matches_architecture(name: &str, arch: Architecture) -> bool {
    let lower = name.to_lowercase();
    arch.name_tags().iter().any(|tag| lower.contains(tag))
}

/// Check a file's leading bytes for a recognized archive format: gzip,
/// xz, or a tar header.
fn looks_like_archive(path: &Path) -> std::io::Result<bool> {
    let mut file = File::open(path)?;
    let mut buf = [0u8; 512];
    let mut filled = 0;
    loop {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
        if filled == buf.len() {
            break;
        }
    }
    let head = &buf[..filled];

    let gzip = head.len() >= 2 && head[0] == 0x1F && head[1] == 0x8B;
    let xz = head.len() >= 6 && head[..6] == [0xFD, b'7', b'z', b'X', b'Z', 0x00];
    let tar = head.len() >= 262 && &head[257..262] == b"ustar";

    Ok(gzip || xz || tar)
}

/// Best-effort removal of a half-written target.
fn remove_stub(target: &Path) {
    let _ = std::fs::remove_file(target);
}
