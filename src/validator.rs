use std::fs;
use std::path::PathBuf;

use indicatif::{HumanCount, ProgressBar};
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::config::Config;
use crate::error::Result;
use crate::index::{Digest, Index};

#[derive(Debug)]
pub struct ValidationReport {
    pub index: Index,
    /// Paths re-hashed.
    pub checked: usize,
    /// Paths that were missing, unreadable, or no longer matched their digest.
    pub dropped_paths: Vec<PathBuf>,
    /// Digests left with no valid path.
    pub dropped_digests: usize,
}

/// Re-checks a cached index against the filesystem.
///
/// A path survives only if it still exists and re-hashes to the digest it is
/// filed under. Read errors count as a mismatch, and so does a path that has
/// become a symbolic link when links are not being followed. Digests whose
/// paths all fail are removed.
pub fn validate(cached: Index, config: &Config, progress: &ProgressBar) -> Result<ValidationReport> {
    info!("Validating hash cache...");
    let claims: Vec<(Digest, PathBuf)> = cached
        .into_entries()
        .into_iter()
        .flat_map(|(digest, paths)| paths.into_iter().map(move |p| (digest.clone(), p)))
        .collect();
    let digests_before = claims
        .iter()
        .map(|(d, _)| d)
        .collect::<std::collections::BTreeSet<_>>()
        .len();

    let hasher = config.hasher();
    let pool = config.worker_pool()?;
    progress.set_length(claims.len() as u64);
    progress.set_message("Validating hash cache");

    let checked: Vec<(Digest, PathBuf, bool)> = pool.install(|| {
        claims
            .into_par_iter()
            .map(|(digest, path)| {
                let replaced_by_link = !config.follow_symlinks
                    && fs::symlink_metadata(&path).is_ok_and(|m| m.file_type().is_symlink());
                let valid = if replaced_by_link {
                    debug!("'{}' is now a symbolic link", path.display());
                    false
                } else {
                    match hasher.hash_file(&path) {
                        Ok(actual) if actual == digest => true,
                        Ok(actual) => {
                            debug!(
                                "'{}' changed since it was cached ({} -> {})",
                                path.display(),
                                digest,
                                actual
                            );
                            false
                        }
                        Err(e) => {
                            debug!("Dropping cached path: {}", e);
                            false
                        }
                    }
                };
                progress.inc(1);
                (digest, path, valid)
            })
            .collect()
    });
    progress.finish_and_clear();

    let total = checked.len();
    let mut index = Index::new();
    let mut dropped_paths = Vec::new();
    for (digest, path, valid) in checked {
        if valid {
            index.insert(digest, path);
        } else {
            dropped_paths.push(path);
        }
    }
    let dropped_digests = digests_before - index.len();

    if !dropped_paths.is_empty() {
        warn!(
            "Dropped {} stale paths and {} digests from the cache",
            HumanCount(dropped_paths.len() as u64),
            HumanCount(dropped_digests as u64)
        );
    }
    info!(
        "Cache validation complete: {} of {} paths still valid",
        HumanCount(index.file_count() as u64),
        HumanCount(total as u64)
    );

    Ok(ValidationReport {
        index,
        checked: total,
        dropped_paths,
        dropped_digests,
    })
}
