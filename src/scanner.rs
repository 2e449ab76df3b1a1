use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use indicatif::{HumanCount, ProgressBar};
use log::{debug, error, info, warn};
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::index::{Digest, Index};

/// Outcome of a full hash pass over a directory tree.
#[derive(Debug)]
pub struct ScanReport {
    pub index: Index,
    /// Regular files found by the walk, hashed or not.
    pub files_found: usize,
    /// Files that could not be hashed. None of them are in `index`.
    pub failures: Vec<Error>,
    /// Entries the walk itself could not read (unreadable directories etc).
    pub walk_errors: Vec<Error>,
}

/// Lists every regular file under `root`.
///
/// Symbolic links are only traversed when `follow_symlinks` is set; when they
/// are not, a link is neither hashed nor descended into. When they are, every
/// file reachable through several paths is listed once, preferring a path
/// that is not itself a link.
pub fn collect_files(root: &Path, follow_symlinks: bool) -> Result<(Vec<PathBuf>, Vec<Error>)> {
    let metadata = std::fs::metadata(root).map_err(|e| Error::io(root, e))?;
    if !metadata.is_dir() {
        return Err(Error::Walk {
            path: root.to_path_buf(),
            reason: "not a directory".into(),
        });
    }

    // canonical path -> (is a link, path as walked)
    let mut files: BTreeMap<PathBuf, (bool, PathBuf)> = BTreeMap::new();
    let mut walk_errors = Vec::new();
    for entry in WalkDir::new(root).follow_links(follow_symlinks) {
        match entry {
            Ok(entry) if entry.file_type().is_file() => {
                let is_link = entry.path_is_symlink();
                let path = entry.into_path();
                let key = if follow_symlinks {
                    path.canonicalize().unwrap_or_else(|_| path.clone())
                } else {
                    path.clone()
                };
                let candidate = (is_link, path);
                match files.get_mut(&key) {
                    Some(existing) => {
                        debug!(
                            "'{}' and '{}' are the same file",
                            existing.1.display(),
                            candidate.1.display()
                        );
                        if candidate < *existing {
                            *existing = candidate;
                        }
                    }
                    None => {
                        files.insert(key, candidate);
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                let path = e.path().unwrap_or(root).to_path_buf();
                warn!("Skipping unreadable entry '{}': {}", path.display(), e);
                walk_errors.push(Error::Walk {
                    path,
                    reason: e.to_string(),
                });
            }
        }
    }
    let files = files.into_values().map(|(_, path)| path).collect();
    Ok((files, walk_errors))
}

/// Hashes `files` on the worker pool and aggregates the results.
///
/// Workers only return `(digest, path)` or an error. The index is assembled
/// afterwards by the caller's thread alone, once every file has been
/// processed. A file that fails to hash is logged and left out.
pub fn hash_files(
    files: &[PathBuf],
    config: &Config,
    progress: &ProgressBar,
) -> Result<(Index, Vec<Error>)> {
    let hasher = config.hasher();
    let pool = config.worker_pool()?;
    progress.set_length(files.len() as u64);
    progress.set_message("Building hash index");

    let results: Vec<Result<(Digest, PathBuf)>> = pool.install(|| {
        files
            .par_iter()
            .map(|path| {
                let result = hasher.hash_file(path).map(|digest| (digest, path.clone()));
                progress.inc(1);
                result
            })
            .collect()
    });
    progress.finish_and_clear();

    let mut index = Index::new();
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok((digest, path)) => index.insert(digest, path),
            Err(e) => {
                error!("Failed to hash: {}", e);
                failures.push(e);
            }
        }
    }
    Ok((index, failures))
}

/// Walks `root` and hashes every regular file found.
pub fn build_index(root: &Path, config: &Config, progress: &ProgressBar) -> Result<ScanReport> {
    info!("Scanning {}", root.display());
    let (files, walk_errors) = collect_files(root, config.follow_symlinks)?;
    info!("Found {} files", HumanCount(files.len() as u64));

    let files_found = files.len();
    let (index, failures) = hash_files(&files, config, progress)?;

    info!(
        "Indexed {} files into {} digests ({} failed)",
        HumanCount(index.file_count() as u64),
        HumanCount(index.len() as u64),
        failures.len()
    );
    debug!("{} walk errors", walk_errors.len());

    Ok(ScanReport {
        index,
        files_found,
        failures,
        walk_errors,
    })
}
