use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use log::{info, warn};

use crate::cache::CacheStore;
use crate::config::Config;
use crate::duplicates::{ResolveOptions, ResolveReport, resolve};
use crate::error::{Error, Result};
use crate::index::Index;
use crate::scanner::build_index;
use crate::utils::progress_bar;
use crate::validator::validate;

/// What to do when `--use-cache` finds a cache that cannot be decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CorruptCachePolicy {
    /// End the run with `Error::CorruptCache`.
    #[default]
    Abort,
    /// Log the problem and hash the tree from scratch.
    Rebuild,
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub root: PathBuf,
    pub use_cache: bool,
    pub delete: bool,
    pub dry_run: bool,
    pub on_corrupt_cache: CorruptCachePolicy,
    pub show_progress: bool,
    pub cancel: Option<Arc<AtomicBool>>,
}

/// Where the index used by the run came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSource {
    Scanned,
    ValidatedCache,
}

#[derive(Debug)]
pub struct RunSummary {
    pub source: IndexSource,
    pub index: Index,
    /// Files that could not be hashed during a scan.
    pub hash_failures: usize,
    /// Cached paths dropped during validation.
    pub stale_paths: usize,
    pub resolve: Option<ResolveReport>,
}

/// Drives one run: scan or load+validate, persist, then optionally resolve.
///
/// Per-file errors are logged and counted. The only errors returned are those
/// that prevent an index from being produced at all.
pub fn run(config: &Config, options: &RunOptions) -> Result<RunSummary> {
    let store = CacheStore::new(&config.cache_path);

    let cached = if options.use_cache {
        load_matching(&store, config, options)?
    } else {
        None
    };

    let (source, index, hash_failures, stale_paths) = match cached {
        Some(index) => {
            let report = validate(index, config, &progress_bar(options.show_progress))?;
            (
                IndexSource::ValidatedCache,
                report.index,
                0,
                report.dropped_paths.len(),
            )
        }
        None => {
            let report = build_index(&options.root, config, &progress_bar(options.show_progress))?;
            (IndexSource::Scanned, report.index, report.failures.len(), 0)
        }
    };

    if let Err(e) = store.save(&index, &options.root, config.algorithm) {
        warn!("Failed to save hash cache: {}", e);
    }

    let resolved = if options.delete || options.dry_run {
        let resolve_options = ResolveOptions {
            dry_run: options.dry_run,
            cancel: options.cancel.clone(),
        };
        Some(resolve(&index, &resolve_options))
    } else {
        info!("Skipping duplicate deletion");
        None
    };

    Ok(RunSummary {
        source,
        index,
        hash_failures,
        stale_paths,
        resolve: resolved,
    })
}

/// Returns the cached index if it was produced for this root and algorithm.
fn load_matching(store: &CacheStore, config: &Config, options: &RunOptions) -> Result<Option<Index>> {
    let snapshot = match store.load() {
        Ok(snapshot) => snapshot,
        Err(e @ Error::CorruptCache { .. }) => match options.on_corrupt_cache {
            CorruptCachePolicy::Abort => return Err(e),
            CorruptCachePolicy::Rebuild => {
                warn!("{}; rebuilding from scratch", e);
                store.remove()?;
                return Ok(None);
            }
        },
        Err(e) => return Err(e),
    };

    let Some(snapshot) = snapshot else {
        return Ok(None);
    };
    if snapshot.root != options.root {
        warn!(
            "Cache was built for '{}', not '{}'; rebuilding",
            snapshot.root.display(),
            options.root.display()
        );
        return Ok(None);
    }
    if snapshot.algorithm != config.algorithm {
        warn!(
            "Cache uses {} but {} was requested; rebuilding",
            snapshot.algorithm.name(),
            config.algorithm.name()
        );
        return Ok(None);
    }
    Ok(Some(snapshot.index))
}
