use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hasher::{DEFAULT_CHUNK_SIZE, HashAlgorithm, Hasher};

/// Upper bound on hashing workers, independent of core count, so that a
/// large machine does not flood a single disk with reads.
pub const MAX_WORKERS: usize = 8;

/// Settings shared by every stage of a run.
///
/// Loaded from an optional TOML file and then overridden by CLI flags.
/// Missing keys fall back to [`Config::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Location of the compressed hash cache.
    pub cache_path: PathBuf,
    /// Size of the hashing worker pool.
    pub workers: usize,
    /// Read size used when streaming a file through the hash.
    pub chunk_size: usize,
    /// Whether the tree walk follows symbolic links.
    pub follow_symlinks: bool,
    pub algorithm: HashAlgorithm,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_path: default_cache_path(),
            workers: default_workers(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            follow_symlinks: false,
            algorithm: HashAlgorithm::default(),
        }
    }
}

pub fn default_cache_path() -> PathBuf {
    PathBuf::from(format!("{}-cache.json.zst", env!("CARGO_PKG_NAME")))
}

pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(MAX_WORKERS)
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()
    }

    /// Rejects values no stage can work with and clamps the worker count.
    pub fn validate(mut self) -> Result<Self> {
        if self.workers == 0 {
            return Err(Error::Config("workers must be at least 1".into()));
        }
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be at least 1".into()));
        }
        self.workers = self.workers.min(MAX_WORKERS);
        Ok(self)
    }

    pub fn hasher(&self) -> Hasher {
        Hasher::new(self.algorithm, self.chunk_size)
    }

    /// Builds the bounded pool used for hashing and cache validation.
    pub fn worker_pool(&self) -> Result<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("hash-worker-{i}"))
            .build()
            .map_err(|e| Error::Config(format!("failed to start worker pool: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_are_bounded() {
        let config = Config::default();
        assert!(config.workers >= 1 && config.workers <= MAX_WORKERS);
        assert_eq!(config.chunk_size, 64 * 1024);
        assert!(!config.follow_symlinks);
        assert_eq!(config.algorithm, HashAlgorithm::Sha256);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dedup.toml");
        fs::write(&path, "workers = 3\nalgorithm = \"blake3\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.workers, 3);
        assert_eq!(config.algorithm, HashAlgorithm::Blake3);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.cache_path, default_cache_path());
    }

    #[test]
    fn workers_are_clamped() {
        let config = Config {
            workers: 64,
            ..Config::default()
        };
        assert_eq!(config.validate().unwrap().workers, MAX_WORKERS);
    }

    #[test]
    fn zero_values_are_rejected() {
        let zero_workers = Config {
            workers: 0,
            ..Config::default()
        };
        assert!(matches!(zero_workers.validate(), Err(Error::Config(_))));

        let zero_chunk = Config {
            chunk_size: 0,
            ..Config::default()
        };
        assert!(matches!(zero_chunk.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dedup.toml");
        fs::write(&path, "pool_size = 4\n").unwrap();
        assert!(matches!(Config::load(&path), Err(Error::Config(_))));
    }
}
