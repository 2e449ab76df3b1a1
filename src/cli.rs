use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;
use crate::error::Result;
use crate::hasher::HashAlgorithm;

#[derive(Parser, Debug)]
#[command(name = "folder-dedup", version)]
#[command(about = "Find and remove duplicate files that share a folder, keeping the oldest copy")]
pub struct Cli {
    /// Directory to scan for duplicates
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Reuse the hash cache from a previous run after re-validating it
    #[arg(long)]
    pub use_cache: bool,

    /// Delete duplicates within each folder, keeping the oldest file
    #[arg(long)]
    pub delete: bool,

    /// Report which files would be deleted without deleting them
    #[arg(long)]
    pub dry_run: bool,

    /// Hash the tree from scratch if the cache is corrupt instead of failing
    #[arg(long)]
    pub rebuild_on_corrupt: bool,

    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Location of the hash cache file
    #[arg(long)]
    pub cache_file: Option<PathBuf>,

    /// Number of parallel hashing threads (capped at 8)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Read size in bytes used when hashing
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Follow symbolic links while walking the tree
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Hash algorithm for file fingerprints
    #[arg(long, value_enum)]
    pub algorithm: Option<HashAlgorithm>,

    /// Disable progress bars
    #[arg(long)]
    pub no_progress: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Loads the config file, if any, and applies command-line overrides.
    pub fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if let Some(cache_file) = &self.cache_file {
            config.cache_path = cache_file.clone();
        }
        if let Some(threads) = self.threads {
            config.workers = threads;
        }
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }
        if self.follow_symlinks {
            config.follow_symlinks = true;
        }
        if let Some(algorithm) = self.algorithm {
            config.algorithm = algorithm;
        }
        config.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "folder-dedup",
            "/tmp/photos",
            "--use-cache",
            "--delete",
            "--threads",
            "3",
            "--algorithm",
            "blake3",
            "--cache-file",
            "/tmp/c.json.zst",
        ]);
        assert_eq!(cli.path, PathBuf::from("/tmp/photos"));
        assert!(cli.use_cache && cli.delete && !cli.dry_run);

        let config = cli.resolve_config().unwrap();
        assert_eq!(config.workers, 3);
        assert_eq!(config.algorithm, HashAlgorithm::Blake3);
        assert_eq!(config.cache_path, PathBuf::from("/tmp/c.json.zst"));
    }

    #[test]
    fn zero_threads_is_rejected() {
        let cli = Cli::parse_from(["folder-dedup", "--threads", "0"]);
        assert!(matches!(cli.resolve_config(), Err(Error::Config(_))));
    }

    #[test]
    fn path_defaults_to_current_dir() {
        let cli = Cli::parse_from(["folder-dedup"]);
        assert_eq!(cli.path, PathBuf::from("."));
        assert!(!cli.use_cache && !cli.delete);
    }
}
