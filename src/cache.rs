use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use indicatif::{HumanBytes, HumanCount, ProgressBar};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use zstd::stream::{Encoder, decode_all};

use crate::error::{Error, Result};
use crate::hasher::HashAlgorithm;
use crate::index::{Digest, Index};

const CACHE_VERSION: u32 = 1;
const COMPRESSION_LEVEL: i32 = 9;

/// On-disk shape of the cache: zstd-compressed JSON.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct CacheEnvelope {
    version: u32,
    algorithm: HashAlgorithm,
    root: PathBuf,
    entries: BTreeMap<Digest, BTreeSet<PathBuf>>,
}

/// An index read back from disk, together with what produced it.
///
/// Nothing about it is trusted until it has been through
/// [`crate::validator::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSnapshot {
    pub root: PathBuf,
    pub algorithm: HashAlgorithm,
    pub index: Index,
}

/// Reads and writes the digest -> paths index to a single file.
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Writes `index` to a temporary file next to the cache and renames it
    /// over the old one, so a crash mid-save leaves the previous cache intact.
    pub fn save(&self, index: &Index, root: &Path, algorithm: HashAlgorithm) -> Result<()> {
        info!(
            "Saving hash cache to {} ({} digests)",
            self.path.display(),
            HumanCount(index.len() as u64)
        );
        let spinner = ProgressBar::new_spinner();
        spinner.set_message("Saving hash cache...");
        spinner.enable_steady_tick(std::time::Duration::from_millis(100));

        let envelope = CacheEnvelope {
            version: CACHE_VERSION,
            algorithm,
            root: root.to_path_buf(),
            entries: index.clone().into_entries(),
        };
        let content = serde_json::to_vec(&envelope)
            .map_err(|e| Error::io(&self.path, std::io::Error::other(e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let tmp = self.temp_path();
        let written = write_compressed(&tmp, &content);
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            spinner.finish_and_clear();
            return Err(Error::io(&tmp, e));
        }
        fs::rename(&tmp, &self.path).map_err(|e| Error::io(&self.path, e))?;

        spinner.finish_and_clear();
        let size = fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        info!("Hash cache compressed size: {}", HumanBytes(size));
        Ok(())
    }

    /// Loads the cache. `Ok(None)` means there is no cache file yet.
    pub fn load(&self) -> Result<Option<CacheSnapshot>> {
        let compressed = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("No hash cache file found at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(Error::io(&self.path, e)),
        };
        info!(
            "Loading hash cache from: {} ({})",
            self.path.display(),
            HumanBytes(compressed.len() as u64)
        );

        let decoded = decode_all(&compressed[..])
            .map_err(|e| Error::corrupt(&self.path, format!("decompression failed: {e}")))?;
        let envelope: CacheEnvelope = serde_json::from_slice(&decoded)
            .map_err(|e| Error::corrupt(&self.path, format!("malformed contents: {e}")))?;

        if envelope.version != CACHE_VERSION {
            return Err(Error::corrupt(
                &self.path,
                format!(
                    "unsupported cache version {} (expected {})",
                    envelope.version, CACHE_VERSION
                ),
            ));
        }

        let mut index = Index::new();
        for (digest, paths) in envelope.entries {
            if paths.is_empty() {
                return Err(Error::corrupt(
                    &self.path,
                    format!("digest {digest} has no paths"),
                ));
            }
            index.extend(paths.into_iter().map(|p| (digest.clone(), p)));
        }
        info!("Hash cache has {} entries", HumanCount(index.len() as u64));

        Ok(Some(CacheSnapshot {
            root: envelope.root,
            algorithm: envelope.algorithm,
            index,
        }))
    }

    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Removed hash cache {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(&self.path, e)),
        }
    }
}

fn write_compressed(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let file = fs::File::create(path)?;
    let mut encoder = Encoder::new(file, COMPRESSION_LEVEL)?;
    let threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    if threads > 1 {
        if let Err(err) = encoder.multithread(threads as u32) {
            debug!(
                "Failed to enable multi-threaded compression ({}), using single thread",
                err
            );
        }
    }
    encoder.write_all(content)?;
    let file = encoder.finish()?;
    file.sync_all()
}
