use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};
use sha2::Digest as _;

use crate::error::{Error, Result};
use crate::index::Digest;

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Content hash used for file fingerprints. Both produce 64 hex characters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Blake3,
}

impl HashAlgorithm {
    pub fn name(self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Blake3 => "blake3",
        }
    }
}

enum State {
    Sha256(sha2::Sha256),
    Blake3(Box<blake3::Hasher>),
}

impl State {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha256 => State::Sha256(sha2::Sha256::new()),
            HashAlgorithm::Blake3 => State::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    fn update(&mut self, bytes: &[u8]) {
        match self {
            State::Sha256(h) => h.update(bytes),
            State::Blake3(h) => {
                h.update(bytes);
            }
        }
    }

    fn finalize(self) -> String {
        match self {
            State::Sha256(h) => format!("{:x}", h.finalize()),
            State::Blake3(h) => h.finalize().to_hex().to_string(),
        }
    }
}

/// Streams a file through the configured hash in fixed-size chunks.
#[derive(Debug, Clone, Copy)]
pub struct Hasher {
    algorithm: HashAlgorithm,
    chunk_size: usize,
}

impl Hasher {
    pub fn new(algorithm: HashAlgorithm, chunk_size: usize) -> Self {
        Self {
            algorithm,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn hash_file(&self, path: &Path) -> Result<Digest> {
        let mut file = File::open(path).map_err(|e| Error::io(path, e))?;
        let digest = self.hash_reader(&mut file).map_err(|e| Error::io(path, e))?;
        debug!("Hashed '{}': {}", path.display(), digest);
        Ok(digest)
    }

    pub fn hash_reader<R: Read>(&self, reader: &mut R) -> std::io::Result<Digest> {
        let mut state = State::new(self.algorithm);
        let mut buffer = vec![0u8; self.chunk_size];

        loop {
            let bytes_read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            state.update(&buffer[..bytes_read]);
        }

        Ok(Digest::new(state.finalize()))
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new(HashAlgorithm::default(), DEFAULT_CHUNK_SIZE)
    }
}
