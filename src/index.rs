use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Lowercase hex fingerprint of a file's full contents.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    pub fn new(hex: impl Into<String>) -> Self {
        Digest(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mapping from digest to every file that hashed to it.
///
/// Paths are kept in a set, so two indexes compare equal whenever they hold
/// the same digest -> paths contents regardless of insertion order. There is
/// no way to leave a digest with an empty path set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Index {
    entries: BTreeMap<Digest, BTreeSet<PathBuf>>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, digest: Digest, path: PathBuf) {
        self.entries.entry(digest).or_default().insert(path);
    }

    pub fn get(&self, digest: &Digest) -> Option<&BTreeSet<PathBuf>> {
        self.entries.get(digest)
    }

    pub fn contains_path(&self, path: &Path) -> bool {
        self.entries.values().any(|paths| paths.contains(path))
    }

    /// Number of distinct digests.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of paths across all digests.
    pub fn file_count(&self) -> usize {
        self.entries.values().map(BTreeSet::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Digest, &BTreeSet<PathBuf>)> {
        self.entries.iter()
    }

    /// Entries shared by more than one path, anywhere in the tree.
    pub fn duplicate_entries(&self) -> impl Iterator<Item = (&Digest, &BTreeSet<PathBuf>)> {
        self.entries.iter().filter(|(_, paths)| paths.len() > 1)
    }

    pub(crate) fn into_entries(self) -> BTreeMap<Digest, BTreeSet<PathBuf>> {
        self.entries
    }
}

impl FromIterator<(Digest, PathBuf)> for Index {
    fn from_iter<I: IntoIterator<Item = (Digest, PathBuf)>>(iter: I) -> Self {
        let mut index = Index::new();
        for (digest, path) in iter {
            index.insert(digest, path);
        }
        index
    }
}

impl Extend<(Digest, PathBuf)> for Index {
    fn extend<I: IntoIterator<Item = (Digest, PathBuf)>>(&mut self, iter: I) {
        for (digest, path) in iter {
            self.insert(digest, path);
        }
    }
}
