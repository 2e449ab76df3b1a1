use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use log::{debug, error, info, warn};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::{Error, Result};
use crate::index::{Digest, Index};

#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Report what would be deleted without touching any file.
    pub dry_run: bool,
    /// Checked between folder groups; once set, no further group is started.
    pub cancel: Option<Arc<AtomicBool>>,
}

/// Files sharing one digest and one containing folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderGroup {
    pub digest: Digest,
    pub folder: PathBuf,
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ResolveReport {
    /// Folder groups in which a file was kept and the rest deleted.
    pub groups_acted_on: usize,
    pub deleted: Vec<PathBuf>,
    /// Groups left untouched because a member could not be stat'ed.
    /// Groups reduced to fewer than two regular files are not counted at all.
    pub skipped_groups: Vec<FolderGroup>,
    pub failures: Vec<Error>,
    pub interrupted: bool,
}

/// Splits every multi-path digest by containing folder and returns the
/// folders holding two or more copies. Copies in different folders are never
/// grouped together.
pub fn folder_groups(index: &Index) -> Vec<FolderGroup> {
    let mut groups = Vec::new();
    for (digest, paths) in index.duplicate_entries() {
        let mut by_folder: BTreeMap<&Path, Vec<PathBuf>> = BTreeMap::new();
        for path in paths {
            let folder = path.parent().unwrap_or_else(|| Path::new(""));
            by_folder.entry(folder).or_default().push(path.clone());
        }
        groups.extend(
            by_folder
                .into_iter()
                .filter(|(_, files)| files.len() > 1)
                .map(|(folder, files)| FolderGroup {
                    digest: digest.clone(),
                    folder: folder.to_path_buf(),
                    files,
                }),
        );
    }
    groups
}

/// Creation time where the platform records it, otherwise modification time.
///
/// Reads the entry itself, never the target of a symbolic link.
pub fn creation_time(path: &Path) -> Result<SystemTime> {
    let metadata = fs::symlink_metadata(path).map_err(|e| Error::io(path, e))?;
    metadata
        .created()
        .or_else(|_| metadata.modified())
        .map_err(|e| Error::io(path, e))
}

/// Members of `group` that are regular files in their own right.
///
/// A symbolic link shares its target's content, so deleting the target and
/// keeping the link would lose the data. Links are neither kept nor deleted.
fn regular_files(group: &FolderGroup) -> Result<Vec<PathBuf>> {
    let mut files = Vec::with_capacity(group.files.len());
    for path in &group.files {
        let file_type = fs::symlink_metadata(path)
            .map_err(|e| Error::io(path, e))?
            .file_type();
        if file_type.is_file() {
            files.push(path.clone());
        } else {
            debug!("Ignoring '{}': not a regular file", path.display());
        }
    }
    Ok(files)
}

/// Picks the file to keep: earliest timestamp, ties broken by path order.
fn oldest(files: &[PathBuf]) -> Result<Option<PathBuf>> {
    let mut stamped = Vec::with_capacity(files.len());
    for path in files {
        stamped.push((creation_time(path)?, path));
    }
    Ok(stamped.into_iter().min().map(|(_, path)| path.clone()))
}

fn format_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".into())
}

fn removal_error(path: &Path, e: std::io::Error) -> Error {
    match e.kind() {
        ErrorKind::PermissionDenied => Error::PermissionDenied(path.to_path_buf()),
        _ => Error::io(path, e),
    }
}

fn delete_file(path: &Path) -> Result<()> {
    fs::remove_file(path).map_err(|e| removal_error(path, e))
}

/// Deletes all but the oldest file of every folder group.
///
/// Each deletion is attempted on its own: a failure is recorded and the pass
/// carries on with the remaining files and groups.
pub fn resolve(index: &Index, options: &ResolveOptions) -> ResolveReport {
    let mut report = ResolveReport::default();

    for group in folder_groups(index) {
        if options
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
        {
            warn!("Interrupted, leaving remaining duplicate groups untouched");
            report.interrupted = true;
            break;
        }

        let chosen = regular_files(&group)
            .and_then(|files| Ok((oldest(&files)?, files)));
        let (keep, files) = match chosen {
            Ok((Some(keep), files)) if files.len() > 1 => (keep, files),
            Ok(_) => continue,
            Err(e) => {
                error!(
                    "Skipping duplicates in '{}': {}",
                    group.folder.display(),
                    e
                );
                report.failures.push(e);
                report.skipped_groups.push(group);
                continue;
            }
        };

        report.groups_acted_on += 1;
        info!(
            "Duplicate files found in folder: '{}' ({} copies)",
            group.folder.display(),
            files.len()
        );
        if let Ok(created) = creation_time(&keep) {
            debug!("Keeping '{}' (created {})", keep.display(), format_time(created));
        }

        for path in files.iter().filter(|p| **p != keep) {
            if options.dry_run {
                info!("Would delete '{}'", path.display());
                report.deleted.push(path.clone());
                continue;
            }
            match delete_file(path) {
                Ok(()) => {
                    info!("Deleted '{}'", path.display());
                    report.deleted.push(path.clone());
                }
                Err(e) => {
                    error!("{}", e);
                    report.failures.push(e);
                }
            }
        }
    }

    info!("Total duplicate folders found: {}", report.groups_acted_on);
    report
}
