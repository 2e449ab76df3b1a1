use std::fs;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use folder_dedup::{
    CacheStore, Config, CorruptCachePolicy, Error, HashAlgorithm, Hasher, IndexSource, RunOptions,
    run,
};
use tempfile::{TempDir, tempdir};

fn config_in(cache_dir: &TempDir) -> Config {
    Config {
        cache_path: cache_dir.path().join("cache.json.zst"),
        workers: 2,
        ..Config::default()
    }
}

fn options(root: &Path) -> RunOptions {
    RunOptions {
        root: root.to_path_buf(),
        ..RunOptions::default()
    }
}

/// a/x.txt and a/y.txt share a folder; b/z.txt is the same content elsewhere.
fn three_copies(root: &Path) -> (PathBuf, PathBuf, PathBuf) {
    fs::create_dir_all(root.join("a")).unwrap();
    fs::create_dir_all(root.join("b")).unwrap();
    let x = root.join("a/x.txt");
    let y = root.join("a/y.txt");
    let z = root.join("b/z.txt");
    fs::write(&y, "A").unwrap();
    sleep(Duration::from_millis(50));
    fs::write(&x, "A").unwrap();
    sleep(Duration::from_millis(50));
    fs::write(&z, "A").unwrap();
    (x, y, z)
}

#[test]
fn deletes_newer_copy_within_folder_only() {
    let tree = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    let (x, y, z) = three_copies(tree.path());

    let summary = run(
        &config_in(&cache_dir),
        &RunOptions {
            delete: true,
            ..options(tree.path())
        },
    )
    .unwrap();

    assert_eq!(summary.source, IndexSource::Scanned);
    assert_eq!(summary.index.len(), 1);
    assert_eq!(summary.index.file_count(), 3);

    let report = summary.resolve.unwrap();
    assert_eq!(report.groups_acted_on, 1);
    assert_eq!(report.deleted, vec![x.clone()]);
    assert!(!x.exists());
    assert!(y.exists());
    assert!(z.exists());
}

#[test]
fn without_delete_nothing_is_removed_but_cache_is_written() {
    let tree = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    let (x, y, _) = three_copies(tree.path());
    let config = config_in(&cache_dir);

    let summary = run(&config, &options(tree.path())).unwrap();

    assert!(summary.resolve.is_none());
    assert!(x.exists() && y.exists());
    let snapshot = CacheStore::new(&config.cache_path).load().unwrap().unwrap();
    assert_eq!(snapshot.index, summary.index);
    assert_eq!(snapshot.root, tree.path());
}

#[test]
fn cached_run_drops_externally_deleted_files() {
    let tree = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    let (x, y, z) = three_copies(tree.path());
    let config = config_in(&cache_dir);
    run(&config, &options(tree.path())).unwrap();

    fs::remove_file(&y).unwrap();
    let summary = run(
        &config,
        &RunOptions {
            use_cache: true,
            delete: true,
            ..options(tree.path())
        },
    )
    .unwrap();

    assert_eq!(summary.source, IndexSource::ValidatedCache);
    assert_eq!(summary.stale_paths, 1);
    assert!(!summary.index.contains_path(&y));
    // Only one copy is left in a/, so nothing is deleted.
    assert_eq!(summary.resolve.unwrap().groups_acted_on, 0);
    assert!(x.exists() && z.exists());
}

#[test]
fn edited_file_is_never_deleted_from_stale_cache() {
    let tree = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    let (x, y, _) = three_copies(tree.path());
    let config = config_in(&cache_dir);
    run(&config, &options(tree.path())).unwrap();

    fs::write(&x, "edited after caching").unwrap();
    let summary = run(
        &config,
        &RunOptions {
            use_cache: true,
            delete: true,
            ..options(tree.path())
        },
    )
    .unwrap();

    assert_eq!(summary.resolve.unwrap().groups_acted_on, 0);
    assert_eq!(fs::read_to_string(&x).unwrap(), "edited after caching");
    assert!(y.exists());
}

#[test]
fn missing_cache_falls_back_to_scan() {
    let tree = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    three_copies(tree.path());

    let summary = run(
        &config_in(&cache_dir),
        &RunOptions {
            use_cache: true,
            ..options(tree.path())
        },
    )
    .unwrap();
    assert_eq!(summary.source, IndexSource::Scanned);
}

#[test]
fn corrupt_cache_aborts_by_default() {
    let tree = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    let (x, _, _) = three_copies(tree.path());
    let config = config_in(&cache_dir);
    fs::write(&config.cache_path, b"\x28\xb5\x2f\xfd garbage").unwrap();

    let result = run(
        &config,
        &RunOptions {
            use_cache: true,
            delete: true,
            ..options(tree.path())
        },
    );
    assert!(matches!(result, Err(Error::CorruptCache { .. })));
    assert!(x.exists());
}

#[test]
fn corrupt_cache_can_be_rebuilt() {
    let tree = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    three_copies(tree.path());
    let config = config_in(&cache_dir);
    fs::write(&config.cache_path, b"not a cache").unwrap();

    let summary = run(
        &config,
        &RunOptions {
            use_cache: true,
            on_corrupt_cache: CorruptCachePolicy::Rebuild,
            ..options(tree.path())
        },
    )
    .unwrap();
    assert_eq!(summary.source, IndexSource::Scanned);
    assert!(CacheStore::new(&config.cache_path).load().unwrap().is_some());
}

#[test]
fn cache_for_another_root_or_algorithm_is_ignored() {
    let tree = tempdir().unwrap();
    let other = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    three_copies(tree.path());
    let config = config_in(&cache_dir);

    run(&config, &options(other.path())).unwrap();
    let summary = run(
        &config,
        &RunOptions {
            use_cache: true,
            ..options(tree.path())
        },
    )
    .unwrap();
    assert_eq!(summary.source, IndexSource::Scanned);
    assert_eq!(summary.index.file_count(), 3);

    let blake = Config {
        algorithm: HashAlgorithm::Blake3,
        ..config.clone()
    };
    let summary = run(
        &blake,
        &RunOptions {
            use_cache: true,
            ..options(tree.path())
        },
    )
    .unwrap();
    assert_eq!(summary.source, IndexSource::Scanned);
    let hasher = Hasher::new(HashAlgorithm::Blake3, 1024);
    let digest = hasher.hash_file(&tree.path().join("b/z.txt")).unwrap();
    assert!(summary.index.get(&digest).is_some());
}

#[test]
fn rerunning_after_delete_converges() {
    let tree = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    three_copies(tree.path());
    fs::write(tree.path().join("a/w.txt"), "W").unwrap();
    let config = config_in(&cache_dir);
    let delete = RunOptions {
        delete: true,
        ..options(tree.path())
    };

    let first = run(&config, &delete).unwrap();
    assert_eq!(first.resolve.unwrap().deleted.len(), 1);

    let second = run(&config, &delete).unwrap();
    let report = second.resolve.unwrap();
    assert_eq!(report.groups_acted_on, 0);
    assert!(report.deleted.is_empty());
    assert_eq!(second.index.file_count(), 3);
}

#[cfg(unix)]
#[test]
fn followed_symlink_never_costs_the_target() {
    let tree = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    let target = tree.path().join("b_target.txt");
    let link = tree.path().join("a_link.txt");
    fs::write(&target, "precious").unwrap();
    std::os::unix::fs::symlink(&target, &link).unwrap();
    let config = Config {
        follow_symlinks: true,
        ..config_in(&cache_dir)
    };

    let summary = run(
        &config,
        &RunOptions {
            delete: true,
            ..options(tree.path())
        },
    )
    .unwrap();

    let report = summary.resolve.unwrap();
    assert!(report.deleted.is_empty());
    assert_eq!(report.groups_acted_on, 0);
    assert_eq!(fs::read_to_string(&target).unwrap(), "precious");
    assert_eq!(fs::read_to_string(&link).unwrap(), "precious");
}
