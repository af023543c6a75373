//! Empty-tree runs that mirror the bucket down

use std::sync::atomic::Ordering;

use capysync_core::domain::run::RunState;
use tempfile::TempDir;

use crate::common::{self, keys, write_file, MemoryObjectStore};

#[tokio::test]
async fn test_empty_root_downloads_everything() {
    let dir = TempDir::new().unwrap();
    let store = MemoryObjectStore::new();
    store.insert("top.txt", b"top");
    store.insert("a/b/deep.txt", b"deep");

    let report = common::engine(&store, common::run_config(dir.path()))
        .run(None)
        .await
        .unwrap();

    assert!(report.bootstrap);
    assert_eq!(report.state, RunState::Completed);
    assert_eq!(keys(&report.downloaded), vec!["a/b/deep.txt", "top.txt"]);
    assert!(report.uploaded.is_empty());
    assert!(report.deleted.is_empty());

    assert_eq!(std::fs::read(dir.path().join("top.txt")).unwrap(), b"top");
    assert_eq!(
        std::fs::read(dir.path().join("a/b/deep.txt")).unwrap(),
        b"deep"
    );
    assert_eq!(store.deletes.load(Ordering::SeqCst), 0);
    assert_eq!(store.puts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_bootstrap_then_walk_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let store = MemoryObjectStore::new();
    store.insert("one.txt", b"1");
    store.insert("two/three.txt", b"3");

    let engine = common::engine(&store, common::run_config(dir.path()));
    engine.run(None).await.unwrap();

    let second = engine.run(None).await.unwrap();
    assert!(!second.bootstrap);
    assert_eq!(second.transfer_count(), 0);
    assert_eq!(keys(&second.skipped), vec!["one.txt", "two/three.txt"]);
}

#[tokio::test]
async fn test_bootstrap_skips_ignored_keys_and_placeholders() {
    let dir = TempDir::new().unwrap();
    let store = MemoryObjectStore::new();
    store.insert("keep.txt", b"k");
    store.insert(".env", b"secret");
    store.insert("conf/.token", b"t");
    store.insert_raw("folder/", b"", None);

    let config = common::run_config(dir.path()).with_ignore_dotfiles(true);
    let report = common::engine(&store, config).run(None).await.unwrap();

    assert_eq!(keys(&report.downloaded), vec!["keep.txt"]);
    assert!(!dir.path().join(".env").exists());
    assert!(!dir.path().join("conf/.token").exists());
    assert!(!dir.path().join("folder").exists());
    assert_eq!(store.keys().len(), 4);
}

#[tokio::test]
async fn test_tree_with_only_ignored_files_bootstraps() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), ".DS_Store", b"junk");

    let store = MemoryObjectStore::new();
    store.insert("remote.txt", b"r");

    let config = common::run_config(dir.path()).with_ignore_dotfiles(true);
    let report = common::engine(&store, config).run(None).await.unwrap();

    assert!(report.bootstrap);
    assert_eq!(keys(&report.downloaded), vec!["remote.txt"]);
    assert!(dir.path().join(".DS_Store").exists());
}

#[tokio::test]
async fn test_empty_root_and_empty_bucket() {
    let dir = TempDir::new().unwrap();
    let store = MemoryObjectStore::new();

    let report = common::engine(&store, common::run_config(dir.path()))
        .run(None)
        .await
        .unwrap();

    assert!(report.bootstrap);
    assert_eq!(report.transfer_count(), 0);
    assert_eq!(report.state, RunState::Completed);
}

#[tokio::test]
async fn test_dry_run_bootstrap_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let store = MemoryObjectStore::new();
    store.insert("file.txt", b"f");

    let config = common::run_config(dir.path()).with_dry_run(true);
    let report = common::engine(&store, config).run(None).await.unwrap();

    assert_eq!(keys(&report.downloaded), vec!["file.txt"]);
    assert_eq!(store.gets.load(Ordering::SeqCst), 0);
    assert!(!dir.path().join("file.txt").exists());
}
