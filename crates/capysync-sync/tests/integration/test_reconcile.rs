//! Walk-and-upload runs: diffing, convergence, ignore rules, concurrency

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use capysync_core::domain::run::RunState;
use capysync_core::ports::progress::RunOutcome;
use tempfile::TempDir;

use crate::common::{self, keys, write_file, MemoryObjectStore, RecordingObserver};

// ============================================================================
// Diff correctness
// ============================================================================

#[tokio::test]
async fn test_new_changed_same_and_remote_only() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a", b"brand new");
    write_file(dir.path(), "b", b"edited locally");
    write_file(dir.path(), "c", b"unchanged");

    let store = MemoryObjectStore::new();
    store.insert("b", b"old remote content");
    store.insert("c", b"unchanged");
    store.insert("d", b"deleted locally");

    let report = common::engine(&store, common::run_config(dir.path()))
        .run(None)
        .await
        .expect("run succeeds");

    assert_eq!(report.state, RunState::Completed);
    assert!(!report.bootstrap);
    assert_eq!(keys(&report.uploaded), vec!["a", "b"]);
    assert_eq!(keys(&report.skipped), vec!["c"]);
    assert_eq!(keys(&report.deleted), vec!["d"]);
    assert!(report.downloaded.is_empty());

    assert_eq!(store.keys(), vec!["a", "b", "c"]);
    assert_eq!(store.get("b").unwrap().data, b"edited locally");
    assert_eq!(store.puts.load(Ordering::SeqCst), 2);
    assert_eq!(store.deletes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_uploads_carry_content_digest() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "hello.txt", b"hello");

    let store = MemoryObjectStore::new();
    common::engine(&store, common::run_config(dir.path()))
        .run(None)
        .await
        .unwrap();

    let stored = store.get("hello.txt").unwrap();
    assert_eq!(
        stored.hash.unwrap().as_str(),
        "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
    );
}

#[tokio::test]
async fn test_object_without_digest_is_reuploaded() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "legacy.txt", b"same bytes");

    let store = MemoryObjectStore::new();
    store.insert_raw("legacy.txt", b"same bytes", None);

    let report = common::engine(&store, common::run_config(dir.path()))
        .run(None)
        .await
        .unwrap();

    assert_eq!(keys(&report.uploaded), vec!["legacy.txt"]);
    assert!(store.get("legacy.txt").unwrap().hash.is_some());
}

#[tokio::test]
async fn test_nested_paths_use_slash_keys() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "photos/2024/beach.jpg", b"jpg");
    write_file(dir.path(), "notes.md", b"md");
    std::fs::create_dir_all(dir.path().join("empty/dir")).unwrap();

    let store = MemoryObjectStore::new();
    let report = common::engine(&store, common::run_config(dir.path()))
        .run(None)
        .await
        .unwrap();

    assert_eq!(keys(&report.uploaded), vec!["notes.md", "photos/2024/beach.jpg"]);
    assert_eq!(store.keys(), vec!["notes.md", "photos/2024/beach.jpg"]);
}

// ============================================================================
// Convergence and idempotence
// ============================================================================

#[tokio::test]
async fn test_second_run_transfers_nothing() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "x.txt", b"x");
    write_file(dir.path(), "sub/y.txt", b"y");

    let store = MemoryObjectStore::new();
    store.insert("stale.txt", b"stale");
    let engine = common::engine(&store, common::run_config(dir.path()));

    engine.run(None).await.unwrap();
    assert_eq!(store.keys(), vec!["sub/y.txt", "x.txt"]);
    for key in store.keys() {
        let local = std::fs::read(dir.path().join(&key)).unwrap();
        assert_eq!(store.get(&key).unwrap().data, local);
    }

    let transfers_before = store.transfers();
    let second = engine.run(None).await.unwrap();

    assert_eq!(second.transfer_count(), 0);
    assert_eq!(keys(&second.skipped), vec!["sub/y.txt", "x.txt"]);
    assert_eq!(store.transfers(), transfers_before);
}

#[tokio::test]
async fn test_root_override_takes_precedence() {
    let configured = TempDir::new().unwrap();
    let overridden = TempDir::new().unwrap();
    write_file(configured.path(), "from-config.txt", b"c");
    write_file(overridden.path(), "from-override.txt", b"o");

    let store = MemoryObjectStore::new();
    let report = common::engine(&store, common::run_config(configured.path()))
        .run(Some(overridden.path()))
        .await
        .unwrap();

    assert_eq!(keys(&report.uploaded), vec!["from-override.txt"]);
}

// ============================================================================
// Ignore filter
// ============================================================================

#[tokio::test]
async fn test_ignore_mode_skips_local_and_keeps_remote_dotfiles() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), ".hidden", b"local secret");
    write_file(dir.path(), "visible.txt", b"v");

    let store = MemoryObjectStore::new();
    store.insert(".remote-only-hidden", b"r");
    store.insert("docs/.draft", b"d");

    let config = common::run_config(dir.path()).with_ignore_dotfiles(true);
    let report = common::engine(&store, config).run(None).await.unwrap();

    assert_eq!(keys(&report.uploaded), vec!["visible.txt"]);
    assert!(report.deleted.is_empty());
    assert!(store.get(".hidden").is_none());
    assert!(store.get(".remote-only-hidden").is_some());
    assert!(store.get("docs/.draft").is_some());
}

#[tokio::test]
async fn test_dotfiles_synced_when_ignore_mode_off() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), ".hidden", b"h");

    let store = MemoryObjectStore::new();
    store.insert(".stale", b"s");

    let report = common::engine(&store, common::run_config(dir.path()))
        .run(None)
        .await
        .unwrap();

    assert_eq!(keys(&report.uploaded), vec![".hidden"]);
    assert_eq!(keys(&report.deleted), vec![".stale"]);
}

#[tokio::test]
async fn test_directory_placeholders_are_not_deleted() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a.txt", b"a");

    let store = MemoryObjectStore::new();
    store.insert_raw("folder/", b"", None);

    let report = common::engine(&store, common::run_config(dir.path()))
        .run(None)
        .await
        .unwrap();

    assert!(report.deleted.is_empty());
    assert!(store.get("folder/").is_some());
}

// ============================================================================
// Dry run
// ============================================================================

#[tokio::test]
async fn test_dry_run_reports_without_transferring() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "new.txt", b"n");

    let store = MemoryObjectStore::new();
    store.insert("gone.txt", b"g");

    let config = common::run_config(dir.path()).with_dry_run(true);
    let report = common::engine(&store, config).run(None).await.unwrap();

    assert!(report.dry_run);
    assert_eq!(keys(&report.uploaded), vec!["new.txt"]);
    assert_eq!(keys(&report.deleted), vec!["gone.txt"]);
    assert_eq!(store.transfers(), 0);
    assert_eq!(store.keys(), vec!["gone.txt"]);
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test]
async fn test_single_transfer_limit_is_sequential() {
    let dir = TempDir::new().unwrap();
    for i in 0..6 {
        write_file(dir.path(), &format!("f{i}.txt"), format!("{i}").as_bytes());
    }

    let store = MemoryObjectStore::new();
    store.set_put_delay(Duration::from_millis(5));

    let config = common::run_config(dir.path()).with_max_concurrent_transfers(1);
    common::engine(&store, config).run(None).await.unwrap();

    assert_eq!(store.puts.load(Ordering::SeqCst), 6);
    assert_eq!(store.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_transfers_bounded_by_limit() {
    let dir = TempDir::new().unwrap();
    for i in 0..24 {
        write_file(dir.path(), &format!("d{}/f{i:02}.bin", i % 4), &[i as u8; 128]);
    }

    let store = MemoryObjectStore::new();
    store.set_put_delay(Duration::from_millis(10));

    let config = common::run_config(dir.path()).with_max_concurrent_transfers(3);
    let report = common::engine(&store, config).run(None).await.unwrap();

    assert_eq!(report.uploaded.len(), 24);
    let max = store.max_in_flight.load(Ordering::SeqCst);
    assert!(max >= 1 && max <= 3, "max in flight was {max}");
}

#[tokio::test]
async fn test_oversized_limit_is_clamped() {
    let dir = TempDir::new().unwrap();
    for i in 0..4 {
        write_file(dir.path(), &format!("f{i}.bin"), &[i as u8; 16]);
    }

    let store = MemoryObjectStore::new();
    let config = common::run_config(dir.path()).with_max_concurrent_transfers(usize::MAX);
    let report = common::engine(&store, config).run(None).await.unwrap();

    assert_eq!(report.uploaded.len(), 4);
}

// ============================================================================
// Progress observer
// ============================================================================

#[tokio::test]
async fn test_observer_notified_once_on_success() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a", b"a");

    let store = MemoryObjectStore::new();
    let observer = Arc::new(RecordingObserver::default());

    common::engine(&store, common::run_config(dir.path()))
        .with_observer(observer.clone())
        .run(None)
        .await
        .unwrap();

    assert_eq!(observer.starts.load(Ordering::SeqCst), 1);
    assert_eq!(observer.stops.load(Ordering::SeqCst), 1);
    assert_eq!(*observer.outcomes.lock().unwrap(), vec![RunOutcome::Completed]);
}
