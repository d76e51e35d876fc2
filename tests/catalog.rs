//! Drum discovery and snapshot persistence across daemon restarts.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use common::{drum_root, test_config, TestDaemon};
use odb::core::packet::Datatype;
use odb::error::{OdbError, StorageError};
use odb::storage::{BucketStore, Catalog, MemoryStore};

#[tokio::test]
async fn test_persisted_buckets_survive_restart() {
    let root = drum_root(&["users", "logs"]);
    let mut config = test_config(root.path());
    config.storage.persist = true;

    let daemon = TestDaemon::start(config.clone()).await;
    let mut client = daemon.client().await;
    client
        .store("users", b"user1", Datatype::Text, b"alice")
        .await
        .unwrap();
    client
        .store("users", b"user1", Datatype::Text, b"bob")
        .await
        .unwrap();
    client
        .store("logs", b"boot", Datatype::Bytes, &[1, 2, 3])
        .await
        .unwrap();
    drop(client);
    daemon.stop().await.unwrap();

    assert!(root.path().join("users").join("drum.odb").is_file());
    assert!(root.path().join("logs").join("drum.odb").is_file());

    let daemon = TestDaemon::start(config).await;
    let mut client = daemon.client().await;
    let (datatype, value) = client.query("users", b"user1").await.unwrap();
    assert_eq!(datatype, Datatype::Text);
    assert_eq!(&value[..], b"bob");
    let (datatype, value) = client.query("logs", b"boot").await.unwrap();
    assert_eq!(datatype, Datatype::Bytes);
    assert_eq!(&value[..], &[1, 2, 3]);
    daemon.stop().await.unwrap();
}

#[tokio::test]
async fn test_memory_only_forgets_on_restart() {
    let root = drum_root(&["users"]);
    let config = test_config(root.path());

    let daemon = TestDaemon::start(config.clone()).await;
    daemon
        .client()
        .await
        .store("users", b"k", Datatype::Text, b"v")
        .await
        .unwrap();
    daemon.stop().await.unwrap();
    assert!(!root.path().join("users").join("drum.odb").exists());

    let daemon = TestDaemon::start(config).await;
    let missing = daemon.client().await.query("users", b"k").await;
    assert!(matches!(missing, Err(OdbError::Storage(StorageError::NotFound))));
    daemon.stop().await.unwrap();
}

#[test]
fn test_truncated_snapshot_is_a_load_error() {
    let root = drum_root(&["users"]);

    let mut store = MemoryStore::new();
    store.put(b"k", Datatype::Text, b"value").unwrap();
    let mut bytes = Vec::new();
    store.write_snapshot(&mut bytes).unwrap();
    bytes.truncate(bytes.len() - 2);
    std::fs::write(root.path().join("users").join("drum.odb"), &bytes).unwrap();

    let mut catalog = Catalog::open(root.path()).unwrap();
    assert!(catalog.load_snapshots("drum.odb").is_err());
}

#[test]
fn test_nested_directories_are_not_drums() {
    let root = drum_root(&["users", "users/archive", ".cache"]);
    std::fs::write(root.path().join("notes.txt"), b"not a drum").unwrap();

    let catalog = Catalog::open(root.path()).unwrap();
    assert_eq!(catalog.len(), 1);
    assert!(catalog.get("users").is_ok());
    assert_eq!(
        catalog.get("archive").unwrap_err(),
        StorageError::UnknownDrum("archive".into())
    );
}
