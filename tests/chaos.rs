//! Chaos tests
//!
//! Misbehaving clients (silent, stalled mid-packet, vanishing, never reading)
//! must never hold up anyone else being served by the same daemon.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use std::time::Duration;

use common::{drum_root, test_config, TestDaemon};
use odb::core::packet::{encode, Datatype, Operation, Packet};
use odb::core::serialization::{encode_body, QueryBody};
use odb::service::Client;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;

/// A healthy client must still get answers promptly
async fn assert_responsive(client: &mut Client) {
    timeout(Duration::from_secs(2), client.nop())
        .await
        .expect("daemon stalled")
        .unwrap();
}

#[tokio::test]
async fn test_silent_client_does_not_block_others() {
    let root = drum_root(&["users"]);
    let daemon = TestDaemon::start(test_config(root.path())).await;

    let _silent = daemon.raw().await;
    let mut healthy = daemon.client().await;
    for _ in 0..20 {
        assert_responsive(&mut healthy).await;
    }

    daemon.stop().await.unwrap();
}

#[tokio::test]
async fn test_half_packet_client_does_not_block_others() {
    let root = drum_root(&["users"]);
    let daemon = TestDaemon::start(test_config(root.path())).await;

    let bytes = encode(Operation::Nop, Datatype::None, &[0u8; 8]).unwrap();
    let mut stalled = daemon.raw().await;
    stalled.write_all(&bytes[..10]).await.unwrap();

    let mut healthy = daemon.client().await;
    assert_responsive(&mut healthy).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_responsive(&mut healthy).await;

    // the stalled client's partial packet was kept and completes later
    stalled.write_all(&bytes[10..]).await.unwrap();
    let mut stalled = Client::from_framed(tokio_util::codec::Framed::new(
        stalled,
        odb::PacketCodec::default(),
    ));
    let reply = stalled.receive().await.unwrap();
    assert_eq!(reply, Packet::empty(Operation::Nop, Datatype::None));

    daemon.stop().await.unwrap();
}

#[tokio::test]
async fn test_client_vanishing_mid_packet_frees_its_slot() {
    let root = drum_root(&["users"]);
    let daemon = TestDaemon::start(test_config(root.path())).await;

    {
        let mut vanishing = daemon.raw().await;
        vanishing.write_all(&[1, 0, 0, 0, 1]).await.unwrap();
    }

    daemon
        .wait_until(|m| m.connections_accepted == 1 && m.connections_active == 0)
        .await;
    assert_eq!(daemon.snapshot().protocol_errors, 0);

    let mut healthy = daemon.client().await;
    assert_responsive(&mut healthy).await;
    daemon.stop().await.unwrap();
}

#[tokio::test]
async fn test_client_that_never_reads_is_dropped() {
    let root = drum_root(&["big"]);
    let daemon = TestDaemon::start(test_config(root.path())).await;

    let mut healthy = daemon.client().await;
    healthy
        .store("big", b"blob", Datatype::Bytes, &vec![7u8; 1024 * 1024])
        .await
        .unwrap();

    let query = encode_body(&QueryBody {
        drum: "big".into(),
        key: b"blob".to_vec(),
    })
    .unwrap();
    let request = encode(Operation::Query, Datatype::None, &query).unwrap();

    let mut greedy = daemon.raw().await;
    for _ in 0..200 {
        if greedy.write_all(&request).await.is_err() {
            break;
        }
    }

    assert_responsive(&mut healthy).await;
    daemon
        .wait_until(|m| m.connection_errors >= 1 && m.connections_active == 1)
        .await;
    assert_responsive(&mut healthy).await;

    daemon.stop().await.unwrap();
}

#[tokio::test]
async fn test_idle_client_is_dropped_after_write_timeout() {
    let root = drum_root(&["big"]);
    let daemon = TestDaemon::start(test_config(root.path())).await;

    let mut healthy = daemon.client().await;
    healthy
        .store("big", b"blob", Datatype::Bytes, &vec![3u8; 4 * 1024 * 1024])
        .await
        .unwrap();

    let query = encode_body(&QueryBody {
        drum: "big".into(),
        key: b"blob".to_vec(),
    })
    .unwrap();
    let request = encode(Operation::Query, Datatype::None, &query).unwrap();

    // a handful of requests, far below the reply queue limit, then silence
    let mut stalled = daemon.raw().await;
    for _ in 0..4 {
        stalled.write_all(&request).await.unwrap();
    }

    // write_timeout is 1s in the test config
    daemon
        .wait_until(|m| m.connection_errors >= 1 && m.connections_active == 1)
        .await;
    assert_eq!(daemon.snapshot().connections_rejected, 0);
    assert_responsive(&mut healthy).await;

    // the released slot is usable again
    let mut next = daemon.client().await;
    assert_responsive(&mut next).await;

    drop(stalled);
    daemon.stop().await.unwrap();
}

#[tokio::test]
async fn test_connection_churn() {
    let root = drum_root(&["users"]);
    let daemon = TestDaemon::start(test_config(root.path())).await;

    for round in 0..50u8 {
        let mut client = daemon.client().await;
        client
            .store("users", b"churn", Datatype::Bytes, &[round])
            .await
            .unwrap();
    }

    daemon
        .wait_until(|m| m.connections_accepted == 50 && m.connections_active == 0)
        .await;
    let (_, value) = daemon.client().await.query("users", b"churn").await.unwrap();
    assert_eq!(&value[..], &[49]);

    daemon.stop().await.unwrap();
}
