// test-only module included via protocol/mod.rs
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use crate::core::codec::PacketCodec;
use crate::core::packet::{Datatype, Operation, Packet};
use crate::core::serialization::{decode_body, encode_body, QueryBody, Status, StoreBody};
use crate::protocol::dispatcher::Dispatcher;
use crate::storage::catalog::Catalog;
use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

fn catalog_with(drums: &[&str]) -> (tempfile::TempDir, Catalog) {
    let root = tempfile::tempdir().unwrap();
    for drum in drums {
        std::fs::create_dir(root.path().join(drum)).unwrap();
    }
    let catalog = Catalog::open(root.path()).unwrap();
    (root, catalog)
}

fn wire(packets: Vec<Packet>) -> BytesMut {
    let mut codec = PacketCodec::default();
    let mut buf = BytesMut::new();
    for packet in packets {
        codec.encode(packet, &mut buf).unwrap();
    }
    buf
}

#[test]
fn coalesced_requests_are_answered_in_order() {
    // =================== Client side: three requests in one write ===================
    let store = StoreBody {
        drum: "users".into(),
        key: b"user1".to_vec(),
        value: b"42".to_vec(),
    };
    let query = QueryBody {
        drum: "users".into(),
        key: b"user1".to_vec(),
    };
    let mut inbound = wire(vec![
        Packet::new(Operation::Nop, Datatype::None, vec![0u8; 8]).unwrap(),
        Packet::new(Operation::Store, Datatype::Text, encode_body(&store).unwrap()).unwrap(),
        Packet::new(Operation::Query, Datatype::None, encode_body(&query).unwrap()).unwrap(),
    ]);

    // =================== Daemon side: decode and dispatch each ===================
    let (_root, mut catalog) = catalog_with(&["users"]);
    let dispatcher = Dispatcher::new();
    let mut codec = PacketCodec::default();
    let mut replies = Vec::new();
    while let Some(packet) = codec.decode(&mut inbound).unwrap() {
        replies.push(dispatcher.dispatch(&mut catalog, &packet));
    }
    assert!(inbound.is_empty());

    // =================== Replies match request order ===================
    let ops: Vec<_> = replies.iter().map(|r| r.op).collect();
    assert_eq!(ops, [Operation::Nop, Operation::Store, Operation::Query]);

    let status: Status = decode_body(&replies[1].payload).unwrap();
    assert_eq!(status, Status::Ok);
    assert_eq!(&replies[2].payload[..], b"42");
}

#[test]
fn create_then_store_overwrites() {
    let (_root, mut catalog) = catalog_with(&["users"]);
    let dispatcher = Dispatcher::new();

    let body = |value: &[u8]| StoreBody {
        drum: "users".into(),
        key: b"k".to_vec(),
        value: value.to_vec(),
    };
    let send = |catalog: &mut Catalog, op, value: &[u8]| {
        let packet = Packet::new(op, Datatype::Bytes, encode_body(&body(value)).unwrap()).unwrap();
        let reply = dispatcher.dispatch(catalog, &packet);
        decode_body::<Status>(&reply.payload).unwrap()
    };

    assert_eq!(send(&mut catalog, Operation::Create, b"one"), Status::Ok);
    assert!(matches!(
        send(&mut catalog, Operation::Create, b"two"),
        Status::Error { code: 5, .. }
    ));
    assert_eq!(send(&mut catalog, Operation::Store, b"three"), Status::Ok);

    let bucket = catalog.get("users").unwrap().store().get(b"k").unwrap();
    assert_eq!(&bucket.payload()[..], b"three");
}
