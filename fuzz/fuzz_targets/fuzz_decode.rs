#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use odb::core::packet::{DecodeStatus, Packet};
use odb::PacketCodec;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // Fuzz packet parsing - test for panics, crashes, infinite loops
    let _ = Packet::from_bytes(data);
    if let Ok(DecodeStatus::Complete { consumed, .. }) = Packet::decode(data, 1 << 20) {
        assert!(consumed <= data.len());
    }

    // the streaming decoder must terminate on arbitrary input
    let mut codec = PacketCodec::new(1 << 20);
    let mut buf = BytesMut::from(data);
    while let Ok(Some(_)) = codec.decode(&mut buf) {}
});
