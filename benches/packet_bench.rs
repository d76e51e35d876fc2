use bytes::BytesMut;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use odb::core::codec::PacketCodec;
use odb::core::packet::{Datatype, Operation, Packet};
use odb::storage::{BucketStore, MemoryStore};
use tokio_util::codec::{Decoder, Encoder};

#[allow(clippy::unwrap_used)]
fn bench_packet_encode_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("packet_encode_decode");
    let payload_sizes = [64usize, 512, 4096, 65536, 1024 * 1024];

    for &size in &payload_sizes {
        let packet = Packet::new(Operation::Store, Datatype::Bytes, vec![0u8; size]).unwrap();
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("encode_{size}b"), |b| {
            b.iter_batched(
                || packet.clone(),
                |p| {
                    let mut buf = BytesMut::with_capacity(size + 32);
                    let mut codec = PacketCodec::default();
                    codec.encode(p, &mut buf).unwrap();
                },
                BatchSize::SmallInput,
            )
        });
        group.bench_function(format!("decode_{size}b"), |b| {
            let mut wire = BytesMut::new();
            PacketCodec::default()
                .encode(packet.clone(), &mut wire)
                .unwrap();
            b.iter_batched(
                || wire.clone(),
                |mut buf| {
                    let decoded = PacketCodec::default().decode(&mut buf).unwrap();
                    assert!(decoded.is_some());
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

#[allow(clippy::unwrap_used)]
fn bench_store_put_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_put_get");
    let keys: Vec<String> = (0..1_000).map(|i| format!("key{i}")).collect();

    group.bench_function("put_1000", |b| {
        b.iter_batched(
            MemoryStore::new,
            |mut store| {
                for key in &keys {
                    store.put(key.as_bytes(), Datatype::Bytes, b"value").unwrap();
                }
            },
            BatchSize::SmallInput,
        )
    });

    let mut store = MemoryStore::new();
    for key in &keys {
        store.put(key.as_bytes(), Datatype::Bytes, b"value").unwrap();
    }
    group.bench_function("get_1000", |b| {
        b.iter(|| {
            for key in &keys {
                assert!(store.get(key.as_bytes()).is_ok());
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_packet_encode_decode, bench_store_put_get);
criterion_main!(benches);
