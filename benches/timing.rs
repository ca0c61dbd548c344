//! Symmetric-path benchmarks: streaming cipher throughput and header codec.
//!
//! Run with: `cargo bench --bench timing`
//!
//! Everything here is local CPU work; session setup against the service is
//! network-bound and not benchmarked.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use palisade_client::algorithm;
use palisade_client::gcm::GcmStream;
use palisade_client::header;

const PAYLOAD_SIZES: &[usize] = &[64, 1024, 65_536, 1_048_576];

fn bench_stream_encrypt(c: &mut Criterion) {
    let key = [0x42u8; 32];
    let iv = [0x24u8; 12];

    let mut group = c.benchmark_group("stream_encrypt");
    for &size in PAYLOAD_SIZES {
        let payload = vec![0xA5u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            b.iter(|| {
                let mut ctx = GcmStream::new(&key, &iv).unwrap();
                let ct = ctx.encrypt(payload);
                (ct, ctx.finish())
            });
        });
    }
    group.finish();
}

fn bench_stream_decrypt(c: &mut Criterion) {
    let key = [0x42u8; 32];
    let iv = [0x24u8; 12];

    let mut group = c.benchmark_group("stream_decrypt");
    for &size in PAYLOAD_SIZES {
        let payload = vec![0xA5u8; size];
        let mut ctx = GcmStream::new(&key, &iv).unwrap();
        let ct = ctx.encrypt(&payload);
        let tag = ctx.finish();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &ct, |b, ct| {
            b.iter(|| {
                let mut ctx = GcmStream::new(&key, &iv).unwrap();
                let pt = ctx.decrypt(ct);
                ctx.verify(&tag).unwrap();
                pt
            });
        });
    }
    group.finish();
}

fn bench_header_codec(c: &mut Criterion) {
    let algo = algorithm::by_id(0).unwrap();
    let iv = [7u8; 12];
    let wrapped = vec![0x3Cu8; 256];
    let encoded = header::encode(algo, &iv, &wrapped).unwrap();

    c.bench_function("header_encode", |b| {
        b.iter(|| header::encode(algo, &iv, &wrapped).unwrap());
    });
    c.bench_function("header_decode", |b| {
        b.iter(|| header::decode(&encoded).unwrap().unwrap().1);
    });
}

criterion_group!(
    benches,
    bench_stream_encrypt,
    bench_stream_decrypt,
    bench_header_codec
);
criterion_main!(benches);
