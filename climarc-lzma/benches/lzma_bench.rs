//! Decompression benchmarks for climarc-lzma
//!
//! Streams come from `tests/fixtures`, produced by liblzma, so the numbers
//! reflect real encoder output rather than a synthetic encoder.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use climarc_lzma::{HeaderLayout, decompress, read_properties};
use std::hint::black_box;

const FIXTURES: &[&str] = &[
    "hello.lzma",
    "noise_5000_d4096.lzma",
    "text_12000_d4096.lzma",
    "mixed_lc0_lp2_pb0.lzma",
    "mixed_lc1_lp3_pb4.lzma",
];

fn load(name: &str) -> Vec<u8> {
    let path = format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"));
    std::fs::read(path).expect("fixture")
}

fn bench_decompress(c: &mut Criterion) {
    let mut group = c.benchmark_group("lzma_decompress");

    for &name in FIXTURES {
        let stream = load(name);
        let decoded_len = decompress(&stream).expect("valid fixture").len();
        group.throughput(Throughput::Bytes(decoded_len as u64));

        group.bench_with_input(BenchmarkId::from_parameter(name), &stream, |b, stream| {
            b.iter(|| decompress(black_box(stream)).expect("valid fixture"))
        });
    }

    group.finish();
}

fn bench_known_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("lzma_known_size");

    let mut stream = load("text_12000_d4096.lzma");
    let size = decompress(&stream).expect("valid fixture").len() as u64;
    stream[5..13].copy_from_slice(&size.to_le_bytes());
    group.throughput(Throughput::Bytes(size));

    group.bench_function("text_12000", |b| {
        b.iter(|| decompress(black_box(&stream)).expect("valid fixture"))
    });

    group.finish();
}

fn bench_properties(c: &mut Criterion) {
    let stream = load("hello.lzma");
    c.bench_function("read_properties", |b| {
        b.iter(|| read_properties(black_box(&stream), HeaderLayout::Alone).expect("header"))
    });
}

criterion_group!(benches, bench_decompress, bench_known_size, bench_properties);
criterion_main!(benches);
