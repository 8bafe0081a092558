//! Benchmarks for shared memory reads
//!
//! - Raw image decode
//! - Full reader path including the torn-read header check
//!
//! Platform: Cross-platform (in-memory region, CI-safe)

use aerofly_reader::test_utils::{sample_memory_image, sample_snapshot};
use aerofly_reader::{InMemoryRegion, MemoryLayout, SharedMemoryReader};
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;

fn bench_layout_decode(c: &mut Criterion) {
    let image = sample_memory_image(1);

    let mut group = c.benchmark_group("layout_decode");
    group.throughput(Throughput::Bytes(image.len() as u64));

    group.bench_function("decode", |b| {
        b.iter(|| black_box(MemoryLayout::decode(black_box(&image[..])).expect("valid image")))
    });

    group.finish();
}

fn bench_reader(c: &mut Criterion) {
    let region = Arc::new(InMemoryRegion::new());
    region.write_snapshot(&sample_snapshot(1)).expect("image fits");
    let mut reader = SharedMemoryReader::from_region(region);
    reader.connect().expect("region connects");

    let mut group = c.benchmark_group("shared_memory_reader");

    group.bench_function("read", |b| b.iter(|| black_box(reader.read().expect("stable image"))));
    group.bench_function("is_valid", |b| b.iter(|| black_box(reader.is_valid())));

    group.finish();
}

criterion_group!(benches, bench_layout_decode, bench_reader);
criterion_main!(benches);
