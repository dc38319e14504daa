//! # Frame Decoder Benchmark
//!
//! Run with: `cargo bench --package turnpilot_networking`

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use turnpilot_networking::{encode_inbound_frame, FrameDecoder};

/// A stream of `count` frames of typical position-update size.
fn stream_of(count: usize) -> Vec<u8> {
    let payload = vec![0xA5u8; 120];
    (0..count)
        .flat_map(|_| encode_inbound_frame(&payload).unwrap_or_default())
        .collect()
}

/// Whole stream pushed at once.
fn bench_single_chunk(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_single_chunk");

    for count in [1, 64, 1024] {
        let stream = stream_of(count);
        group.throughput(Throughput::Bytes(stream.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &stream, |b, stream| {
            b.iter(|| {
                let mut decoder = FrameDecoder::new();
                decoder.push(black_box(stream));
                black_box(decoder.frames().count())
            });
        });
    }

    group.finish();
}

/// Stream delivered in socket-sized reads that split frames.
fn bench_socket_reads(c: &mut Criterion) {
    let stream = stream_of(1024);

    c.bench_function("decode_512_byte_reads", |b| {
        b.iter(|| {
            let mut decoder = FrameDecoder::new();
            let mut frames = 0;
            for chunk in stream.chunks(512) {
                decoder.push(black_box(chunk));
                frames += decoder.frames().count();
            }
            black_box(frames)
        });
    });
}

criterion_group!(benches, bench_single_chunk, bench_socket_reads);
criterion_main!(benches);
