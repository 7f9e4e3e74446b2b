//! Codec benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use osckit_core::{format_bundle, format_message, read_packet, OscValue, PatternCache};

fn sample_values() -> Vec<OscValue> {
    vec![
        OscValue::Int(1000),
        OscValue::Int(-1),
        OscValue::string("hello"),
        OscValue::Float(1.234),
        OscValue::Float(5.678),
    ]
}

fn encode_benchmark(c: &mut Criterion) {
    let values = sample_values();

    c.bench_function("format_message", |b| {
        b.iter(|| black_box(format_message(b"/foo", &values, None).unwrap()))
    });
}

fn decode_benchmark(c: &mut Criterion) {
    let (encoded, _) = format_message(b"/foo", &sample_values(), None).unwrap();

    c.bench_function("read_packet_message", |b| {
        b.iter(|| black_box(read_packet(&encoded, false, None).unwrap()))
    });
}

fn bundle_benchmark(c: &mut Criterion) {
    let messages: Vec<(&str, Vec<OscValue>)> =
        (0..16).map(|_| ("/synth/1/freq", sample_values())).collect();
    let (encoded, _) = format_bundle(&messages, None, None).unwrap();

    c.bench_function("read_packet_bundle_16", |b| {
        b.iter(|| black_box(read_packet(&encoded, false, None).unwrap()))
    });
}

fn pattern_benchmark(c: &mut Criterion) {
    let cache = PatternCache::new();
    let pattern = cache.compile(b"/synth/[0-9]/{freq,gain}").unwrap();

    c.bench_function("pattern_match", |b| {
        b.iter(|| black_box(pattern.matches(b"/synth/4/gain")))
    });
}

criterion_group!(
    benches,
    encode_benchmark,
    decode_benchmark,
    bundle_benchmark,
    pattern_benchmark
);
criterion_main!(benches);
