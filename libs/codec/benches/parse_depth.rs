//! Parse throughput by requested depth
//!
//! Shallow checks (header, delivery annotations) should stay cheap no matter
//! how large the body is; only a full check walks the whole message.

use codec::{ParseState, SectionComposer};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use types::{BufferChain, Depth, Section, DEFAULT_BUFFER_CAPACITY};

fn build_message(body_len: usize) -> BufferChain {
    let body = vec![0xAB; body_len];
    SectionComposer::new()
        .start_section(Section::Header)
        .start_list()
        .insert_bool(true)
        .end_list()
        .start_section(Section::DeliveryAnnotations)
        .start_map()
        .insert_symbol("x-trace")
        .insert_string("router-a")
        .end_map()
        .start_section(Section::Properties)
        .start_list()
        .insert_null()
        .insert_null()
        .insert_string("queue/benchmark")
        .end_list()
        .start_section(Section::BodyData)
        .insert_binary(&body)
        .build(DEFAULT_BUFFER_CAPACITY)
        .expect("benchmark message should compose")
}

fn bench_check_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("check_depth");

    for body_len in [64usize, 4096, 65536] {
        let chain = build_message(body_len);
        for depth in [Depth::DeliveryAnnotations, Depth::Properties, Depth::All] {
            group.bench_with_input(
                BenchmarkId::new(format!("{depth:?}"), body_len),
                &chain,
                |b, chain| {
                    b.iter(|| {
                        let mut state = ParseState::new();
                        let status = state.check(black_box(chain), true, depth);
                        black_box(status)
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_property_lookup(c: &mut Criterion) {
    let chain = build_message(256);

    c.bench_function("resolve_to_field", |b| {
        b.iter(|| {
            let mut state = ParseState::new();
            let _ = state.check(&chain, true, Depth::Properties);
            black_box(state.property(&chain, types::PropertyField::To))
        });
    });
}

criterion_group!(benches, bench_check_depth, bench_property_lookup);
criterion_main!(benches);
