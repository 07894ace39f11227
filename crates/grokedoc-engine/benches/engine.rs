use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use grokedoc_engine::editing::resolver::resolve_buffer_offset;
use grokedoc_engine::editing::{Asset, Operation};
mod common;

fn bench_engine_edits(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_edits");
    group.sample_size(20);

    group.bench_function("insert_first_of_200_blocks", |b| {
        b.iter_batched(
            || {
                let engine = common::engine_with_blocks(200);
                let first = engine.tree().sections()[0].children[0].id();
                (engine, first)
            },
            |(mut engine, first)| {
                let patch = engine.apply(Operation::Insert {
                    node_id: first,
                    offset: 0,
                    text: "x".to_string(),
                });
                black_box(patch.is_ok());
            },
            criterion::BatchSize::LargeInput,
        );
    });

    group.bench_function("insert_image_with_history", |b| {
        b.iter_batched(
            || common::engine_with_blocks(200),
            |mut engine| {
                let id = engine.insert_image(Asset::default());
                black_box(id.is_ok());
                black_box(engine.undo());
            },
            criterion::BatchSize::LargeInput,
        );
    });

    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");
    group.sample_size(20);

    let engine = common::engine_with_blocks(200);
    let len = engine.buffer().len_chars();
    group.bench_function("resolve_every_100th_offset", |b| {
        b.iter(|| {
            for offset in (0..len).step_by(100) {
                black_box(resolve_buffer_offset(engine.tree(), black_box(offset)));
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_engine_edits, bench_resolve);
criterion_main!(benches);
