//! Benchmarks for the keyed children diff and reactive triggering.

use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use trellis_core::reactive::{effect, reactive, Target};
use trellis_core::render::{longest_increasing_subsequence, MemoryHost, Renderer, VNode};

// =============================================================================
// Test Data Generation
// =============================================================================

fn keyed_rows(keys: &[usize]) -> VNode {
    VNode::element("tbody").with_children(
        keys.iter()
            .map(|k| VNode::element("tr").keyed(*k).with_text(k.to_string()))
            .collect(),
    )
}

fn shuffled(n: usize) -> Vec<usize> {
    // Deterministic scramble: reverse blocks of 7, then swap neighbours.
    let mut keys: Vec<usize> = (0..n).collect();
    for chunk in keys.chunks_mut(7) {
        chunk.reverse();
    }
    for pair in keys.chunks_mut(2) {
        pair.reverse();
    }
    keys
}

// =============================================================================
// Diff Benchmarks
// =============================================================================

fn bench_keyed_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyed_diff");

    for size in [100usize, 1_000] {
        let ordered: Vec<usize> = (0..size).collect();
        let scrambled = shuffled(size);
        let mut swapped = ordered.clone();
        swapped.swap(1, size - 2);

        group.throughput(Throughput::Elements(size as u64));

        for (name, next) in [("shuffle", &scrambled), ("swap_rows", &swapped)] {
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
                b.iter_batched(
                    || {
                        let host = Rc::new(MemoryHost::new());
                        let renderer = Renderer::new(host.clone());
                        let root = host.create_root();
                        let _ = renderer.render(Some(keyed_rows(&ordered)), root);
                        (host, renderer, root)
                    },
                    |(host, renderer, root)| {
                        let _ = renderer.render(Some(keyed_rows(next)), root);
                        black_box(host.take_ops().len())
                    },
                    criterion::BatchSize::SmallInput,
                );
            });
        }
    }

    group.finish();
}

fn bench_lis(c: &mut Criterion) {
    let source: Vec<Option<usize>> = shuffled(10_000).into_iter().map(Some).collect();
    c.bench_function("lis_10k", |b| {
        b.iter(|| black_box(longest_increasing_subsequence(black_box(&source))))
    });
}

// =============================================================================
// Reactive Benchmarks
// =============================================================================

fn bench_trigger(c: &mut Criterion) {
    let mut group = c.benchmark_group("trigger");

    for subscribers in [1usize, 100] {
        group.bench_with_input(
            BenchmarkId::new("object_set", subscribers),
            &subscribers,
            |b, &subscribers| {
                let state = reactive(Target::object_from([("n", 0)]));
                let _effects: Vec<_> = (0..subscribers)
                    .map(|_| {
                        let s = state.clone();
                        effect(move || s.get("n"))
                    })
                    .collect();
                let mut n = 0i64;
                b.iter(|| {
                    n += 1;
                    state.set("n", n)
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_keyed_diff, bench_lis, bench_trigger);
criterion_main!(benches);
