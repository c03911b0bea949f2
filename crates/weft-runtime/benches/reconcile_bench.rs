//! Benchmarks for inline property reconciliation and mapper dispatch.
//!
//! Run with: cargo bench -p weft-runtime

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use weft_core::{ComponentRef, Environment, PropMap, PropValue, SharedValue, ViewInfo, prop_map};
use weft_harness::RecordingBackend;
use weft_runtime::{ImmediateContext, InlinePropManager, MapperScheduler, extract_reactive_props};

/// A style bag with `n` entries, every third one bound to a cell.
fn make_props(n: usize) -> (PropMap, Vec<SharedValue>) {
    let mut style = PropMap::default();
    let mut cells = Vec::new();
    for i in 0..n {
        if i % 3 == 0 {
            let cell = PropValue::cell(i as f64);
            style.insert(format!("p{i}"), PropValue::from(&cell));
            cells.push(cell);
        } else {
            style.insert(format!("p{i}"), PropValue::from(i as f64));
        }
    }
    (prop_map! { "style" => style }, cells)
}

fn view() -> ViewInfo {
    ViewInfo::new(1, "RCTView", ComponentRef(1))
}

fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile/extract");
    for n in [4, 16, 64, 256] {
        let (props, _cells) = make_props(n);
        group.bench_with_input(BenchmarkId::new("style_entries", n), &props, |b, props| {
            b.iter(|| black_box(extract_reactive_props(black_box(props))))
        });
    }
    group.finish();
}

fn bench_unchanged_attach(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile/unchanged_attach");
    for n in [4, 16, 64] {
        let (props, _cells) = make_props(n);
        let scheduler = MapperScheduler::new(Arc::new(ImmediateContext));
        let mut manager = InlinePropManager::new(
            scheduler,
            Arc::new(RecordingBackend::new()),
            Environment::default(),
        );
        manager.attach(&props, &view());
        group.bench_with_input(BenchmarkId::new("style_entries", n), &props, |b, props| {
            b.iter(|| black_box(manager.attach(black_box(props), &view())))
        });
    }
    group.finish();
}

fn bench_write_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile/write_dispatch");
    for n in [4, 16, 64] {
        let (props, cells) = make_props(n);
        let scheduler = MapperScheduler::new(Arc::new(ImmediateContext));
        let backend = Arc::new(RecordingBackend::new());
        let mut manager = InlinePropManager::new(scheduler, backend.clone(), Environment::default());
        manager.attach(&props, &view());
        let mut value = 0.0;
        group.bench_function(BenchmarkId::new("style_entries", n), |b| {
            b.iter(|| {
                value += 1.0;
                cells[0].set(PropValue::from(value));
            });
            backend.clear();
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_extract,
    bench_unchanged_attach,
    bench_write_dispatch,
);

criterion_main!(benches);
