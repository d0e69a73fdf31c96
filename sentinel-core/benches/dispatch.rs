//! Benchmarks for report dispatch and anchor rebinding.
//!
//! Run with: cargo bench -p sentinel-core --bench dispatch

use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sentinel_core::scroll::{InfiniteScroll, Role, ScrollOptions, Suppression};
use sentinel_core::sensing::{ElementId, SimulatedSensor, VisibilityReport};

const ANCHOR: ElementId = ElementId::new(1);
const OTHER: ElementId = ElementId::new(2);

fn setup(fired: Arc<AtomicU64>) -> (Arc<SimulatedSensor>, InfiniteScroll) {
    let sensor = Arc::new(SimulatedSensor::new());
    let scroll = InfiniteScroll::new(sensor.clone());
    scroll.on_load_anchor().attach(ANCHOR);
    scroll
        .configure(
            &ScrollOptions::new()
                .on_load_more(move || {
                    fired.fetch_add(1, Ordering::Relaxed);
                })
                .on_load_threshold(0.5)
                .suppression(Suppression::FireImmediately),
        )
        .expect("valid options");
    (sensor, scroll)
}

// =============================================================================
// Batch delivery
// =============================================================================

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch/batch");

    for size in [1usize, 16, 256] {
        let fired = Arc::new(AtomicU64::new(0));
        let (sensor, scroll) = setup(fired.clone());
        let id = scroll.role(Role::Load).subscription().expect("live subscription");

        // Half the reports qualify, half are for another element.
        let batch: Vec<VisibilityReport> = (0..size)
            .map(|i| {
                let element = if i % 2 == 0 { ANCHOR } else { OTHER };
                VisibilityReport::new(element, true, 0.75)
            })
            .collect();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("flush", size), &batch, |b, batch| {
            b.iter(|| {
                for report in batch {
                    sensor.push(id, *report);
                }
                black_box(sensor.flush().expect("callbacks succeed"))
            })
        });
    }

    group.finish();
}

// =============================================================================
// Anchor rebinding
// =============================================================================

fn bench_rebind(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch/rebind");

    group.bench_function("swap_anchor", |b| {
        let (_sensor, scroll) = setup(Arc::new(AtomicU64::new(0)));
        let anchor = scroll.on_load_anchor();
        let mut next = 10u64;
        b.iter(|| {
            next += 1;
            anchor.attach(black_box(ElementId::new(next)));
        })
    });

    group.finish();
}

criterion_group!(benches, bench_dispatch, bench_rebind);
criterion_main!(benches);
