use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use flood_sim::sim::{Prioritized, Scheduler, SimTime};

const EVENTS: usize = 10_000;

#[derive(Clone, Copy)]
struct Tick(usize);

impl Prioritized for Tick {}

fn bench_scheduler(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler");

    group.bench_function(BenchmarkId::new("schedule_and_drain", EVENTS), |b| {
        b.iter_batched(
            Scheduler::<Tick>::new,
            |mut scheduler| {
                for idx in 0..EVENTS {
                    scheduler.schedule_in(((idx * 7919) % 1000) as f64 / 100.0, Tick(idx));
                }
                while let Some(tick) = scheduler.pop_until(SimTime(10.0)) {
                    black_box(tick.0);
                }
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function(BenchmarkId::new("cancel_half", EVENTS), |b| {
        b.iter_batched(
            Scheduler::<Tick>::new,
            |mut scheduler| {
                let keys: Vec<_> = (0..EVENTS)
                    .map(|idx| scheduler.schedule_in(idx as f64 / 1000.0, Tick(idx)))
                    .collect();
                for key in keys.iter().step_by(2) {
                    scheduler.cancel(*key);
                }
                while let Some(tick) = scheduler.pop() {
                    black_box(tick.0);
                }
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_scheduler);
criterion_main!(benches);
