use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use flood_sim::engine::run_simulation;
use flood_sim::models::SimConfig;

const DURATION: f64 = 10.0;

fn build_config(servers: usize, bots: usize) -> SimConfig {
    let mut config = SimConfig::default();
    config.duration = DURATION;
    config.seed = Some(7);
    config.servers.count = servers;
    config.legitimate.clients = 200;
    config.malicious.clients = bots;
    config
}

fn bench_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine");
    group.sample_size(10);
    let scenarios = [("baseline", 10, 0), ("flood", 10, 100), ("overload", 3, 200)];

    for (label, servers, bots) in scenarios {
        let size_label = format!("{}s/{}srv/{}bots", DURATION, servers, bots);
        group.bench_with_input(
            BenchmarkId::new(label, &size_label),
            &(servers, bots),
            |b, &(servers, bots)| {
                b.iter_batched(
                    || build_config(servers, bots),
                    |config| {
                        let result = run_simulation(&config).expect("simulation should succeed");
                        black_box(result);
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_engine);
criterion_main!(benches);
