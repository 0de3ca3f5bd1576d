use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use flood_sim::router::{Routable, Router};

struct Candidate {
    online: bool,
    health: f64,
}

impl Routable for Candidate {
    fn is_online(&self) -> bool {
        self.online
    }

    fn health(&self) -> f64 {
        self.health
    }
}

fn build_cluster(count: usize) -> Vec<Candidate> {
    (0..count)
        .map(|idx| Candidate {
            online: idx % 4 != 0,
            health: ((idx * 37) % 101) as f64 / 100.0,
        })
        .collect()
}

fn bench_route(c: &mut Criterion) {
    let mut group = c.benchmark_group("router");
    let router = Router;

    for count in [10, 50, 500] {
        let cluster = build_cluster(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &cluster, |b, cluster| {
            b.iter(|| black_box(router.route(black_box(cluster.as_slice()))));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_route);
criterion_main!(benches);
