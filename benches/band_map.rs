use bandwise::color::Color;
use bandwise::counter::ShardedCounter;
use bandwise::parallel::{BandMapper, Parallelism, RayonExecutor, WorkerPool};
use bandwise::{Grid, LatentGrid};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

const WIDTH: usize = 512;
const HEIGHT: usize = 512;

fn pixels() -> Arc<Grid<Color>> {
    let cells = (0..WIDTH * HEIGHT)
        .map(|i| Color::from_rgb8((i % 251) as u8, (i % 127) as u8, (i % 63) as u8))
        .collect();
    Arc::new(Grid::from_vec(WIDTH, cells).expect("valid grid"))
}

/// Band count against wall time on one reused pool
fn bench_parallel_scaling(c: &mut Criterion) {
    let grid = pixels();
    let pool = Arc::new(WorkerPool::new());

    let mut group = c.benchmark_group("parallel_scaling");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(20);

    for workers in [1, 2, 4, 8] {
        let mapper = BandMapper::new(pool.clone()).with_parallelism(Parallelism::Fixed(workers));
        group.bench_with_input(BenchmarkId::new("grayscale", workers), &workers, |b, _| {
            b.iter(|| black_box(mapper.map(grid.clone(), Color::grayscale).expect("map")))
        });
    }
    group.finish();
}

fn bench_backends(c: &mut Criterion) {
    let grid = pixels();
    let workers = num_cpus::get().max(2);

    let native = BandMapper::new(Arc::new(WorkerPool::new()))
        .with_parallelism(Parallelism::Fixed(workers));
    let rayon = BandMapper::new(Arc::new(RayonExecutor::new(workers).expect("rayon pool")))
        .with_parallelism(Parallelism::Fixed(workers));

    let mut group = c.benchmark_group("backends");
    group.sample_size(20);
    for (name, mapper) in [("native", &native), ("rayon", &rayon)] {
        group.bench_function(name, |b| {
            b.iter(|| black_box(mapper.map(grid.clone(), Color::brighter).expect("map")))
        });
    }
    group.finish();
}

/// Three fused transforms against three separate passes
fn bench_latent_fusion(c: &mut Criterion) {
    let grid = pixels();
    let mapper = BandMapper::shared().with_parallelism(Parallelism::Fixed(4));

    let mut group = c.benchmark_group("latent_fusion");
    group.sample_size(20);
    group.bench_function("fused", |b| {
        b.iter(|| {
            let out = LatentGrid::new(grid.clone())
                .transform(Color::darker)
                .transform(Color::invert)
                .transform(Color::grayscale)
                .to_grid(&mapper)
                .expect("map");
            black_box(out)
        })
    });
    group.bench_function("separate", |b| {
        b.iter(|| {
            let a = mapper.map(grid.clone(), Color::darker).expect("map");
            let b2 = mapper.map(a, Color::invert).expect("map");
            black_box(mapper.map(b2, Color::grayscale).expect("map"))
        })
    });
    group.finish();
}

fn bench_sharded_counter(c: &mut Criterion) {
    let counter = Arc::new(ShardedCounter::new());

    c.bench_function("sharded_counter_4_threads", |b| {
        b.iter(|| {
            std::thread::scope(|s| {
                for _ in 0..4 {
                    let counter = counter.clone();
                    s.spawn(move || {
                        for _ in 0..10_000 {
                            counter.increment();
                        }
                    });
                }
            });
            black_box(counter.sum_and_reset())
        })
    });
}

criterion_group!(
    benches,
    bench_parallel_scaling,
    bench_backends,
    bench_latent_fusion,
    bench_sharded_counter
);
criterion_main!(benches);
