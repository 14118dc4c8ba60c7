//! Benchmarks for clustering fits and the evolutionary search.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use cluster_evolve::{
    compute::{
        ClusterModel,
        evolution::{CandidateFactory, SearchRng, cluster_fitness, evolution, init_population},
        instantiate_model, silhouette_score,
    },
    schema::{Dataset, EvolutionConfig, SearchSpace},
};

fn blobs(per_center: usize) -> Dataset {
    Dataset::gaussian_blobs(
        &[vec![0.0, 0.0], vec![6.0, 6.0], vec![-6.0, 6.0]],
        per_center,
        0.8,
        0,
    )
    .unwrap()
}

fn bench_model_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("model_fit");
    let data = blobs(50);

    for name in ["KMeans", "KMedoids", "DBSCAN", "HDBSCAN"] {
        group.bench_with_input(BenchmarkId::from_parameter(name), &name, |b, &name| {
            b.iter(|| {
                let mut model = instantiate_model(name);
                let _ = model.fit(black_box(&data));
            });
        });
    }

    group.finish();
}

fn bench_silhouette(c: &mut Criterion) {
    let mut group = c.benchmark_group("silhouette");

    for per_center in [20, 50, 100] {
        let data = blobs(per_center);
        let labels: Vec<i64> = (0..data.n_rows())
            .map(|i| (i / per_center) as i64)
            .collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(data.n_rows()),
            &per_center,
            |b, _| {
                b.iter(|| silhouette_score(black_box(&data), black_box(&labels)));
            },
        );
    }

    group.finish();
}

fn bench_population_fitness(c: &mut Criterion) {
    let data = blobs(30);
    let space = SearchSpace::default();

    c.bench_function("population_fitness_15", |b| {
        b.iter(|| {
            let mut rng = SearchRng::new(1);
            let mut factory = CandidateFactory::new();
            let population = init_population(&space, 15, &mut rng, &mut factory);
            cluster_fitness(population, black_box(&data))
        });
    });
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    group.sample_size(10);
    let data = blobs(20);

    for generations in [5, 20] {
        let config = EvolutionConfig {
            cutoff_score: 1.1,
            max_generations: generations,
            random_seed: Some(3),
            ..Default::default()
        };

        group.bench_with_input(
            BenchmarkId::from_parameter(generations),
            &generations,
            |b, _| {
                b.iter(|| evolution(SearchSpace::default(), config.clone(), black_box(&data)));
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_model_fit,
    bench_silhouette,
    bench_population_fitness,
    bench_search
);
criterion_main!(benches);
