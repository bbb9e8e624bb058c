use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pregel::algorithms::{ConnectedComponentsPregel, PageRankPregel};
use pregel::{CsrGraph, Pregel, PregelConfig};

fn grid_like_graph(nodes: usize) -> CsrGraph {
    // Each node links to a neighbor and to a far node to keep the diameter small.
    let edges = (0..nodes).flat_map(|i| [(i, (i + 1) % nodes), (i, (i * 13 + 7) % nodes)]);
    CsrGraph::from_edges(nodes, edges)
}

fn config(use_fork_join: bool, max_iterations: usize) -> PregelConfig {
    PregelConfig::builder()
        .max_iterations(max_iterations)
        .use_fork_join(use_fork_join)
        .build()
        .expect("valid benchmark config")
}

fn bench_page_rank(c: &mut Criterion) {
    let graph = grid_like_graph(200_000);
    let mut group = c.benchmark_group("page_rank_10_supersteps");
    group.sample_size(10);

    for use_fork_join in [false, true] {
        let label = if use_fork_join { "fork_join" } else { "partitioned" };
        group.bench_with_input(BenchmarkId::from_parameter(label), &use_fork_join, |b, &fj| {
            b.iter(|| {
                let mut pregel =
                    Pregel::create(graph.clone(), config(fj, 10), PageRankPregel::default()).unwrap();
                black_box(pregel.run().unwrap().ran_iterations)
            });
        });
    }
    group.finish();
}

fn bench_connected_components(c: &mut Criterion) {
    let graph = grid_like_graph(200_000).to_undirected();
    let mut group = c.benchmark_group("connected_components");
    group.sample_size(10);

    for use_fork_join in [false, true] {
        let label = if use_fork_join { "fork_join" } else { "partitioned" };
        group.bench_with_input(BenchmarkId::from_parameter(label), &use_fork_join, |b, &fj| {
            b.iter(|| {
                let mut pregel =
                    Pregel::create(graph.clone(), config(fj, 100), ConnectedComponentsPregel).unwrap();
                black_box(pregel.run().unwrap().did_converge)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_page_rank, bench_connected_components);
criterion_main!(benches);
