//! Benchmarks for balancer runs
//!
//! Run with: cargo bench --package regionbalancer-stochastic --bench balance

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::SeedableRng;
use regionbalancer_core::{ClusterState, RegionInfo, ServerName};
use regionbalancer_stochastic::{
    Action, ActionGenerator, BalancerConfig, ClusterSnapshot, CostRegistry, StochasticBalancer,
};
use tokio_util::sync::CancellationToken;

/// Every region on the first server, spread over `tables` tables
fn skewed_cluster(servers: usize, regions: usize, tables: usize) -> ClusterState {
    let mut state = ClusterState::new();
    let hosted = (0..regions as u64)
        .map(|id| {
            let table = format!("table{}", id as usize % tables);
            RegionInfo::new(table.as_str(), id.to_be_bytes().to_vec(), Vec::<u8>::new(), id)
        })
        .collect();
    state = state.with_server(ServerName::new("rs0000", 16020, 1), hosted);
    for i in 1..servers {
        state = state.with_server(ServerName::new(format!("rs{:04}", i), 16020, 1), Vec::new());
    }
    state
}

/// Full run with a fixed step budget
fn bench_balance_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("balance_run");
    group.sample_size(10);

    for (servers, regions) in [(10, 1_000), (50, 5_000), (200, 20_000)] {
        let state = skewed_cluster(servers, regions, 20);
        let config = BalancerConfig {
            max_steps: 100_000,
            max_run_time_ms: 60_000,
            ..Default::default()
        };
        let balancer = StochasticBalancer::new(config).unwrap();

        group.throughput(Throughput::Elements(100_000));
        group.bench_with_input(
            BenchmarkId::new("servers_regions", format!("{}x{}", servers, regions)),
            &state,
            |b, state| {
                b.iter(|| {
                    let mut rng = StdRng::seed_from_u64(42);
                    let outcome = balancer
                        .balance_cluster_with(state, &mut rng, &CancellationToken::new())
                        .unwrap();
                    black_box(outcome)
                });
            },
        );
    }

    group.finish();
}

/// One apply, rescore and undo cycle, the inner step of a run
fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("annealing_step");

    for tables in [1, 20, 200] {
        let state = skewed_cluster(100, 10_000, tables);
        let mut snapshot = ClusterSnapshot::new(&state).unwrap();
        let mut registry = CostRegistry::from_config(&BalancerConfig::default());
        registry.prepare(&snapshot);
        let mut rng = StdRng::seed_from_u64(7);

        group.bench_function(BenchmarkId::new("tables", tables), |b| {
            b.iter(|| {
                let action = ActionGenerator::RandomMove.generate(&snapshot, &mut rng);
                if action == Action::Null {
                    return;
                }
                snapshot.apply_action(&action);
                black_box(registry.update(&snapshot, &action));
                snapshot.undo_last_action();
                black_box(registry.update(&snapshot, &action));
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_balance_run, bench_step);
criterion_main!(benches);
